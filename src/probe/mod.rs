//! Reflection probes
//!
//! A probe captures the scene around a point into a cubemap, projects it to
//! an octahedral map and packs mips, prefiltered roughness levels and a
//! diffuse irradiance map into one atlas texture. Baking happens inside
//! [`ReflectionProbe::update`] while the probe is dirty.

mod bake;
mod resources;
mod state;

pub use bake::ProbePasses;
pub use resources::ReflectionProbeResources;
pub use state::BakeState;

use crate::atlas::{AtlasLayout, AtlasRegion};
use crate::backend::traits::*;
use crate::config::ProbeConfig;
use crate::error::{ProbeError, ProbeResult};
use crate::pipeline::{CubeFaceContext, CubemapRenderer, PrefilterStrategy};

/// Scene callback invoked once per captured face, inside an open render pass
pub type SceneDrawFn<'a, B> = dyn FnMut(&mut B, &CubeFaceContext) -> ProbeResult<()> + 'a;

/// What shading samples from a baked probe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutputs {
    pub atlas_view: TextureViewHandle,
    pub atlas_size: u32,
    pub irradiance_region: AtlasRegion,
}

/// A reflection probe with its own textures and kernel pipelines
pub struct ReflectionProbe {
    config: ProbeConfig,
    layout: AtlasLayout,
    resources: ReflectionProbeResources,
    passes: ProbePasses,
    state: BakeState,
    dirty: bool,
}

impl ReflectionProbe {
    /// Create every resource the probe will ever use. New probes start dirty.
    pub fn new<B: GraphicsBackend>(backend: &mut B, config: ProbeConfig) -> ProbeResult<Self> {
        let capabilities = backend.capabilities();
        if !capabilities.float_render_targets {
            return Err(ProbeError::Configuration(format!(
                "{} backend cannot render to RGBA16F targets",
                backend.name()
            )));
        }
        config.validate(&capabilities)?;
        let layout = AtlasLayout::new(config.atlas_size)?;

        let strategy = PrefilterStrategy::select(&capabilities, config.quality);
        let renderer = CubemapRenderer::new(config.near, config.far, config.background);
        let resources = ReflectionProbeResources::new(backend, &config)?;
        let passes = ProbePasses::new(backend, renderer, strategy)?;

        log::info!(
            "Created reflection probe: cubemap {}px, atlas {}px, {} levels, {:?} prefilter",
            config.cubemap_size,
            config.atlas_size,
            layout.max_level(),
            strategy
        );

        Ok(Self {
            config,
            layout,
            resources,
            passes,
            state: BakeState::Idle,
            dirty: true,
        })
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Request a bake on the next `update` that gets a scene callback
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn state(&self) -> BakeState {
        self.state
    }

    pub fn atlas_layout(&self) -> &AtlasLayout {
        &self.layout
    }

    pub fn strategy(&self) -> PrefilterStrategy {
        self.passes.prefilter.strategy()
    }

    pub fn resources(&self) -> &ReflectionProbeResources {
        &self.resources
    }

    pub fn outputs(&self) -> ProbeOutputs {
        ProbeOutputs {
            atlas_view: self.resources.atlas.view,
            atlas_size: self.layout.width(),
            irradiance_region: self.layout.irradiance_region(),
        }
    }

    /// Bake if dirty and a scene callback is given. Returns whether a bake ran.
    ///
    /// Without a bake nothing is submitted and the atlas keeps its previous
    /// contents. A failed bake leaves the probe dirty, with `state()` naming
    /// the stage that failed, and the atlas partially written.
    pub fn update<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        draw: Option<&mut SceneDrawFn<'_, B>>,
    ) -> ProbeResult<bool> {
        let draw = match draw {
            Some(draw) if self.dirty => draw,
            _ => return Ok(false),
        };

        self.enter(BakeState::Capturing);
        bake::capture(backend, &self.passes, &self.resources, |backend, face| {
            draw(backend, face)
        })?;

        self.enter(BakeState::Converting);
        bake::convert(backend, &mut self.passes, &self.resources, &self.layout)?;

        self.enter(BakeState::Leveling);
        bake::level(backend, &mut self.passes, &self.resources, &self.layout)?;

        self.enter(BakeState::Irradiance);
        bake::irradiance(backend, &mut self.passes, &self.resources, &self.layout)?;

        self.enter(BakeState::Idle);
        self.dirty = false;
        Ok(true)
    }

    fn enter(&mut self, state: BakeState) {
        log::debug!("Reflection probe: {} -> {}", self.state, state);
        self.state = state;
    }

    /// Release the probe's textures
    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        self.resources.destroy(backend);
    }
}
