//! GGX specular prefiltering
//!
//! Two strategies produce the same result. `HighQuality` renders each
//! roughness level straight into a mip of the float cube target. `Readback`
//! is for devices that cannot attach individual float cube mips: each face is
//! rendered into a 2D scratch target, read back to the CPU and uploaded into
//! the cube mip. It is slow, and only used when the device forces it.

use super::{
    square_rect, texture_size, BindingCache, CubemapRenderer, CubeFaceContext, FullscreenKernel,
    KernelBinding, KernelContext, SourceKind, TargetKind, CUBE_FACES, PREFILTER_BODY,
    PROBE_TEXTURE_FORMAT,
};
use crate::atlas::{AtlasRegion, ROUGHNESS_STEP};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::config::ProbeQuality;
use crate::error::{ProbeError, ProbeResult};
use crate::resources::{CubemapTarget, GpuTexture, HammersleyTexture};
use glam::Vec4;

/// GGX samples per texel when rendering directly
pub const HIGH_QUALITY_SAMPLES: u32 = 1024;

/// GGX samples per texel on the readback path
pub const LOW_QUALITY_SAMPLES: u32 = 128;

/// How prefiltered cube mips are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefilterStrategy {
    /// Render into each float cube mip
    HighQuality,
    /// Render to a 2D scratch target and upload through the CPU
    Readback,
}

impl PrefilterStrategy {
    /// Pick a strategy once, from what the device supports and what was asked
    pub fn select(capabilities: &DeviceCapabilities, quality: ProbeQuality) -> Self {
        let strategy = match quality {
            ProbeQuality::Low => PrefilterStrategy::Readback,
            ProbeQuality::High if !capabilities.render_to_cube_mips => {
                log::warn!(
                    "High quality prefiltering requested, but the device cannot render to float cube mips; using readback"
                );
                PrefilterStrategy::Readback
            }
            ProbeQuality::High => PrefilterStrategy::HighQuality,
            ProbeQuality::Auto if capabilities.render_to_cube_mips => {
                PrefilterStrategy::HighQuality
            }
            ProbeQuality::Auto => PrefilterStrategy::Readback,
        };
        log::debug!("Prefilter strategy: {:?} ({:?} requested)", strategy, quality);
        strategy
    }

    pub fn sample_count(&self) -> u32 {
        match self {
            PrefilterStrategy::HighQuality => HIGH_QUALITY_SAMPLES,
            PrefilterStrategy::Readback => LOW_QUALITY_SAMPLES,
        }
    }
}

/// Sample count and roughness progression for one prefilter run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrefilterOptions {
    pub num_samples: u32,
    pub roughness_step: f32,
}

impl Default for PrefilterOptions {
    fn default() -> Self {
        Self::for_strategy(PrefilterStrategy::HighQuality)
    }
}

impl PrefilterOptions {
    pub fn for_strategy(strategy: PrefilterStrategy) -> Self {
        Self {
            num_samples: strategy.sample_count(),
            roughness_step: ROUGHNESS_STEP,
        }
    }

    /// `min(1, level * step)`
    pub fn roughness_for_level(&self, level: u32) -> f32 {
        (level as f32 * self.roughness_step).min(1.0)
    }
}

/// Prefilters an environment for increasing GGX roughness
pub struct CubemapPrefilter {
    ctx: KernelContext,
    strategy: PrefilterStrategy,
    cube_kernel: FullscreenKernel,
    region_kernel: FullscreenKernel,
    samples: HammersleyTexture,
    renderer: CubemapRenderer,
    region_binding: BindingCache,
}

impl CubemapPrefilter {
    pub fn new<B: GraphicsBackend>(backend: &mut B, strategy: PrefilterStrategy) -> ProbeResult<Self> {
        let ctx = KernelContext::new(backend)?;
        let cube_kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Prefilter Cube",
            SourceKind::Cube,
            TargetKind::CubeFace,
            PREFILTER_BODY,
        )?;
        let region_kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Atlas Prefilter",
            SourceKind::Texture2d,
            TargetKind::Octahedral,
            PREFILTER_BODY,
        )?;
        let samples = HammersleyTexture::new(backend, strategy.sample_count())?;

        Ok(Self {
            ctx,
            strategy,
            cube_kernel,
            region_kernel,
            samples,
            renderer: CubemapRenderer::default(),
            region_binding: BindingCache::default(),
        })
    }

    pub fn strategy(&self) -> PrefilterStrategy {
        self.strategy
    }

    /// Make the sample table match `num_samples`, dropping stale bindings
    fn ensure_samples<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        num_samples: u32,
    ) -> ProbeResult<()> {
        if self.samples.ensure(backend, num_samples)? {
            self.region_binding.invalidate(backend);
        }
        Ok(())
    }

    fn params(&self, roughness: f32) -> Vec4 {
        Vec4::new(roughness, self.samples.count() as f32, 0.0, 0.0)
    }

    fn face_uniforms(&self, face: &CubeFaceContext, roughness: f32) -> KernelUniforms {
        KernelUniforms {
            inv_view_proj: face.view_projection.inverse(),
            target_rect: square_rect(face.size),
            params: self.params(roughness),
            ..Default::default()
        }
    }

    /// Write roughness level `l` into mip `l` of `target`, for every mip.
    ///
    /// `target` must have the same face size as `source`.
    pub fn prefilter<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        source: &CubemapTarget,
        target: &CubemapTarget,
        options: &PrefilterOptions,
    ) -> ProbeResult<()> {
        if source.size != target.size {
            return Err(ProbeError::Configuration(format!(
                "prefilter source is {}px but target is {}px",
                source.size, target.size
            )));
        }
        self.ensure_samples(backend, options.num_samples)?;

        let binding = KernelBinding::new(
            backend,
            &self.ctx,
            SourceKind::Cube,
            source.cube_view,
            Some(self.samples.view()),
        )?;
        let result = match self.strategy {
            PrefilterStrategy::HighQuality => {
                self.prefilter_direct(backend, &binding, target, options)
            }
            PrefilterStrategy::Readback => {
                self.prefilter_readback(backend, &binding, target, options)
            }
        };
        binding.destroy(backend);
        result
    }

    fn prefilter_direct<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        binding: &KernelBinding,
        target: &CubemapTarget,
        options: &PrefilterOptions,
    ) -> ProbeResult<()> {
        for level in 0..target.mip_levels {
            let roughness = options.roughness_for_level(level);
            self.renderer
                .render_faces(backend, target, level, false, |backend, face| {
                    let uniforms = self.face_uniforms(face, roughness);
                    self.cube_kernel.draw(backend, binding, &uniforms);
                    Ok(())
                })?;
        }
        Ok(())
    }

    fn prefilter_readback<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        binding: &KernelBinding,
        target: &CubemapTarget,
        options: &PrefilterOptions,
    ) -> ProbeResult<()> {
        let scratch = GpuTexture::create_render_target(
            backend,
            "Prefilter Readback Scratch",
            target.size,
            PROBE_TEXTURE_FORMAT,
        )?;

        let result = self.render_and_upload(backend, binding, target, &scratch, options);
        scratch.destroy(backend);
        result
    }

    fn render_and_upload<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        binding: &KernelBinding,
        target: &CubemapTarget,
        scratch: &GpuTexture,
        options: &PrefilterOptions,
    ) -> ProbeResult<()> {
        for level in 0..target.mip_levels {
            let roughness = options.roughness_for_level(level);
            let size = target.face_size(level);
            for face in 0..CUBE_FACES.len() {
                let ctx = self
                    .renderer
                    .face_context(face, size, level, target.format, None);
                self.cube_kernel.run(
                    backend,
                    binding,
                    scratch.view,
                    LoadOp::Load,
                    Viewport::square(size),
                    &self.face_uniforms(&ctx, roughness),
                )?;

                let pixels = backend.read_texture(scratch.handle, &TextureRegion::square(size))?;
                backend.write_texture(
                    target.texture,
                    &TextureRegion::square(size).with_target(level, face as u32),
                    &pixels,
                )?;
            }
        }
        Ok(())
    }

    /// Prefilter the octahedral map in `region` of `source` at `roughness`
    /// into a `size` octahedral map at the top-left of `target`
    #[allow(clippy::too_many_arguments)]
    pub fn prefilter_region<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        source: &GpuTexture,
        region: AtlasRegion,
        target: &GpuTexture,
        size: u32,
        roughness: f32,
        options: &PrefilterOptions,
    ) -> ProbeResult<()> {
        self.ensure_samples(backend, options.num_samples)?;

        let params = self.params(roughness);
        let binding = self.region_binding.binding_for(
            backend,
            &self.ctx,
            SourceKind::Texture2d,
            source.view,
            Some(self.samples.view()),
        )?;
        let uniforms = KernelUniforms {
            target_rect: square_rect(size),
            source_rect: region.rect(),
            source_size: texture_size(source),
            params,
            ..Default::default()
        };
        self.region_kernel.run(
            backend,
            binding,
            target.view,
            LoadOp::Load,
            Viewport::square(size),
            &uniforms,
        )
    }
}
