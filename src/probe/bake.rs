//! The bake stages, as functions over a probe's resources

use super::ReflectionProbeResources;
use crate::atlas::{AtlasLayout, MIN_LEVEL_SIZE};
use crate::backend::traits::*;
use crate::error::ProbeResult;
use crate::pipeline::{
    AtlasBlitter, CubeFaceContext, CubemapConvolver, CubemapDownsampler, CubemapPrefilter,
    CubemapRenderer, OctahedralProjector, PrefilterOptions, PrefilterStrategy,
};

/// Kernel pipelines used by a bake, created with the probe
pub struct ProbePasses {
    pub renderer: CubemapRenderer,
    pub projector: OctahedralProjector,
    pub blitter: AtlasBlitter,
    pub downsampler: CubemapDownsampler,
    pub convolver: CubemapConvolver,
    pub prefilter: CubemapPrefilter,
    pub prefilter_options: PrefilterOptions,
}

impl ProbePasses {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        renderer: CubemapRenderer,
        strategy: PrefilterStrategy,
    ) -> ProbeResult<Self> {
        Ok(Self {
            renderer,
            projector: OctahedralProjector::new(backend)?,
            blitter: AtlasBlitter::new(backend)?,
            downsampler: CubemapDownsampler::new(backend)?,
            convolver: CubemapConvolver::new(backend)?,
            prefilter: CubemapPrefilter::new(backend, strategy)?,
            prefilter_options: PrefilterOptions::for_strategy(strategy),
        })
    }
}

/// Render the scene into the six faces of the dynamic cubemap
pub fn capture<B, F>(
    backend: &mut B,
    passes: &ProbePasses,
    resources: &ReflectionProbeResources,
    draw: F,
) -> ProbeResult<()>
where
    B: GraphicsBackend,
    F: FnMut(&mut B, &CubeFaceContext) -> ProbeResult<()>,
{
    passes
        .renderer
        .render_to_cubemap(backend, &resources.dynamic_cubemap, draw)
}

/// Project the capture into the octahedral map at full map size
pub fn convert<B: GraphicsBackend>(
    backend: &mut B,
    passes: &mut ProbePasses,
    resources: &ReflectionProbeResources,
    layout: &AtlasLayout,
) -> ProbeResult<()> {
    passes.projector.project(
        backend,
        &resources.dynamic_cubemap,
        &resources.oct_map,
        layout.region(0, 0).size,
    )
}

/// Clear the atlas and fill the mip row and the roughness column.
///
/// Mips are built by resampling the previous atlas region through the
/// octahedral map. Every roughness level is prefiltered from the base region
/// of the level before it.
pub fn level<B: GraphicsBackend>(
    backend: &mut B,
    passes: &mut ProbePasses,
    resources: &ReflectionProbeResources,
    layout: &AtlasLayout,
) -> ProbeResult<()> {
    let oct_map = &resources.oct_map;
    let atlas = &resources.atlas;
    let max_level = layout.max_level();

    passes.blitter.clear(backend, atlas, [0.0; 4])?;
    let base = layout.region(0, 0);
    passes.blitter.blit(backend, oct_map, base.size, atlas, base)?;

    for mip in 0..max_level.saturating_sub(1) {
        let next = layout.region(mip + 1, 0);
        passes
            .downsampler
            .downsample_region(backend, atlas, layout.region(mip, 0), oct_map, next.size)?;
        passes.blitter.blit(backend, oct_map, next.size, atlas, next)?;
    }

    // The coarsest mip is pinned to the floor size whatever the halving gives
    let coarsest = layout.region(max_level, 0);
    debug_assert_eq!(coarsest.size, MIN_LEVEL_SIZE);
    passes.downsampler.downsample_region(
        backend,
        atlas,
        layout.region(max_level - 1, 0),
        oct_map,
        MIN_LEVEL_SIZE,
    )?;
    passes
        .blitter
        .blit(backend, oct_map, MIN_LEVEL_SIZE, atlas, coarsest)?;

    let options = passes.prefilter_options;
    for roughness_level in 1..=max_level {
        let size = layout.level_size(0, roughness_level);
        passes.prefilter.prefilter_region(
            backend,
            atlas,
            layout.region(0, roughness_level - 1),
            oct_map,
            size,
            options.roughness_for_level(roughness_level),
            &options,
        )?;
        passes
            .blitter
            .blit(backend, oct_map, size, atlas, layout.region(0, roughness_level))?;
    }

    Ok(())
}

/// Convolve the coarsest mip into the irradiance corner
pub fn irradiance<B: GraphicsBackend>(
    backend: &mut B,
    passes: &mut ProbePasses,
    resources: &ReflectionProbeResources,
    layout: &AtlasLayout,
) -> ProbeResult<()> {
    let target = layout.irradiance_region();
    passes.convolver.convolve_region(
        backend,
        &resources.atlas,
        layout.region(layout.max_level(), 0),
        &resources.oct_map,
        target.size,
    )?;
    passes
        .blitter
        .blit(backend, &resources.oct_map, target.size, &resources.atlas, target)
}
