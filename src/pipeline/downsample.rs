//! Cubemap and atlas region downsampling

use super::{
    square_rect, texture_size, BindingCache, CubemapRenderer, FullscreenKernel, KernelBinding,
    KernelContext, SourceKind, TargetKind, DOWNSAMPLE_CUBE_BODY, DOWNSAMPLE_REGION_BODY,
    PROBE_TEXTURE_FORMAT,
};
use crate::atlas::AtlasRegion;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{ProbeError, ProbeResult};
use crate::resources::{CubemapTarget, GpuTexture};

/// Halves cubemaps with a box filter, and resamples octahedral atlas regions
pub struct CubemapDownsampler {
    ctx: KernelContext,
    cube_kernel: FullscreenKernel,
    region_kernel: FullscreenKernel,
    renderer: CubemapRenderer,
    region_binding: BindingCache,
}

impl CubemapDownsampler {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> ProbeResult<Self> {
        let ctx = KernelContext::new(backend)?;
        let cube_kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Cubemap Downsample",
            SourceKind::Cube,
            TargetKind::CubeFace,
            DOWNSAMPLE_CUBE_BODY,
        )?;
        let region_kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Atlas Downsample",
            SourceKind::Texture2d,
            TargetKind::Octahedral,
            DOWNSAMPLE_REGION_BODY,
        )?;

        Ok(Self {
            ctx,
            cube_kernel,
            region_kernel,
            renderer: CubemapRenderer::default(),
            region_binding: BindingCache::default(),
        })
    }

    /// Box filter `source` into `target`, whose faces must be half the size
    pub fn downsample<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        source: &CubemapTarget,
        target: &CubemapTarget,
    ) -> ProbeResult<()> {
        if target.size * 2 != source.size {
            return Err(ProbeError::Configuration(format!(
                "downsample target {} must be half of source {} ({}px)",
                target.size, source.size, source.size / 2
            )));
        }

        let binding =
            KernelBinding::new(backend, &self.ctx, SourceKind::Cube, source.cube_view, None)?;
        let result = self
            .renderer
            .render_faces(backend, target, 0, false, |backend, face| {
                let uniforms = KernelUniforms {
                    inv_view_proj: face.view_projection.inverse(),
                    target_rect: square_rect(face.size),
                    ..Default::default()
                };
                self.cube_kernel.draw(backend, &binding, &uniforms);
                Ok(())
            });
        binding.destroy(backend);
        result
    }

    /// Build a chain of successively halved cubemaps below `source`, stopping
    /// after `levels` targets or at one texel.
    pub fn downsample_chain<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        source: &CubemapTarget,
        levels: u32,
    ) -> ProbeResult<Vec<CubemapTarget>> {
        let mut chain: Vec<CubemapTarget> = Vec::new();
        for level in 0..levels {
            let previous = chain.last().unwrap_or(source);
            if previous.size < 2 {
                break;
            }
            let target = CubemapTarget::new(
                backend,
                &format!("{} Downsample {}", source.name, level + 1),
                previous.size / 2,
                1,
                PROBE_TEXTURE_FORMAT,
                false,
            )?;
            self.downsample(backend, previous, &target)?;
            chain.push(target);
        }
        Ok(chain)
    }

    /// Resample the octahedral map in `region` of `source` to a `size` map in
    /// the top-left corner of `target`. At half size this is a 2x2 box filter,
    /// at equal size a copy.
    pub fn downsample_region<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        source: &GpuTexture,
        region: AtlasRegion,
        target: &GpuTexture,
        size: u32,
    ) -> ProbeResult<()> {
        let binding = self.region_binding.binding_for(
            backend,
            &self.ctx,
            SourceKind::Texture2d,
            source.view,
            None,
        )?;
        let uniforms = KernelUniforms {
            target_rect: square_rect(size),
            source_rect: region.rect(),
            source_size: texture_size(source),
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
