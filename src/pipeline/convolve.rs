//! Diffuse irradiance convolution

use super::{
    square_rect, texture_size, BindingCache, CubemapRenderer, FullscreenKernel, KernelBinding,
    KernelContext, SourceKind, TargetKind, CONVOLVE_BODY,
};
use crate::atlas::AtlasRegion;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::ProbeResult;
use crate::resources::{CubemapTarget, GpuTexture, HammersleyTexture};
use glam::Vec4;

/// Hammersley points integrated per irradiance texel
pub const IRRADIANCE_SAMPLES: u32 = 512;

/// Computes cosine weighted irradiance from a low resolution environment
pub struct CubemapConvolver {
    ctx: KernelContext,
    cube_kernel: FullscreenKernel,
    region_kernel: FullscreenKernel,
    samples: HammersleyTexture,
    renderer: CubemapRenderer,
    region_binding: BindingCache,
}

impl CubemapConvolver {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> ProbeResult<Self> {
        let ctx = KernelContext::new(backend)?;
        let cube_kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Irradiance Convolution Cube",
            SourceKind::Cube,
            TargetKind::CubeFace,
            CONVOLVE_BODY,
        )?;
        let region_kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Irradiance Convolution",
            SourceKind::Texture2d,
            TargetKind::Octahedral,
            CONVOLVE_BODY,
        )?;
        let samples = HammersleyTexture::new(backend, IRRADIANCE_SAMPLES)?;

        Ok(Self {
            ctx,
            cube_kernel,
            region_kernel,
            samples,
            renderer: CubemapRenderer::default(),
            region_binding: BindingCache::default(),
        })
    }

    pub fn sample_count(&self) -> u32 {
        self.samples.count()
    }

    fn params(&self) -> Vec4 {
        Vec4::new(0.0, self.samples.count() as f32, 0.0, 0.0)
    }

    /// Convolve `source` into every face of `target` at mip 0
    pub fn convolve<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        source: &CubemapTarget,
        target: &CubemapTarget,
    ) -> ProbeResult<()> {
        let binding = KernelBinding::new(
            backend,
            &self.ctx,
            SourceKind::Cube,
            source.cube_view,
            Some(self.samples.view()),
        )?;
        let params = self.params();
        let result = self
            .renderer
            .render_faces(backend, target, 0, false, |backend, face| {
                let uniforms = KernelUniforms {
                    inv_view_proj: face.view_projection.inverse(),
                    target_rect: square_rect(face.size),
                    params,
                    ..Default::default()
                };
                self.cube_kernel.draw(backend, &binding, &uniforms);
                Ok(())
            });
        binding.destroy(backend);
        result
    }

    /// Convolve the octahedral map in `region` of `source` into a `size`
    /// octahedral map at the top-left of `target`
    pub fn convolve_region<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        source: &GpuTexture,
        region: AtlasRegion,
        target: &GpuTexture,
        size: u32,
    ) -> ProbeResult<()> {
        let params = self.params();
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
