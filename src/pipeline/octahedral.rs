//! Cube to octahedral map projection

use super::{
    square_rect, BindingCache, FullscreenKernel, KernelContext, SourceKind, TargetKind,
    PROJECT_BODY,
};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{ProbeError, ProbeResult};
use crate::resources::{CubemapTarget, GpuTexture};

/// Projects a captured cubemap into a square octahedral map
pub struct OctahedralProjector {
    ctx: KernelContext,
    kernel: FullscreenKernel,
    binding: BindingCache,
}

impl OctahedralProjector {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> ProbeResult<Self> {
        let ctx = KernelContext::new(backend)?;
        let kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Octahedral Projection",
            SourceKind::Cube,
            TargetKind::Octahedral,
            PROJECT_BODY,
        )?;

        Ok(Self {
            ctx,
            kernel,
            binding: BindingCache::default(),
        })
    }

    /// Write a `size` octahedral map of `source` into the top-left of `target`
    pub fn project<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        source: &CubemapTarget,
        target: &GpuTexture,
        size: u32,
    ) -> ProbeResult<()> {
        if size > target.width || size > target.height {
            return Err(ProbeError::Configuration(format!(
                "octahedral map of {}px does not fit {} ({}x{})",
                size, target.name, target.width, target.height
            )));
        }

        let binding = self.binding.binding_for(
            backend,
            &self.ctx,
            SourceKind::Cube,
            source.cube_view,
            None,
        )?;
        let uniforms = KernelUniforms {
            target_rect: square_rect(size),
            ..Default::default()
        };
        self.kernel.run(
            backend,
            binding,
            target.view,
            LoadOp::Load,
            Viewport::square(size),
            &uniforms,
        )
    }
}
