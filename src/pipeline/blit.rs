//! Copying octahedral maps into atlas regions

use super::{
    square_rect, texture_size, BindingCache, FullscreenKernel, KernelContext, SourceKind,
    TargetKind, BLIT_BODY,
};
use crate::atlas::AtlasRegion;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{ProbeError, ProbeResult};
use crate::resources::GpuTexture;

/// Writes the top-left `size` square of a scratch texture into an atlas region
pub struct AtlasBlitter {
    ctx: KernelContext,
    kernel: FullscreenKernel,
    binding: BindingCache,
}

impl AtlasBlitter {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> ProbeResult<Self> {
        let ctx = KernelContext::new(backend)?;
        let kernel = FullscreenKernel::new(
            backend,
            &ctx,
            "Atlas Blit",
            SourceKind::Texture2d,
            TargetKind::Octahedral,
            BLIT_BODY,
        )?;

        Ok(Self {
            ctx,
            kernel,
            binding: BindingCache::default(),
        })
    }

    /// Clear the whole atlas in a pass of its own
    pub fn clear<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        atlas: &GpuTexture,
        color: [f32; 4],
    ) -> ProbeResult<()> {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Atlas Clear".to_string()),
            color_attachments: vec![ColorAttachment {
                view: atlas.view,
                load_op: LoadOp::Clear(color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        })?;
        backend.end_render_pass()?;
        Ok(())
    }

    /// Copy texel for texel; only `region` of the atlas is touched
    pub fn blit<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        source: &GpuTexture,
        size: u32,
        atlas: &GpuTexture,
        region: AtlasRegion,
    ) -> ProbeResult<()> {
        if size != region.size {
            return Err(ProbeError::Configuration(format!(
                "cannot blit a {}px map into a {}px region at ({}, {})",
                size, region.size, region.x, region.y
            )));
        }

        let binding = self.binding.binding_for(
            backend,
            &self.ctx,
            SourceKind::Texture2d,
            source.view,
            None,
        )?;
        let uniforms = KernelUniforms {
            target_rect: region.rect(),
            source_rect: square_rect(size),
            source_size: texture_size(source),
            ..Default::default()
        };
        self.kernel.run(
            backend,
            binding,
            atlas.view,
            LoadOp::Load,
            region.viewport(),
            &uniforms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyCommand;
    use crate::backend::DummyBackend;
    use crate::pipeline::PROBE_TEXTURE_FORMAT;

    fn targets(backend: &mut DummyBackend) -> (GpuTexture, GpuTexture) {
        let oct = GpuTexture::create_render_target(backend, "oct", 128, PROBE_TEXTURE_FORMAT)
            .unwrap();
        let atlas = GpuTexture::create_render_target(backend, "atlas", 256, PROBE_TEXTURE_FORMAT)
            .unwrap();
        (oct, atlas)
    }

    #[test]
    fn test_blit_viewport_is_region() {
        let mut backend = DummyBackend::new();
        let mut blitter = AtlasBlitter::new(&mut backend).unwrap();
        let (oct, atlas) = targets(&mut backend);
        backend.clear_log();

        let region = AtlasRegion::new(128, 192, 64);
        blitter.blit(&mut backend, &oct, 64, &atlas, region).unwrap();
        assert_eq!(backend.viewports_for("Atlas Blit"), vec![region.viewport()]);
        assert!(backend.errors().is_empty());
    }

    #[test]
    fn test_blit_rejects_size_mismatch() {
        let mut backend = DummyBackend::new();
        let mut blitter = AtlasBlitter::new(&mut backend).unwrap();
        let (oct, atlas) = targets(&mut backend);
        let result = blitter.blit(&mut backend, &oct, 128, &atlas, AtlasRegion::new(0, 0, 64));
        assert!(matches!(result, Err(ProbeError::Configuration(_))));
    }

    #[test]
    fn test_clear_has_no_draw() {
        let mut backend = DummyBackend::new();
        let blitter = AtlasBlitter::new(&mut backend).unwrap();
        let (_, atlas) = targets(&mut backend);
        backend.clear_log();

        blitter.clear(&mut backend, &atlas, [0.0; 4]).unwrap();
        assert_eq!(backend.pass_labels(), vec!["Atlas Clear".to_string()]);
        assert!(!backend
            .commands()
            .iter()
            .any(|c| matches!(c, DummyCommand::Draw { .. })));
        assert!(backend.errors().is_empty());
    }
}
