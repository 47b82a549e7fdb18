//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It records every
//! command and checks framebuffers, viewports and texture regions the way a
//! strict driver would, so bake orchestration can be tested without hardware.

use std::collections::HashMap;

use thiserror::Error;

use crate::backend::traits::*;
use crate::backend::types::*;

/// A recorded command
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    BeginRenderPass {
        label: Option<String>,
        color: TextureViewHandle,
        load_op: LoadOp,
        width: u32,
        height: u32,
    },
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    SetViewport(Viewport),
    Draw {
        vertices: std::ops::Range<u32>,
        instances: std::ops::Range<u32>,
    },
    EndRenderPass,
    WriteBuffer {
        buffer: BufferHandle,
        size: usize,
    },
    WriteTexture {
        texture: TextureHandle,
        region: TextureRegion,
    },
    ReadTexture {
        texture: TextureHandle,
        region: TextureRegion,
    },
}

/// Validation failures a real device would report
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DummyError {
    #[error("invalid framebuffer: {0}")]
    InvalidFramebuffer(String),
    #[error("viewport {viewport:?} out of bounds for {width}x{height} target")]
    ViewportOutOfBounds {
        viewport: Viewport,
        width: u32,
        height: u32,
    },
    #[error("{0} recorded outside of a render pass")]
    OutsidePass(&'static str),
    #[error("draw without a pipeline")]
    DrawWithoutPipeline,
    #[error("unknown {kind} handle {id}")]
    MissingResource { kind: &'static str, id: u64 },
}

#[derive(Debug, Clone)]
struct DummyView {
    texture: u64,
    width: u32,
    height: u32,
    format: TextureFormat,
    usage: TextureUsage,
    single_subresource: bool,
}

#[derive(Debug)]
struct ActivePass {
    width: u32,
    height: u32,
    has_pipeline: bool,
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    capabilities: DeviceCapabilities,
    textures: HashMap<u64, TextureDescriptor>,
    views: HashMap<u64, DummyView>,
    buffers: HashMap<u64, BufferDescriptor>,
    bind_groups: HashMap<u64, BindGroupLayoutHandle>,
    pipelines: HashMap<u64, Option<String>>,
    next_id: u64,
    active_pass: Option<ActivePass>,
    commands: Vec<DummyCommand>,
    errors: Vec<DummyError>,
    submissions: usize,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a new dummy backend with default capabilities.
    pub fn new() -> Self {
        Self::with_capabilities(DeviceCapabilities::default())
    }

    /// Create a dummy backend that reports the given capabilities.
    pub fn with_capabilities(capabilities: DeviceCapabilities) -> Self {
        Self {
            capabilities,
            textures: HashMap::new(),
            views: HashMap::new(),
            buffers: HashMap::new(),
            bind_groups: HashMap::new(),
            pipelines: HashMap::new(),
            next_id: 1,
            active_pass: None,
            commands: Vec::new(),
            errors: Vec::new(),
            submissions: 0,
        }
    }

    /// Every command recorded so far.
    pub fn commands(&self) -> &[DummyCommand] {
        &self.commands
    }

    /// Validation errors recorded so far.
    pub fn errors(&self) -> &[DummyError] {
        &self.errors
    }

    /// Number of submitted render passes, uploads and readbacks.
    pub fn submission_count(&self) -> usize {
        self.submissions
    }

    /// Forget recorded commands and errors, keeping resources alive.
    pub fn clear_log(&mut self) {
        self.commands.clear();
        self.errors.clear();
        self.submissions = 0;
    }

    /// Labels of recorded render passes, in submission order.
    pub fn pass_labels(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                DummyCommand::BeginRenderPass { label, .. } => {
                    Some(label.clone().unwrap_or_default())
                }
                _ => None,
            })
            .collect()
    }

    /// Viewports recorded by passes whose label starts with `prefix`.
    pub fn viewports_for(&self, prefix: &str) -> Vec<Viewport> {
        let mut in_match = false;
        let mut result = Vec::new();
        for cmd in &self.commands {
            match cmd {
                DummyCommand::BeginRenderPass { label, .. } => {
                    in_match = label.as_deref().is_some_and(|l| l.starts_with(prefix));
                }
                DummyCommand::SetViewport(viewport) if in_match => result.push(*viewport),
                DummyCommand::EndRenderPass => in_match = false,
                _ => {}
            }
        }
        result
    }

    /// Descriptor a texture was created with.
    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn report(&mut self, error: DummyError) {
        log::trace!("DummyBackend: validation error: {}", error);
        self.errors.push(error);
    }

    fn validate_region(
        &self,
        texture: TextureHandle,
        region: &TextureRegion,
    ) -> BackendResult<&TextureDescriptor> {
        let desc = self
            .textures
            .get(&texture.0)
            .ok_or(BackendError::MissingResource {
                kind: "texture",
                id: texture.0,
            })?;
        let (width, height) = desc.mip_size(region.mip_level);
        if region.mip_level >= desc.mip_levels
            || region.layer >= desc.depth
            || region.width == 0
            || region.height == 0
            || region.x + region.width > width
            || region.y + region.height > height
        {
            return Err(BackendError::InvalidRegion(format!(
                "{:?} outside {:?} ({}x{} at mip {})",
                region, desc.label, width, height, region.mip_level
            )));
        }
        Ok(desc)
    }

    fn check_attachment(&self, view: TextureViewHandle) -> Result<DummyView, String> {
        let info = self
            .views
            .get(&view.0)
            .cloned()
            .ok_or_else(|| format!("unknown view {}", view.0))?;
        if !info.usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            return Err(format!(
                "texture {} lacks RENDER_ATTACHMENT usage",
                info.texture
            ));
        }
        if !info.single_subresource {
            return Err(format!(
                "view {} spans more than one mip or layer",
                view.0
            ));
        }
        Ok(info)
    }

    fn validate_framebuffer(&self, desc: &RenderPassDescriptor) -> Result<(u32, u32), String> {
        let first = desc
            .color_attachments
            .first()
            .ok_or_else(|| "no color attachments".to_string())?;
        let color = self.check_attachment(first.view)?;
        if color.format.is_depth() {
            return Err("depth format used as color attachment".into());
        }
        for attachment in &desc.color_attachments[1..] {
            let other = self.check_attachment(attachment.view)?;
            if (other.width, other.height) != (color.width, color.height) {
                return Err("color attachments differ in size".into());
            }
        }
        if let Some(depth) = &desc.depth_stencil_attachment {
            let info = self.check_attachment(depth.view)?;
            if !info.format.is_depth() {
                return Err("depth attachment has a color format".into());
            }
            if (info.width, info.height) != (color.width, color.height) {
                return Err(format!(
                    "depth attachment {}x{} does not match color {}x{}",
                    info.width, info.height, color.width, color.height
                ));
            }
        }
        Ok((color.width, color.height))
    }
}

impl GraphicsBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn capabilities(&self) -> DeviceCapabilities {
        self.capabilities
    }

    fn validation_errors(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let id = self.allocate_id();
        self.buffers.insert(id, desc.clone());
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if data.len() as u64 > desc.size {
            return Err(BackendError::BufferCreationFailed(format!(
                "{} bytes do not fit in {:?} ({} bytes)",
                data.len(),
                desc.label,
                desc.size
            )));
        }
        self.create_buffer(desc)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        let fits = self
            .buffers
            .get(&buffer.0)
            .map(|desc| offset + data.len() as u64 <= desc.size);
        match fits {
            Some(true) => self.commands.push(DummyCommand::WriteBuffer {
                buffer,
                size: data.len(),
            }),
            Some(false) => self.report(DummyError::MissingResource {
                kind: "buffer range",
                id: buffer.0,
            }),
            None => self.report(DummyError::MissingResource {
                kind: "buffer",
                id: buffer.0,
            }),
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{}, {} mips)",
            desc.label,
            desc.width,
            desc.height,
            desc.depth,
            desc.mip_levels
        );
        if desc.width == 0 || desc.height == 0 || desc.mip_levels == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} has a zero dimension",
                desc.label
            )));
        }
        if desc.width.max(desc.height) > self.capabilities.max_texture_size {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} exceeds the maximum texture size {}",
                desc.label, self.capabilities.max_texture_size
            )));
        }
        if desc.dimension == TextureDimension::Cube && (desc.depth != 6 || desc.width != desc.height)
        {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?} is not a square six-layer cube",
                desc.label
            )));
        }
        let id = self.allocate_id();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        desc: &TextureViewDescriptor,
    ) -> BackendResult<TextureViewHandle> {
        let tex = self
            .textures
            .get(&texture.0)
            .ok_or(BackendError::MissingResource {
                kind: "texture",
                id: texture.0,
            })?;

        let mip_count = desc
            .mip_level_count
            .unwrap_or(tex.mip_levels.saturating_sub(desc.base_mip_level));
        let layer_count = desc
            .array_layer_count
            .unwrap_or(tex.depth.saturating_sub(desc.base_array_layer));
        if mip_count == 0
            || layer_count == 0
            || desc.base_mip_level + mip_count > tex.mip_levels
            || desc.base_array_layer + layer_count > tex.depth
        {
            return Err(BackendError::TextureCreationFailed(format!(
                "view {:?} outside {:?}",
                desc.label, tex.label
            )));
        }
        if desc.dimension == TextureViewDimension::Cube && layer_count != 6 {
            return Err(BackendError::TextureCreationFailed(format!(
                "cube view of {:?} needs six layers",
                tex.label
            )));
        }

        let (width, height) = tex.mip_size(desc.base_mip_level);
        let view = DummyView {
            texture: texture.0,
            width,
            height,
            format: tex.format,
            usage: tex.usage,
            single_subresource: mip_count == 1
                && layer_count == 1
                && desc.dimension == TextureViewDimension::D2,
        };
        let id = self.allocate_id();
        self.views.insert(id, view);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        region: &TextureRegion,
        data: &[u8],
    ) -> BackendResult<()> {
        let desc = self.validate_region(texture, region)?;
        let expected = (region.width * region.height * desc.format.bytes_per_pixel()) as usize;
        if data.len() != expected {
            return Err(BackendError::InvalidRegion(format!(
                "expected {} bytes for {:?}, got {}",
                expected,
                region,
                data.len()
            )));
        }
        self.commands.push(DummyCommand::WriteTexture {
            texture,
            region: *region,
        });
        self.submissions += 1;
        Ok(())
    }

    fn read_texture(
        &mut self,
        texture: TextureHandle,
        region: &TextureRegion,
    ) -> BackendResult<Vec<u8>> {
        if self.active_pass.is_some() {
            return Err(BackendError::ReadbackFailed(
                "readback inside a render pass".into(),
            ));
        }
        let bytes_per_pixel = self.validate_region(texture, region)?.format.bytes_per_pixel();
        self.commands.push(DummyCommand::ReadTexture {
            texture,
            region: *region,
        });
        self.submissions += 1;
        Ok(vec![0; (region.width * region.height * bytes_per_pixel) as usize])
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        Ok(SamplerHandle(self.allocate_id()))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        log::trace!(
            "DummyBackend: creating bind group layout ({} entries)",
            entries.len()
        );
        Ok(BindGroupLayoutHandle(self.allocate_id()))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        for (_, entry) in entries {
            match entry {
                BindGroupEntry::Buffer { buffer, .. } if !self.buffers.contains_key(&buffer.0) => {
                    return Err(BackendError::MissingResource {
                        kind: "buffer",
                        id: buffer.0,
                    });
                }
                BindGroupEntry::Texture(view) if !self.views.contains_key(&view.0) => {
                    return Err(BackendError::MissingResource {
                        kind: "texture view",
                        id: view.0,
                    });
                }
                _ => {}
            }
        }
        let id = self.allocate_id();
        self.bind_groups.insert(id, layout);
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        log::trace!("DummyBackend: creating render pipeline {:?}", desc.label);
        if !desc.shader.contains("vs_main") || !desc.shader.contains("fs_main") {
            return Err(BackendError::PipelineCreationFailed(format!(
                "{:?} is missing vs_main or fs_main",
                desc.label
            )));
        }
        let id = self.allocate_id();
        self.pipelines.insert(id, desc.label.clone());
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) -> BackendResult<()> {
        if self.active_pass.is_some() {
            let message = format!("{:?} begun inside another render pass", desc.label);
            self.report(DummyError::InvalidFramebuffer(message.clone()));
            return Err(BackendError::InvalidFramebuffer(message));
        }

        let (width, height) = match self.validate_framebuffer(desc) {
            Ok(size) => size,
            Err(message) => {
                let message = format!("{:?}: {}", desc.label, message);
                self.report(DummyError::InvalidFramebuffer(message.clone()));
                return Err(BackendError::InvalidFramebuffer(message));
            }
        };

        log::trace!(
            "DummyBackend: begin render pass {:?} ({}x{})",
            desc.label,
            width,
            height
        );
        self.commands.push(DummyCommand::BeginRenderPass {
            label: desc.label.clone(),
            color: desc.color_attachments[0].view,
            load_op: desc.color_attachments[0].load_op.clone(),
            width,
            height,
        });
        self.active_pass = Some(ActivePass {
            width,
            height,
            has_pipeline: false,
        });
        Ok(())
    }

    fn end_render_pass(&mut self) -> BackendResult<()> {
        if self.active_pass.take().is_none() {
            self.report(DummyError::OutsidePass("end_render_pass"));
            return Ok(());
        }
        self.commands.push(DummyCommand::EndRenderPass);
        self.submissions += 1;
        Ok(())
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        if !self.pipelines.contains_key(&pipeline.0) {
            self.report(DummyError::MissingResource {
                kind: "render pipeline",
                id: pipeline.0,
            });
            return;
        }
        if let Some(pass) = self.active_pass.as_mut() {
            pass.has_pipeline = true;
            self.commands.push(DummyCommand::SetPipeline(pipeline));
        } else {
            self.report(DummyError::OutsidePass("set_render_pipeline"));
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        if !self.bind_groups.contains_key(&bind_group.0) {
            self.report(DummyError::MissingResource {
                kind: "bind group",
                id: bind_group.0,
            });
            return;
        }
        if self.active_pass.is_none() {
            self.report(DummyError::OutsidePass("set_bind_group"));
            return;
        }
        self.commands
            .push(DummyCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        if self.active_pass.is_none() {
            self.report(DummyError::OutsidePass("set_vertex_buffer"));
            return;
        }
        self.commands
            .push(DummyCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        let Some(pass) = self.active_pass.as_ref() else {
            self.report(DummyError::OutsidePass("set_viewport"));
            return;
        };
        if !viewport.fits(pass.width, pass.height) {
            let (width, height) = (pass.width, pass.height);
            self.report(DummyError::ViewportOutOfBounds {
                viewport,
                width,
                height,
            });
        }
        self.commands.push(DummyCommand::SetViewport(viewport));
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        match self.active_pass.as_ref().map(|pass| pass.has_pipeline) {
            None => self.report(DummyError::OutsidePass("draw")),
            Some(false) => self.report(DummyError::DrawWithoutPipeline),
            Some(true) => self
                .commands
                .push(DummyCommand::Draw { vertices, instances }),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.views.retain(|_, view| view.texture != texture.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_target(backend: &mut DummyBackend, size: u32) -> TextureViewHandle {
        let texture = backend
            .create_texture(&TextureDescriptor::new_2d(
                "target",
                size,
                TextureFormat::Rgba16Float,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        backend
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap()
    }

    fn pass(view: TextureViewHandle) -> RenderPassDescriptor {
        RenderPassDescriptor {
            label: Some("test".into()),
            color_attachments: vec![ColorAttachment {
                view,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        }
    }

    #[test]
    fn test_viewport_outside_target_is_reported() {
        let mut backend = DummyBackend::new();
        let view = render_target(&mut backend, 64);
        backend.begin_render_pass(&pass(view)).unwrap();
        backend.set_viewport(Viewport::new(32, 32, 64, 64));
        backend.end_render_pass().unwrap();

        assert_eq!(backend.errors().len(), 1);
        assert!(matches!(
            backend.errors()[0],
            DummyError::ViewportOutOfBounds { width: 64, .. }
        ));
    }

    #[test]
    fn test_whole_cube_view_is_not_a_framebuffer() {
        let mut backend = DummyBackend::new();
        let cube = backend
            .create_texture(&TextureDescriptor::new_cube(
                "cube",
                32,
                1,
                TextureFormat::Rgba16Float,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        let whole = backend
            .create_texture_view(cube, &TextureViewDescriptor::cube())
            .unwrap();
        let face = backend
            .create_texture_view(cube, &TextureViewDescriptor::cube_face(3, 0))
            .unwrap();

        assert!(backend.begin_render_pass(&pass(whole)).is_err());
        assert!(backend.begin_render_pass(&pass(face)).is_ok());
        backend.end_render_pass().unwrap();
        assert_eq!(backend.errors().len(), 1);
    }

    #[test]
    fn test_sampled_only_texture_is_not_a_framebuffer() {
        let mut backend = DummyBackend::new();
        let texture = backend
            .create_texture(&TextureDescriptor::new_2d(
                "sampled",
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        let view = backend
            .create_texture_view(texture, &TextureViewDescriptor::default())
            .unwrap();
        assert!(matches!(
            backend.begin_render_pass(&pass(view)),
            Err(BackendError::InvalidFramebuffer(_))
        ));
    }

    #[test]
    fn test_draw_without_pipeline_is_reported() {
        let mut backend = DummyBackend::new();
        let view = render_target(&mut backend, 8);
        backend.begin_render_pass(&pass(view)).unwrap();
        backend.draw(0..3, 0..1);
        backend.end_render_pass().unwrap();
        assert_eq!(backend.errors(), &[DummyError::DrawWithoutPipeline]);
        assert_eq!(backend.submission_count(), 1);
    }

    #[test]
    fn test_readback_returns_packed_region() {
        let mut backend = DummyBackend::new();
        let texture = backend
            .create_texture(&TextureDescriptor::new_2d(
                "readback",
                128,
                TextureFormat::Rgba16Float,
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC,
            ))
            .unwrap();
        let region = TextureRegion {
            mip_level: 0,
            layer: 0,
            x: 64,
            y: 0,
            width: 64,
            height: 32,
        };
        let bytes = backend.read_texture(texture, &region).unwrap();
        assert_eq!(bytes.len(), 64 * 32 * 8);

        let outside = TextureRegion { x: 100, ..region };
        assert!(backend.read_texture(texture, &outside).is_err());
    }
}
