//! Six-face cubemap rendering
//!
//! Face order, targets and up vectors follow the usual cube texture layout.
//! The projection is pre-multiplied by a Y flip so that what lands in each
//! face texture matches the direction a cube sampler looks up, with texel
//! rows running top to bottom. Scene pipelines drawn through the renderer see
//! their winding reversed and should cull with that in mind.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::ProbeResult;
use crate::resources::CubemapTarget;
use glam::{Mat4, Vec3};

/// One fixed face of the capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeFaceDescriptor {
    /// Eye position, always the probe origin
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl CubeFaceDescriptor {
    const fn new(target: Vec3, up: Vec3) -> Self {
        Self {
            eye: Vec3::ZERO,
            target,
            up,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.eye + self.target, self.up)
    }
}

/// +X, -X, +Y, -Y, +Z, -Z
pub const CUBE_FACES: [CubeFaceDescriptor; 6] = [
    CubeFaceDescriptor::new(Vec3::X, Vec3::NEG_Y),
    CubeFaceDescriptor::new(Vec3::NEG_X, Vec3::NEG_Y),
    CubeFaceDescriptor::new(Vec3::Y, Vec3::Z),
    CubeFaceDescriptor::new(Vec3::NEG_Y, Vec3::NEG_Z),
    CubeFaceDescriptor::new(Vec3::Z, Vec3::NEG_Y),
    CubeFaceDescriptor::new(Vec3::NEG_Z, Vec3::NEG_Y),
];

/// What a scene draw callback gets for each face
#[derive(Debug, Clone, Copy)]
pub struct CubeFaceContext {
    pub face: usize,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    /// Face edge length at the rendered mip
    pub size: u32,
    pub mip_level: u32,
    pub color_format: TextureFormat,
    /// `Some` when a depth attachment is bound
    pub depth_format: Option<TextureFormat>,
}

/// Renders a callback once per cube face
#[derive(Debug, Clone)]
pub struct CubemapRenderer {
    pub near: f32,
    pub far: f32,
    pub clear_color: [f32; 4],
}

impl Default for CubemapRenderer {
    fn default() -> Self {
        Self {
            near: 0.001,
            far: 50.0,
            clear_color: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl CubemapRenderer {
    pub fn new(near: f32, far: f32, clear_color: [f32; 4]) -> Self {
        Self {
            near,
            far,
            clear_color,
        }
    }

    /// 90 degree square projection with the Y flip applied
    pub fn projection(&self) -> Mat4 {
        Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0))
            * Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, self.near, self.far)
    }

    pub fn face_view(face: usize) -> Mat4 {
        CUBE_FACES[face].view_matrix()
    }

    pub fn face_context(
        &self,
        face: usize,
        size: u32,
        mip_level: u32,
        color_format: TextureFormat,
        depth_format: Option<TextureFormat>,
    ) -> CubeFaceContext {
        let view = Self::face_view(face);
        let projection = self.projection();
        CubeFaceContext {
            face,
            view,
            projection,
            view_projection: projection * view,
            size,
            mip_level,
            color_format,
            depth_format,
        }
    }

    /// Render one face: clear, set the face viewport and call `draw`.
    ///
    /// The pass is always ended, also when `draw` fails.
    pub fn render_face<B, F>(
        &self,
        backend: &mut B,
        ctx: &CubeFaceContext,
        color_view: TextureViewHandle,
        depth_view: Option<TextureViewHandle>,
        draw: &mut F,
    ) -> ProbeResult<()>
    where
        B: GraphicsBackend,
        F: FnMut(&mut B, &CubeFaceContext) -> ProbeResult<()>,
    {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(format!("Cubemap Face {}", ctx.face)),
            color_attachments: vec![ColorAttachment {
                view: color_view,
                load_op: LoadOp::Clear(self.clear_color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: depth_view.map(|view| DepthStencilAttachment {
                view,
                depth_load_op: LoadOp::Clear([1.0, 0.0, 0.0, 0.0]),
                depth_store_op: StoreOp::Discard,
                depth_clear_value: 1.0,
            }),
        })?;
        backend.set_viewport(Viewport::square(ctx.size));

        let result = draw(backend, ctx);
        backend.end_render_pass()?;
        result
    }

    /// Render all six faces of `target` at mip 0
    pub fn render_to_cubemap<B, F>(
        &self,
        backend: &mut B,
        target: &CubemapTarget,
        draw: F,
    ) -> ProbeResult<()>
    where
        B: GraphicsBackend,
        F: FnMut(&mut B, &CubeFaceContext) -> ProbeResult<()>,
    {
        self.render_to_cubemap_level(backend, target, 0, draw)
    }

    /// Render all six faces of `target` at `mip_level`, with depth if the
    /// target has it
    pub fn render_to_cubemap_level<B, F>(
        &self,
        backend: &mut B,
        target: &CubemapTarget,
        mip_level: u32,
        draw: F,
    ) -> ProbeResult<()>
    where
        B: GraphicsBackend,
        F: FnMut(&mut B, &CubeFaceContext) -> ProbeResult<()>,
    {
        self.render_faces(backend, target, mip_level, true, draw)
    }

    /// Render all six faces; kernels pass `use_depth = false`
    pub(crate) fn render_faces<B, F>(
        &self,
        backend: &mut B,
        target: &CubemapTarget,
        mip_level: u32,
        use_depth: bool,
        mut draw: F,
    ) -> ProbeResult<()>
    where
        B: GraphicsBackend,
        F: FnMut(&mut B, &CubeFaceContext) -> ProbeResult<()>,
    {
        let depth_view = if use_depth {
            target.depth_view(mip_level)
        } else {
            None
        };
        let size = target.face_size(mip_level);

        for face in 0..CUBE_FACES.len() {
            let color_view = target.face_view(face, mip_level).ok_or(
                BackendError::MissingResource {
                    kind: "cube face view",
                    id: mip_level as u64,
                },
            )?;
            let ctx = self.face_context(
                face,
                size,
                mip_level,
                target.format,
                depth_view.map(|_| TextureFormat::Depth32Float),
            );
            self.render_face(backend, &ctx, color_view, depth_view, &mut draw)?;
        }

        log::trace!(
            "Rendered cubemap {} mip {} ({}px)",
            target.name,
            mip_level,
            size
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use crate::error::ProbeError;
    use glam::Vec4;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_face_orientation() {
        for (face, desc) in CUBE_FACES.iter().enumerate() {
            let view = CubemapRenderer::face_view(face);
            let forward = -view.row(2).truncate();
            let up = view.row(1).truncate();
            assert!(forward.distance(desc.target) < EPSILON, "face {}", face);
            assert!(up.distance(desc.up) < EPSILON, "face {}", face);
            assert_eq!(desc.eye, Vec3::ZERO);
        }
    }

    #[test]
    fn test_faces_cover_all_axes() {
        let mut sum = Vec3::ZERO;
        for desc in CUBE_FACES.iter() {
            assert!(desc.target.dot(desc.up).abs() < EPSILON);
            sum += desc.target.abs();
        }
        assert_eq!(sum, Vec3::splat(2.0));
    }

    #[test]
    fn test_projection_flips_y() {
        let renderer = CubemapRenderer::default();
        let ctx = renderer.face_context(4, 64, 0, TextureFormat::Rgba16Float, None);

        // +Z face with -Y up: the flip puts world +Y in the upper half of
        // the face texture, which is positive clip space y
        let clip = ctx.view_projection * Vec4::new(0.0, 0.5, 1.0, 1.0);
        assert!(clip.y / clip.w > 0.0);
        let centre = ctx.view_projection * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert!((centre.x / centre.w).abs() < EPSILON);
        assert!((centre.y / centre.w).abs() < EPSILON);
    }

    #[test]
    fn test_render_to_cubemap_six_passes() {
        let mut backend = DummyBackend::new();
        let target =
            CubemapTarget::new(&mut backend, "capture", 64, 1, TextureFormat::Rgba16Float, true)
                .unwrap();
        backend.clear_log();

        let renderer = CubemapRenderer::default();
        let mut faces = Vec::new();
        renderer
            .render_to_cubemap(&mut backend, &target, |_, ctx| {
                faces.push((ctx.face, ctx.size, ctx.depth_format));
                Ok(())
            })
            .unwrap();

        assert_eq!(faces.len(), 6);
        assert!(faces
            .iter()
            .enumerate()
            .all(|(i, f)| *f == (i, 64, Some(TextureFormat::Depth32Float))));
        assert_eq!(
            backend.viewports_for("Cubemap Face"),
            vec![Viewport::square(64); 6]
        );
        assert_eq!(backend.submission_count(), 6);
        assert!(backend.errors().is_empty());
    }

    #[test]
    fn test_render_lower_mip() {
        let mut backend = DummyBackend::new();
        let target =
            CubemapTarget::new(&mut backend, "capture", 64, 3, TextureFormat::Rgba16Float, true)
                .unwrap();
        backend.clear_log();

        CubemapRenderer::default()
            .render_to_cubemap_level(&mut backend, &target, 2, |_, ctx| {
                assert_eq!(ctx.size, 16);
                Ok(())
            })
            .unwrap();
        assert_eq!(
            backend.viewports_for("Cubemap Face"),
            vec![Viewport::square(16); 6]
        );
        assert!(backend.errors().is_empty());
    }

    #[test]
    fn test_draw_error_propagates_and_closes_pass() {
        let mut backend = DummyBackend::new();
        let target =
            CubemapTarget::new(&mut backend, "capture", 32, 1, TextureFormat::Rgba16Float, false)
                .unwrap();
        backend.clear_log();

        let result = CubemapRenderer::default().render_to_cubemap(&mut backend, &target, |_, ctx| {
            if ctx.face == 2 {
                Err(ProbeError::Scene("broken mesh".into()))
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(ProbeError::Scene(_))));
        assert_eq!(backend.submission_count(), 3);
        assert!(backend.errors().is_empty());
    }
}
