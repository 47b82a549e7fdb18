//! Shared helpers for the bake integration tests.

use glam::{Vec2, Vec3};
use reflection_probes::backend::{
    BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry, BindingType, BufferDescriptor,
    BufferHandle, BufferUsage, ColorTargetState, CompareFunction, CullMode, DepthStencilState,
    FrontFace, PrimitiveTopology, RenderPipelineDescriptor, RenderPipelineHandle,
    ShaderStageFlags, TextureFormat, VertexAttribute, VertexBufferLayout, VertexFormat,
};
use reflection_probes::sampling::oct_decode;
use reflection_probes::{CubeFaceContext, GraphicsBackend, ProbeResult, PROBE_TEXTURE_FORMAT};

/// Backends the integration tests run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Records and validates commands, renders nothing
    Dummy,
    /// Headless wgpu on whatever adapter is available
    Wgpu,
}

impl Backend {
    /// Whether textures read back from this backend hold real pixels
    pub fn renders_pixels(&self) -> bool {
        matches!(self, Backend::Wgpu)
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Run `$body` with `$b` bound to a `&mut` backend of the requested kind,
/// skipping the test when that backend is not available.
#[macro_export]
macro_rules! with_backend {
    ($kind:expr, |$b:ident| $body:expr) => {
        match $kind {
            common::Backend::Dummy => {
                let mut backend = reflection_probes::DummyBackend::new();
                let $b = &mut backend;
                $body
            }
            #[cfg(feature = "wgpu-backend")]
            common::Backend::Wgpu => match reflection_probes::WgpuBackend::new_headless() {
                Ok(mut backend) => {
                    let $b = &mut backend;
                    $body
                }
                Err(e) => {
                    eprintln!("wgpu not available, skipping: {}", e);
                }
            },
            #[cfg(not(feature = "wgpu-backend"))]
            common::Backend::Wgpu => {
                eprintln!("wgpu backend not built, skipping");
            }
        }
    };
}

const WHITE_SCENE_SHADER: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    return vec4<f32>(uv * 2.0 - 1.0, 0.5, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

/// A scene that covers every face with white, drawn against the capture depth.
#[allow(dead_code)]
pub struct WhiteScene {
    pipeline: RenderPipelineHandle,
}

#[allow(dead_code)]
impl WhiteScene {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Self {
        let pipeline = backend
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("White Scene".into()),
                shader: WHITE_SCENE_SHADER.into(),
                vertex_layouts: vec![],
                bind_group_layouts: vec![],
                primitive_topology: PrimitiveTopology::TriangleList,
                front_face: FrontFace::Ccw,
                cull_mode: CullMode::None,
                depth_stencil: Some(DepthStencilState {
                    format: TextureFormat::Depth32Float,
                    depth_write_enabled: false,
                    depth_compare: CompareFunction::Always,
                }),
                color_targets: vec![ColorTargetState { format: PROBE_TEXTURE_FORMAT }],
            })
            .expect("Failed to create scene pipeline");
        Self { pipeline }
    }

    pub fn draw<B: GraphicsBackend>(&self, backend: &mut B, face: &CubeFaceContext) -> ProbeResult<()> {
        assert_eq!(face.depth_format, Some(TextureFormat::Depth32Float));
        backend.set_render_pipeline(self.pipeline);
        backend.draw(0..3, 0..1);
        Ok(())
    }
}

/// Largest per-channel distance from white over the rgb of `texels`
#[allow(dead_code)]
pub fn max_distance_from_white(texels: &[[f32; 4]]) -> f32 {
    texels
        .iter()
        .flat_map(|t| t[..3].iter())
        .map(|c| (c - 1.0).abs())
        .fold(0.0, f32::max)
}

const DIRECTION_SCENE_SHADER: &str = r#"
struct FaceUniforms {
    inv_view_proj: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> scene: FaceUniforms;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(position, 0.5, 1.0);
    out.ndc = position;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let world = scene.inv_view_proj * vec4<f32>(input.ndc, 1.0, 1.0);
    return vec4<f32>(normalize(world.xyz / world.w), 1.0);
}
"#;

/// A scene whose colour is the world direction of every pixel, so any face
/// flip or mapping mistake shows up as a wrong colour.
///
/// The triangle comes from a vertex buffer and each face has its own
/// uniform buffer, written when the face is drawn.
pub struct DirectionScene {
    pipeline: RenderPipelineHandle,
    vertices: BufferHandle,
    faces: Vec<(BufferHandle, BindGroupHandle)>,
}

impl DirectionScene {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> Self {
        let layout = backend
            .create_bind_group_layout(&[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            }])
            .expect("Failed to create scene layout");
        let pipeline = backend
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("Direction Scene".into()),
                shader: DIRECTION_SCENE_SHADER.into(),
                vertex_layouts: vec![VertexBufferLayout {
                    array_stride: VertexFormat::Float32x2.size(),
                    attributes: vec![VertexAttribute {
                        location: 0,
                        format: VertexFormat::Float32x2,
                        offset: 0,
                    }],
                }],
                bind_group_layouts: vec![layout],
                primitive_topology: PrimitiveTopology::TriangleList,
                front_face: FrontFace::Ccw,
                cull_mode: CullMode::None,
                depth_stencil: Some(DepthStencilState {
                    format: TextureFormat::Depth32Float,
                    depth_write_enabled: false,
                    depth_compare: CompareFunction::Always,
                }),
                color_targets: vec![ColorTargetState { format: PROBE_TEXTURE_FORMAT }],
            })
            .expect("Failed to create scene pipeline");

        let triangle: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];
        let vertices = backend
            .create_buffer_init(
                &BufferDescriptor {
                    label: Some("Direction Scene Vertices".into()),
                    size: std::mem::size_of_val(&triangle) as u64,
                    usage: BufferUsage::VERTEX,
                },
                bytemuck::cast_slice(&triangle),
            )
            .expect("Failed to create vertex buffer");

        let faces = (0..6)
            .map(|face| {
                let buffer = backend
                    .create_buffer(&BufferDescriptor {
                        label: Some(format!("Direction Scene Face {}", face)),
                        size: std::mem::size_of::<glam::Mat4>() as u64,
                        usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
                    })
                    .expect("Failed to create uniform buffer");
                let bind_group = backend
                    .create_bind_group(
                        layout,
                        &[(
                            0,
                            BindGroupEntry::Buffer {
                                buffer,
                                offset: 0,
                                size: None,
                            },
                        )],
                    )
                    .expect("Failed to create bind group");
                (buffer, bind_group)
            })
            .collect();

        Self {
            pipeline,
            vertices,
            faces,
        }
    }

    pub fn draw<B: GraphicsBackend>(&self, backend: &mut B, face: &CubeFaceContext) -> ProbeResult<()> {
        let (buffer, bind_group) = self.faces[face.face];
        let inv_view_proj = face.view_projection.inverse();
        backend.write_buffer(buffer, 0, bytemuck::bytes_of(&inv_view_proj));
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, bind_group);
        backend.set_vertex_buffer(0, self.vertices, 0);
        backend.draw(0..3, 0..1);
        Ok(())
    }
}

/// Direction at the centre of texel `(x, y)` of a `size` octahedral map
pub fn oct_texel_direction(x: u32, y: u32, size: u32) -> Vec3 {
    let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size as f32;
    oct_decode(uv)
}

/// Largest and mean per-channel distance between a `size` octahedral map
/// read back row by row and `scale` times the direction of each texel
pub fn direction_errors(texels: &[[f32; 4]], size: u32, scale: f32) -> (f32, f32) {
    assert_eq!(texels.len(), (size * size) as usize);
    let mut max = 0.0f32;
    let mut sum = 0.0f32;
    for (i, texel) in texels.iter().enumerate() {
        let (x, y) = (i as u32 % size, i as u32 / size);
        let expected = oct_texel_direction(x, y, size) * scale;
        let error = (Vec3::new(texel[0], texel[1], texel[2]) - expected)
            .abs()
            .max_element();
        max = max.max(error);
        sum += error;
    }
    (max, sum / texels.len() as f32)
}
