//! Probe baking passes
//!
//! Every filtering step is a full-screen triangle drawn with one of a small
//! family of WGSL kernels. A kernel is assembled from three pieces:
//! - a source snippet that defines `sample_source(dir)` for either a cube
//!   texture or an octahedral region of the atlas,
//! - a target snippet that defines `texel_direction_at(pixel)` for either a
//!   cube face or an octahedral viewport,
//! - a body with the `fs_main` entry point.
//!
//! All kernels share one bind group layout per source kind:
//! uniforms at binding 0, source texture at 1, sampler at 2 and the
//! Hammersley table at 3.

pub mod blit;
pub mod convolve;
pub mod cubemap_renderer;
pub mod downsample;
pub mod octahedral;
pub mod prefilter;

pub use blit::AtlasBlitter;
pub use convolve::CubemapConvolver;
pub use cubemap_renderer::{CubeFaceContext, CubeFaceDescriptor, CubemapRenderer, CUBE_FACES};
pub use downsample::CubemapDownsampler;
pub use octahedral::OctahedralProjector;
pub use prefilter::{CubemapPrefilter, PrefilterOptions, PrefilterStrategy};

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::ProbeResult;
use crate::resources::{GpuTexture, HammersleyTexture};
use glam::Vec4;

/// Format of every texture the kernels render into
pub const PROBE_TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Kind of texture bound as the kernel source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A cube texture sampled by direction
    Cube,
    /// A 2D texture, sampled through an octahedral region of it
    Texture2d,
}

/// Kind of surface the kernel writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// One cube face, directions from the inverse face view-projection
    CubeFace,
    /// An octahedral map inside the target viewport
    Octahedral,
}

impl SourceKind {
    fn wgsl(&self) -> &'static str {
        match self {
            SourceKind::Cube => SOURCE_CUBE,
            SourceKind::Texture2d => SOURCE_TEXTURE_2D,
        }
    }
}

impl TargetKind {
    fn wgsl(&self) -> &'static str {
        match self {
            TargetKind::CubeFace => TARGET_CUBE_FACE,
            TargetKind::Octahedral => TARGET_OCTAHEDRAL,
        }
    }
}

/// Assemble a complete kernel module
pub fn kernel_shader(source: SourceKind, target: TargetKind, body: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        KERNEL_COMMON,
        source.wgsl(),
        target.wgsl(),
        body
    )
}

/// `(width, height, 1 / width, 1 / height)` of a texture
pub fn texture_size(texture: &GpuTexture) -> Vec4 {
    let width = texture.width as f32;
    let height = texture.height as f32;
    Vec4::new(width, height, 1.0 / width, 1.0 / height)
}

/// `(0, 0, size, size)`
pub fn square_rect(size: u32) -> Vec4 {
    Vec4::new(0.0, 0.0, size as f32, size as f32)
}

/// Layouts, sampler and placeholder sample table shared by a set of kernels
pub struct KernelContext {
    cube_layout: BindGroupLayoutHandle,
    texture_layout: BindGroupLayoutHandle,
    sampler: SamplerHandle,
    placeholder_samples: HammersleyTexture,
}

impl KernelContext {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> BackendResult<Self> {
        let cube_layout = backend.create_bind_group_layout(&Self::layout_entries(
            TextureViewDimension::Cube,
        ))?;
        let texture_layout = backend
            .create_bind_group_layout(&Self::layout_entries(TextureViewDimension::D2))?;

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Probe Kernel Sampler".into()),
            ..Default::default()
        })?;

        // Kernels that take no samples still need something at binding 3
        let placeholder_samples = HammersleyTexture::new(backend, 1)?;

        Ok(Self {
            cube_layout,
            texture_layout,
            sampler,
            placeholder_samples,
        })
    }

    fn layout_entries(source_dimension: TextureViewDimension) -> Vec<BindGroupLayoutEntry> {
        vec![
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: source_dimension,
                },
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler,
            },
            BindGroupLayoutEntry {
                binding: 3,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: false },
                    view_dimension: TextureViewDimension::D2,
                },
            },
        ]
    }

    pub fn layout(&self, source: SourceKind) -> BindGroupLayoutHandle {
        match source {
            SourceKind::Cube => self.cube_layout,
            SourceKind::Texture2d => self.texture_layout,
        }
    }
}

/// A source texture bound for one kernel family, with its own uniform buffer
pub struct KernelBinding {
    bind_group: BindGroupHandle,
    uniforms: BufferHandle,
    source: SourceKind,
}

impl KernelBinding {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        ctx: &KernelContext,
        source: SourceKind,
        source_view: TextureViewHandle,
        samples: Option<TextureViewHandle>,
    ) -> BackendResult<Self> {
        let uniforms = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Kernel Uniforms".into()),
                size: std::mem::size_of::<KernelUniforms>() as u64,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            },
            bytemuck::bytes_of(&KernelUniforms::default()),
        )?;

        let samples = samples.unwrap_or_else(|| ctx.placeholder_samples.view());
        let bind_group = backend.create_bind_group(
            ctx.layout(source),
            &[
                (
                    0,
                    BindGroupEntry::Buffer {
                        buffer: uniforms,
                        offset: 0,
                        size: None,
                    },
                ),
                (1, BindGroupEntry::Texture(source_view)),
                (2, BindGroupEntry::Sampler(ctx.sampler)),
                (3, BindGroupEntry::Texture(samples)),
            ],
        )?;

        Ok(Self {
            bind_group,
            uniforms,
            source,
        })
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn write<B: GraphicsBackend>(&self, backend: &mut B, uniforms: &KernelUniforms) {
        backend.write_buffer(self.uniforms, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_bind_group(self.bind_group);
        backend.destroy_buffer(self.uniforms);
    }
}

/// Keeps one binding alive for the most recently used source view
#[derive(Default)]
pub struct BindingCache {
    entry: Option<(TextureViewHandle, KernelBinding)>,
}

impl BindingCache {
    /// Binding for `source_view`, rebuilt when the source changes
    pub fn binding_for<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        ctx: &KernelContext,
        source: SourceKind,
        source_view: TextureViewHandle,
        samples: Option<TextureViewHandle>,
    ) -> BackendResult<&KernelBinding> {
        let stale = !matches!(&self.entry, Some((view, _)) if *view == source_view);
        if stale {
            self.invalidate(backend);
            let binding = KernelBinding::new(backend, ctx, source, source_view, samples)?;
            self.entry = Some((source_view, binding));
        }
        match &self.entry {
            Some((_, binding)) => Ok(binding),
            None => Err(BackendError::MissingResource {
                kind: "kernel binding",
                id: source_view.0,
            }),
        }
    }

    pub fn invalidate<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some((_, binding)) = self.entry.take() {
            binding.destroy(backend);
        }
    }
}

/// A full-screen kernel pipeline
pub struct FullscreenKernel {
    pipeline: RenderPipelineHandle,
    source: SourceKind,
    label: String,
}

impl FullscreenKernel {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        ctx: &KernelContext,
        label: &str,
        source: SourceKind,
        target: TargetKind,
        body: &str,
    ) -> BackendResult<Self> {
        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label.to_string()),
            shader: kernel_shader(source, target, body),
            vertex_layouts: vec![],
            bind_group_layouts: vec![ctx.layout(source)],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![ColorTargetState { format: PROBE_TEXTURE_FORMAT }],
        })?;

        Ok(Self {
            pipeline,
            source,
            label: label.to_string(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Draw into the current render pass, keeping the viewport the pass
    /// already set.
    ///
    /// The uniforms are written to the binding's buffer, so a binding can be
    /// drawn only once per pass.
    pub fn draw<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        binding: &KernelBinding,
        uniforms: &KernelUniforms,
    ) {
        debug_assert_eq!(binding.source(), self.source, "{}: wrong binding", self.label);
        binding.write(backend, uniforms);
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, binding.bind_group);
        backend.draw(0..3, 0..1);
    }

    /// Draw in a render pass of its own
    pub fn run<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        binding: &KernelBinding,
        target_view: TextureViewHandle,
        load_op: LoadOp,
        viewport: Viewport,
        uniforms: &KernelUniforms,
    ) -> ProbeResult<()> {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(self.label.clone()),
            color_attachments: vec![ColorAttachment {
                view: target_view,
                load_op,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        })?;
        backend.set_viewport(viewport);
        self.draw(backend, binding, uniforms);
        backend.end_render_pass()?;
        Ok(())
    }
}

/// Shared declarations, the full-screen vertex stage and the mapping helpers
pub const KERNEL_COMMON: &str = r#"
struct KernelUniforms {
    inv_view_proj: mat4x4<f32>,
    // (x, y, width, height) in target pixels
    target_rect: vec4<f32>,
    // (x, y, width, height) in source pixels
    source_rect: vec4<f32>,
    // (width, height, 1 / width, 1 / height) of the source
    source_size: vec4<f32>,
    // roughness, sample count, source lod
    params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: KernelUniforms;
@group(0) @binding(3) var sample_points: texture_2d<f32>;

const PI: f32 = 3.14159265359;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);
    return output;
}

fn sign_not_zero(v: vec2<f32>) -> vec2<f32> {
    return select(vec2<f32>(-1.0), vec2<f32>(1.0), v >= vec2<f32>(0.0));
}

// y is the hemisphere axis, u follows x and v follows z
fn oct_encode(dir: vec3<f32>) -> vec2<f32> {
    let n = dir / (abs(dir.x) + abs(dir.y) + abs(dir.z));
    var xz = n.xz;
    if (n.y < 0.0) {
        xz = (vec2<f32>(1.0) - abs(n.zx)) * sign_not_zero(n.xz);
    }
    return xz * 0.5 + 0.5;
}

fn oct_decode(uv: vec2<f32>) -> vec3<f32> {
    let p = uv * 2.0 - 1.0;
    let y = 1.0 - abs(p.x) - abs(p.y);
    var xz = p;
    if (y < 0.0) {
        xz = (vec2<f32>(1.0) - abs(p.yx)) * sign_not_zero(p);
    }
    return normalize(vec3<f32>(xz.x, y, xz.y));
}

fn hammersley_point(i: u32) -> vec2<f32> {
    return textureLoad(sample_points, vec2<i32>(i32(i), 0), 0).xy;
}

fn tangent_to_world(v: vec3<f32>, n: vec3<f32>) -> vec3<f32> {
    var up = vec3<f32>(0.0, 0.0, 1.0);
    if (abs(n.z) >= 0.999) {
        up = vec3<f32>(1.0, 0.0, 0.0);
    }
    let tangent = normalize(cross(n, up));
    let bitangent = cross(n, tangent);
    return normalize(tangent * v.x + bitangent * v.y + n * v.z);
}
"#;

const SOURCE_CUBE: &str = r#"
@group(0) @binding(1) var source_texture: texture_cube<f32>;
@group(0) @binding(2) var source_sampler: sampler;

fn sample_source(dir: vec3<f32>) -> vec3<f32> {
    return textureSampleLevel(source_texture, source_sampler, dir, uniforms.params.z).rgb;
}
"#;

const SOURCE_TEXTURE_2D: &str = r#"
@group(0) @binding(1) var source_texture: texture_2d<f32>;
@group(0) @binding(2) var source_sampler: sampler;

fn sample_source_pixel(pixel: vec2<f32>) -> vec3<f32> {
    return textureSampleLevel(source_texture, source_sampler, pixel * uniforms.source_size.zw, 0.0).rgb;
}

// Clamped half a texel inside the region so filtering never reads a neighbour
fn sample_source(dir: vec3<f32>) -> vec3<f32> {
    let size = uniforms.source_rect.zw;
    let local = clamp(oct_encode(dir) * size, vec2<f32>(0.5), size - vec2<f32>(0.5));
    return sample_source_pixel(uniforms.source_rect.xy + local);
}
"#;

const TARGET_CUBE_FACE: &str = r#"
fn texel_direction_at(pixel: vec2<f32>) -> vec3<f32> {
    let local = (pixel - uniforms.target_rect.xy) / uniforms.target_rect.zw;
    let ndc = vec2<f32>(local.x * 2.0 - 1.0, 1.0 - local.y * 2.0);
    let world = uniforms.inv_view_proj * vec4<f32>(ndc, 1.0, 1.0);
    return normalize(world.xyz / world.w);
}
"#;

const TARGET_OCTAHEDRAL: &str = r#"
fn texel_direction_at(pixel: vec2<f32>) -> vec3<f32> {
    let local = (pixel - uniforms.target_rect.xy) / uniforms.target_rect.zw;
    return oct_decode(local);
}
"#;

/// Sample the source in each texel's direction
pub const PROJECT_BODY: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let dir = texel_direction_at(input.position.xy);
    return vec4<f32>(sample_source(dir), 1.0);
}
"#;

/// Average four directions spread over the target texel
pub const DOWNSAMPLE_CUBE_BODY: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var color = vec3<f32>(0.0);
    for (var i = 0u; i < 4u; i = i + 1u) {
        let offset = vec2<f32>(f32(i & 1u), f32(i >> 1u)) * 0.5 - vec2<f32>(0.25);
        color = color + sample_source(texel_direction_at(input.position.xy + offset));
    }
    return vec4<f32>(color * 0.25, 1.0);
}
"#;

/// One bilinear tap at the centre of the 2x2 source block under each texel
pub const DOWNSAMPLE_REGION_BODY: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let local = (input.position.xy - uniforms.target_rect.xy) / uniforms.target_rect.zw;
    let pixel = uniforms.source_rect.xy + local * uniforms.source_rect.zw;
    return vec4<f32>(sample_source_pixel(pixel), 1.0);
}
"#;

/// Cosine weighted hemisphere average
pub const CONVOLVE_BODY: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let n = texel_direction_at(input.position.xy);
    let count = max(u32(uniforms.params.y), 1u);

    var irradiance = vec3<f32>(0.0);
    for (var i = 0u; i < count; i = i + 1u) {
        let xi = hammersley_point(i);
        let phi = 2.0 * PI * xi.x;
        let cos_theta = sqrt(1.0 - xi.y);
        let sin_theta = sqrt(xi.y);
        let l = tangent_to_world(vec3<f32>(cos(phi) * sin_theta, sin(phi) * sin_theta, cos_theta), n);
        irradiance = irradiance + sample_source(l);
    }
    return vec4<f32>(irradiance / f32(count), 1.0);
}
"#;

/// GGX importance sampled prefilter with V = N
pub const PREFILTER_BODY: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let n = texel_direction_at(input.position.xy);
    let roughness = uniforms.params.x;
    let a = roughness * roughness;
    let count = max(u32(uniforms.params.y), 1u);

    var color = vec3<f32>(0.0);
    var total_weight = 0.0;
    for (var i = 0u; i < count; i = i + 1u) {
        let xi = hammersley_point(i);
        let phi = 2.0 * PI * xi.x;
        let cos_theta = sqrt((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y));
        let sin_theta = sqrt(max(1.0 - cos_theta * cos_theta, 0.0));
        let h = tangent_to_world(vec3<f32>(cos(phi) * sin_theta, sin(phi) * sin_theta, cos_theta), n);
        let l = normalize(2.0 * dot(n, h) * h - n);

        let n_dot_l = dot(n, l);
        if (n_dot_l > 0.0) {
            color = color + sample_source(l) * n_dot_l;
            total_weight = total_weight + n_dot_l;
        }
    }
    return vec4<f32>(color / max(total_weight, 0.001), 1.0);
}
"#;

/// Texel exact copy from the source rect to the target rect
pub const BLIT_BODY: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let offset = floor(input.position.xy - uniforms.target_rect.xy);
    let texel = vec2<i32>(uniforms.source_rect.xy + offset);
    return vec4<f32>(textureLoad(source_texture, texel, 0).rgb, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;
    use rstest::rstest;

    fn validate_wgsl(source: &str) {
        let module = match naga::front::wgsl::parse_str(source) {
            Ok(module) => module,
            Err(e) => panic!("{}", e.emit_to_string(source)),
        };
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::empty(),
        )
        .validate(&module)
        .unwrap_or_else(|e| panic!("{:?}", e));
    }

    #[rstest]
    #[case::project(SourceKind::Cube, TargetKind::Octahedral, PROJECT_BODY)]
    #[case::downsample_cube(SourceKind::Cube, TargetKind::CubeFace, DOWNSAMPLE_CUBE_BODY)]
    #[case::downsample_region(SourceKind::Texture2d, TargetKind::Octahedral, DOWNSAMPLE_REGION_BODY)]
    #[case::convolve_cube(SourceKind::Cube, TargetKind::CubeFace, CONVOLVE_BODY)]
    #[case::convolve_region(SourceKind::Texture2d, TargetKind::Octahedral, CONVOLVE_BODY)]
    #[case::prefilter_cube(SourceKind::Cube, TargetKind::CubeFace, PREFILTER_BODY)]
    #[case::prefilter_region(SourceKind::Texture2d, TargetKind::Octahedral, PREFILTER_BODY)]
    #[case::blit(SourceKind::Texture2d, TargetKind::Octahedral, BLIT_BODY)]
    fn test_kernel_shaders_validate(
        #[case] source: SourceKind,
        #[case] target: TargetKind,
        #[case] body: &str,
    ) {
        validate_wgsl(&kernel_shader(source, target, body));
    }

    #[test]
    fn test_binding_cache_rebuilds_on_new_source() {
        let mut backend = DummyBackend::new();
        let ctx = KernelContext::new(&mut backend).unwrap();
        let a = GpuTexture::create_render_target(&mut backend, "a", 16, PROBE_TEXTURE_FORMAT)
            .unwrap();
        let b = GpuTexture::create_render_target(&mut backend, "b", 16, PROBE_TEXTURE_FORMAT)
            .unwrap();

        let mut cache = BindingCache::default();
        let first = cache
            .binding_for(&mut backend, &ctx, SourceKind::Texture2d, a.view, None)
            .unwrap()
            .bind_group;
        let again = cache
            .binding_for(&mut backend, &ctx, SourceKind::Texture2d, a.view, None)
            .unwrap()
            .bind_group;
        assert_eq!(first, again);

        let other = cache
            .binding_for(&mut backend, &ctx, SourceKind::Texture2d, b.view, None)
            .unwrap()
            .bind_group;
        assert_ne!(first, other);
    }

    #[test]
    fn test_kernel_run_records_one_pass() {
        let mut backend = DummyBackend::new();
        let ctx = KernelContext::new(&mut backend).unwrap();
        let source = GpuTexture::create_render_target(&mut backend, "src", 32, PROBE_TEXTURE_FORMAT)
            .unwrap();
        let target = GpuTexture::create_render_target(&mut backend, "dst", 32, PROBE_TEXTURE_FORMAT)
            .unwrap();
        let kernel = FullscreenKernel::new(
            &mut backend,
            &ctx,
            "Test Blit",
            SourceKind::Texture2d,
            TargetKind::Octahedral,
            BLIT_BODY,
        )
        .unwrap();
        let binding =
            KernelBinding::new(&mut backend, &ctx, SourceKind::Texture2d, source.view, None)
                .unwrap();

        backend.clear_log();
        kernel
            .run(
                &mut backend,
                &binding,
                target.view,
                LoadOp::Load,
                Viewport::new(8, 8, 16, 16),
                &KernelUniforms::default(),
            )
            .unwrap();

        assert_eq!(backend.pass_labels(), vec!["Test Blit".to_string()]);
        assert_eq!(
            backend.viewports_for("Test Blit"),
            vec![Viewport::new(8, 8, 16, 16)]
        );
        assert_eq!(backend.submission_count(), 1);
        assert!(backend.errors().is_empty());
    }
}
