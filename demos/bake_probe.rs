//! Bake a reflection probe headlessly and save its atlas as a PNG.
//!
//! The scene is a checkerboard drawn over every cube face on top of the
//! background colour, so mip, roughness and irradiance regions are easy to
//! tell apart in the output.
//!
//! ```bash
//! cargo run --example bake_probe -- --atlas-size 1024 --output atlas.png
//! ```

use clap::Parser;
use reflection_probes::backend::{
    BufferDescriptor, BufferUsage, ColorTargetState, CompareFunction, CullMode,
    DepthStencilState, FrontFace, PrimitiveTopology, RenderPipelineDescriptor, TextureFormat,
    VertexAttribute, VertexBufferLayout, VertexFormat,
};
use reflection_probes::{
    CubeFaceContext, GraphicsBackend, ProbeConfig, ProbeQuality, ProbeResult, ReflectionProbe,
    WgpuBackend, PROBE_TEXTURE_FORMAT,
};

const CHECKER_SHADER: &str = r#"
@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position, 0.5, 1.0);
}

@fragment
fn fs_main(@builtin(position) position: vec4<f32>) -> @location(0) vec4<f32> {
    let cell = vec2<u32>(position.xy / 32.0);
    if ((cell.x + cell.y) % 2u) == 0u {
        discard;
    }
    return vec4<f32>(4.0, 3.6, 3.0, 1.0);
}
"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum CliQuality {
    Auto,
    High,
    Low,
}

impl From<CliQuality> for ProbeQuality {
    fn from(quality: CliQuality) -> Self {
        match quality {
            CliQuality::Auto => ProbeQuality::Auto,
            CliQuality::High => ProbeQuality::High,
            CliQuality::Low => ProbeQuality::Low,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "bake_probe", about = "Bake a reflection probe atlas to a PNG")]
struct Args {
    /// Atlas width and height, a power of two of at least 128
    #[arg(long, default_value = "2048")]
    atlas_size: u32,

    /// Face size of the captured cubemap
    #[arg(long, default_value = "512")]
    cubemap_size: u32,

    /// Prefilter quality
    #[arg(long, default_value = "auto", value_enum)]
    quality: CliQuality,

    /// Background colour as three linear floats
    #[arg(long, num_args = 3, default_values_t = [0.2, 0.4, 0.8])]
    background: Vec<f32>,

    /// Output PNG path
    #[arg(short, long, default_value = "probe_atlas.png")]
    output: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut backend = WgpuBackend::new_headless()?;
    let config = ProbeConfig::default()
        .with_atlas_size(args.atlas_size)
        .with_cubemap_size(args.cubemap_size)
        .with_quality(args.quality.into())
        .with_background([args.background[0], args.background[1], args.background[2], 1.0]);

    let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("Checker Scene".into()),
        shader: CHECKER_SHADER.into(),
        vertex_layouts: vec![VertexBufferLayout {
            array_stride: VertexFormat::Float32x2.size(),
            attributes: vec![VertexAttribute {
                location: 0,
                format: VertexFormat::Float32x2,
                offset: 0,
            }],
        }],
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
    })?;

    // One triangle covering the whole face
    let triangle: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];
    let vertices = backend.create_buffer(&BufferDescriptor {
        label: Some("Checker Scene Vertices".into()),
        size: std::mem::size_of_val(&triangle) as u64,
        usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
    })?;
    backend.write_buffer(vertices, 0, bytemuck::cast_slice(&triangle));

    let mut probe = ReflectionProbe::new(&mut backend, config)?;
    let mut draw = |backend: &mut WgpuBackend, _: &CubeFaceContext| -> ProbeResult<()> {
        backend.set_render_pipeline(pipeline);
        backend.set_vertex_buffer(0, vertices, 0);
        backend.draw(0..3, 0..1);
        Ok(())
    };

    let start = std::time::Instant::now();
    probe.update(&mut backend, Some(&mut draw))?;
    log::info!("Baked in {:.1?} ({:?} prefilter)", start.elapsed(), probe.strategy());

    let errors = backend.validation_errors();
    if !errors.is_empty() {
        for error in &errors {
            log::error!("{}", error);
        }
        return Err(format!("{} validation errors", errors.len()).into());
    }

    let size = probe.outputs().atlas_size;
    let texels = probe
        .resources()
        .atlas
        .read_rgba_f32(&mut backend, 0, 0, size, size)?;

    // Reinhard, then gamma 2.2; unbaked atlas space stays transparent
    let pixels: Vec<u8> = texels
        .iter()
        .flat_map(|t| {
            let tone = |c: f32| ((c / (1.0 + c)).powf(1.0 / 2.2) * 255.0).round() as u8;
            [tone(t[0]), tone(t[1]), tone(t[2]), (t[3].clamp(0.0, 1.0) * 255.0) as u8]
        })
        .collect();
    image::save_buffer(&args.output, &pixels, size, size, image::ColorType::Rgba8)?;
    log::info!("Wrote {}x{} atlas to {}", size, size, args.output);

    Ok(())
}
