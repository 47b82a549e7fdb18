//! Cube kernels run on a scene that paints every pixel with its own view
//! direction. Results are read through an octahedral projection because
//! cube layers do not copy back on every adapter.

mod common;

use rstest::rstest;

use common::{direction_errors, init_logging, Backend, DirectionScene};
use reflection_probes::backend::dummy::DummyCommand;
use reflection_probes::pipeline::OctahedralProjector;
use reflection_probes::resources::{CubemapTarget, GpuTexture};
use reflection_probes::{
    CubeFaceContext, CubemapConvolver, CubemapDownsampler, CubemapPrefilter, CubemapRenderer,
    DummyBackend, GraphicsBackend, PrefilterOptions, PrefilterStrategy, ProbeQuality,
    PROBE_TEXTURE_FORMAT,
};

const CAPTURE_SIZE: u32 = 64;

/// Mean of `l` over the cosine-weighted hemisphere around `n` is `2/3 n`
const COSINE_MEAN: f32 = 2.0 / 3.0;

fn capture<B: GraphicsBackend>(backend: &mut B) -> CubemapTarget {
    let scene = DirectionScene::new(backend);
    let target = CubemapTarget::new(
        backend,
        "Captured",
        CAPTURE_SIZE,
        1,
        PROBE_TEXTURE_FORMAT,
        true,
    )
    .expect("Failed to create cubemap");
    CubemapRenderer::default()
        .render_to_cubemap(backend, &target, |backend: &mut B, face: &CubeFaceContext| {
            scene.draw(backend, face)
        })
        .expect("Capture failed");
    target
}

fn cube<B: GraphicsBackend>(backend: &mut B, name: &str, size: u32, mips: u32) -> CubemapTarget {
    CubemapTarget::new(backend, name, size, mips, PROBE_TEXTURE_FORMAT, false)
        .expect("Failed to create cubemap")
}

/// Project mip 0 of `cube` into a `size` octahedral map and check it against
/// `scale` times the texel directions
fn assert_cube_directions<B: GraphicsBackend>(
    backend: &mut B,
    kind: Backend,
    cube: &CubemapTarget,
    size: u32,
    scale: f32,
    tolerance: f32,
) {
    let mut projector = OctahedralProjector::new(backend).expect("Failed to create projector");
    let map = GpuTexture::create_render_target(backend, "Projected", size, PROBE_TEXTURE_FORMAT)
        .expect("Failed to create map");
    projector
        .project(backend, cube, &map, size)
        .expect("Projection failed");
    let texels = map
        .read_rgba_f32(backend, 0, 0, size, size)
        .expect("Readback failed");
    map.destroy(backend);

    assert_eq!(backend.validation_errors(), Vec::<String>::new());
    if kind.renders_pixels() {
        let (max, _) = direction_errors(&texels, size, scale);
        assert!(max < tolerance, "{} is off by {}", cube.name, max);
    }
}

fn captured_faces_match_directions<B: GraphicsBackend>(backend: &mut B, kind: Backend) {
    let captured = capture(backend);
    assert_cube_directions(backend, kind, &captured, CAPTURE_SIZE, 1.0, 0.05);
}

/// Face orientation and the Y flip survive a capture and projection
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_captured_faces_match_directions(#[case] kind: Backend) {
    init_logging();
    with_backend!(kind, |backend| captured_faces_match_directions(backend, kind));
}

fn downsample_keeps_directions<B: GraphicsBackend>(backend: &mut B, kind: Backend) {
    let captured = capture(backend);
    let half = cube(backend, "Half", CAPTURE_SIZE / 2, 1);
    CubemapDownsampler::new(backend)
        .expect("Failed to create downsampler")
        .downsample(backend, &captured, &half)
        .expect("Downsample failed");
    assert_cube_directions(backend, kind, &half, CAPTURE_SIZE / 2, 1.0, 0.08);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_downsample_keeps_directions(#[case] kind: Backend) {
    init_logging();
    with_backend!(kind, |backend| downsample_keeps_directions(backend, kind));
}

fn convolve_gives_cosine_mean<B: GraphicsBackend>(backend: &mut B, kind: Backend) {
    let captured = capture(backend);
    let irradiance = cube(backend, "Irradiance", 16, 1);
    CubemapConvolver::new(backend)
        .expect("Failed to create convolver")
        .convolve(backend, &captured, &irradiance)
        .expect("Convolution failed");
    assert_cube_directions(backend, kind, &irradiance, 32, COSINE_MEAN, 0.05);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_convolve_gives_cosine_mean(#[case] kind: Backend) {
    init_logging();
    with_backend!(kind, |backend| convolve_gives_cosine_mean(backend, kind));
}

fn smooth_prefilter_is_identity<B: GraphicsBackend>(backend: &mut B, kind: Backend) {
    let captured = capture(backend);
    let specular = cube(backend, "Specular", CAPTURE_SIZE, 2);
    let strategy = PrefilterStrategy::select(&backend.capabilities(), ProbeQuality::Auto);
    CubemapPrefilter::new(backend, strategy)
        .expect("Failed to create prefilter")
        .prefilter(
            backend,
            &captured,
            &specular,
            &PrefilterOptions::for_strategy(strategy),
        )
        .expect("Prefilter failed");
    assert_cube_directions(backend, kind, &specular, CAPTURE_SIZE, 1.0, 0.05);
}

/// Mip 0 holds roughness 0, which must reproduce the source
#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::wgpu(Backend::Wgpu)]
fn test_smooth_prefilter_is_identity(#[case] kind: Backend) {
    init_logging();
    with_backend!(kind, |backend| smooth_prefilter_is_identity(backend, kind));
}

#[test]
fn test_direction_scene_binds_vertex_buffer_per_face() {
    let mut backend = DummyBackend::new();
    let captured = capture(&mut backend);

    let commands = backend.commands();
    let vertex_binds = commands
        .iter()
        .filter(|c| matches!(c, DummyCommand::SetVertexBuffer { slot: 0, .. }))
        .count();
    let uniform_writes = commands
        .iter()
        .filter(|c| matches!(c, DummyCommand::WriteBuffer { size: 64, .. }))
        .count();
    assert_eq!(vertex_binds, 6);
    assert_eq!(uniform_writes, 6);
    assert!(backend.errors().is_empty());
    captured.destroy(&mut backend);
}
