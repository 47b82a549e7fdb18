//! The GPU backend's dependencies must only be pulled in by its feature.

use rstest::rstest;

const MANIFEST: &str = include_str!("../Cargo.toml");

fn section(name: &str) -> Vec<&'static str> {
    let header = format!("[{}]", name);
    MANIFEST
        .lines()
        .skip_while(|line| line.trim() != header)
        .skip(1)
        .take_while(|line| !line.trim_start().starts_with('['))
        .collect()
}

#[rstest]
#[case::wgpu("wgpu")]
#[case::pollster("pollster")]
#[case::parking_lot("parking_lot")]
fn test_backend_dependency_is_feature_gated(#[case] name: &str) {
    let entry = section("dependencies")
        .into_iter()
        .find(|line| line.split('=').next().map(str::trim) == Some(name))
        .unwrap_or_else(|| panic!("{} missing from [dependencies]", name));
    assert!(entry.contains("optional = true"), "{} is unconditional", name);

    let feature = section("features")
        .into_iter()
        .find(|line| line.trim_start().starts_with("wgpu-backend"))
        .expect("wgpu-backend feature");
    assert!(
        feature.contains(&format!("\"dep:{}\"", name)),
        "wgpu-backend does not enable {}",
        name
    );
}
