//! Reflection probes - bakes scene reflections into an octahedral atlas
//!
//! A probe renders the scene around a point into a cubemap, projects it to an
//! octahedral map and packs into one atlas texture:
//! - a mip chain of the sharp reflection along the top band
//! - GGX prefiltered roughness levels down the left column
//! - a cosine convolved irradiance map in the bottom-right corner
//!
//! All passes go through the [`GraphicsBackend`] trait. Two backends are
//! provided:
//! - **dummy**: records and validates commands, for tests
//! - **wgpu**: headless GPU backend (feature `wgpu-backend`)

pub mod atlas;
pub mod backend;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod resources;
pub mod sampling;

pub use atlas::{AtlasLayout, AtlasRegion, MIN_LEVEL_SIZE, ROUGHNESS_STEP};
pub use backend::{DeviceCapabilities, DummyBackend, GraphicsBackend};
pub use config::{ProbeConfig, ProbeQuality};
pub use error::{ProbeError, ProbeResult};
pub use pipeline::{
    CubeFaceContext, CubemapConvolver, CubemapDownsampler, CubemapPrefilter, CubemapRenderer,
    PrefilterOptions, PrefilterStrategy, PROBE_TEXTURE_FORMAT,
};
pub use probe::{BakeState, ProbeOutputs, ReflectionProbe, SceneDrawFn};

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuBackend;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
