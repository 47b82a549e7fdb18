//! Backend abstraction layer
//!
//! Provides the traits and types the probe pipeline renders through, a
//! recording dummy backend for tests, and a headless wgpu backend.

pub mod dummy;
pub mod traits;
pub mod types;
#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use dummy::DummyBackend;
pub use traits::*;
pub use types::*;
