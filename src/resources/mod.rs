//! Resource management
//!
//! GPU textures owned by the probe pipeline: plain 2D targets, cubemaps with
//! per-face render views, and the Hammersley sample table.

mod cubemap;
mod hammersley;
mod texture;

pub use cubemap::*;
pub use hammersley::*;
pub use texture::*;
