//! GPU resources owned by one probe

use crate::backend::traits::*;
use crate::config::ProbeConfig;
use crate::pipeline::PROBE_TEXTURE_FORMAT;
use crate::resources::{CubemapTarget, GpuTexture};

/// Textures a probe writes on every bake. Created once, never resized.
pub struct ReflectionProbeResources {
    /// Scene capture, with depth
    pub dynamic_cubemap: CubemapTarget,
    /// Scratch octahedral map every atlas region passes through
    pub oct_map: GpuTexture,
    /// The packed atlas sampled by shading
    pub atlas: GpuTexture,
}

impl ReflectionProbeResources {
    pub fn new<B: GraphicsBackend>(backend: &mut B, config: &ProbeConfig) -> BackendResult<Self> {
        let dynamic_cubemap = CubemapTarget::new(
            backend,
            "Probe Cubemap",
            config.cubemap_size,
            1,
            PROBE_TEXTURE_FORMAT,
            true,
        )?;
        let oct_map = GpuTexture::create_render_target(
            backend,
            "Probe Octahedral Map",
            config.oct_map_size,
            PROBE_TEXTURE_FORMAT,
        )?;
        let atlas = GpuTexture::create_render_target(
            backend,
            "Probe Atlas",
            config.atlas_size,
            PROBE_TEXTURE_FORMAT,
        )?;

        Ok(Self {
            dynamic_cubemap,
            oct_map,
            atlas,
        })
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        self.dynamic_cubemap.destroy(backend);
        self.oct_map.destroy(backend);
        self.atlas.destroy(backend);
    }
}
