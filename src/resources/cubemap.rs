//! Cube render targets

use super::GpuTexture;
use crate::backend::traits::*;
use crate::backend::types::*;

/// A cube texture with a sampling view and one render view per face and mip
pub struct CubemapTarget {
    pub texture: TextureHandle,
    /// Cube view over every face and mip, for sampling
    pub cube_view: TextureViewHandle,
    face_views: Vec<[TextureViewHandle; 6]>,
    depth: Vec<GpuTexture>,
    pub size: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub name: String,
}

impl CubemapTarget {
    /// Create the cube texture and its views. With `with_depth`, a depth
    /// texture is created for every mip so scene geometry can be captured.
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        name: &str,
        size: u32,
        mip_levels: u32,
        format: TextureFormat,
        with_depth: bool,
    ) -> BackendResult<Self> {
        let usage = TextureUsage::RENDER_ATTACHMENT
            | TextureUsage::TEXTURE_BINDING
            | TextureUsage::COPY_SRC
            | TextureUsage::COPY_DST;
        let texture = backend.create_texture(&TextureDescriptor::new_cube(
            name, size, mip_levels, format, usage,
        ))?;
        let cube_view = backend.create_texture_view(texture, &TextureViewDescriptor::cube())?;

        let mut face_views = Vec::with_capacity(mip_levels as usize);
        for mip in 0..mip_levels {
            let mut views = [cube_view; 6];
            for (face, view) in views.iter_mut().enumerate() {
                *view = backend
                    .create_texture_view(texture, &TextureViewDescriptor::cube_face(face as u32, mip))?;
            }
            face_views.push(views);
        }

        let mut depth = Vec::new();
        if with_depth {
            for mip in 0..mip_levels {
                depth.push(GpuTexture::create_depth(
                    backend,
                    &format!("{} Depth Mip {}", name, mip),
                    (size >> mip).max(1),
                )?);
            }
        }

        log::debug!(
            "Created cubemap {} ({}px, {} mips, depth: {})",
            name,
            size,
            mip_levels,
            with_depth
        );

        Ok(Self {
            texture,
            cube_view,
            face_views,
            depth,
            size,
            mip_levels,
            format,
            name: name.to_string(),
        })
    }

    /// Render view of `face` at `mip_level`
    pub fn face_view(&self, face: usize, mip_level: u32) -> Option<TextureViewHandle> {
        self.face_views
            .get(mip_level as usize)
            .and_then(|views| views.get(face).copied())
    }

    /// Depth view matching `mip_level`, if the target was created with depth
    pub fn depth_view(&self, mip_level: u32) -> Option<TextureViewHandle> {
        self.depth.get(mip_level as usize).map(|d| d.view)
    }

    /// Face edge length at `mip_level`
    pub fn face_size(&self, mip_level: u32) -> u32 {
        (self.size >> mip_level).max(1)
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        for depth in &self.depth {
            depth.destroy(backend);
        }
        backend.destroy_texture(self.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_cubemap_views() {
        let mut backend = DummyBackend::new();
        let cube =
            CubemapTarget::new(&mut backend, "cube", 64, 3, TextureFormat::Rgba16Float, true)
                .unwrap();

        assert_eq!(cube.face_size(0), 64);
        assert_eq!(cube.face_size(2), 16);
        assert!(cube.face_view(5, 2).is_some());
        assert!(cube.face_view(6, 0).is_none());
        assert!(cube.face_view(0, 3).is_none());
        assert!(cube.depth_view(2).is_some());
        // colour cube plus one depth texture per mip
        assert_eq!(backend.texture_count(), 4);
    }

    #[test]
    fn test_cubemap_without_depth() {
        let mut backend = DummyBackend::new();
        let cube =
            CubemapTarget::new(&mut backend, "cube", 32, 1, TextureFormat::Rgba16Float, false)
                .unwrap();
        assert!(cube.depth_view(0).is_none());
    }
}
