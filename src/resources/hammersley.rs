//! Hammersley sample table on the GPU

use super::{GpuTexture, TextureData};
use crate::backend::traits::*;
use crate::sampling::HammersleyPointSet;

/// The Hammersley point set uploaded as an `count` x 1 RGBA32F texture.
///
/// Kernels read it with `textureLoad`, so the texture is never filtered.
pub struct HammersleyTexture {
    texture: GpuTexture,
    count: u32,
}

impl HammersleyTexture {
    pub fn new<B: GraphicsBackend>(backend: &mut B, count: u32) -> BackendResult<Self> {
        let points = HammersleyPointSet::new(count.max(1));
        let data = TextureData::from_rgba_f32(&points.texels(), &format!("Hammersley {}", count));
        let texture = GpuTexture::create(backend, &data)?;

        Ok(Self {
            texture,
            count: points.count(),
        })
    }

    /// Regenerate the table if the sample count changed. Returns `true` when
    /// the texture was replaced and bind groups using it must be rebuilt.
    pub fn ensure<B: GraphicsBackend>(&mut self, backend: &mut B, count: u32) -> BackendResult<bool> {
        if count.max(1) == self.count {
            return Ok(false);
        }
        log::debug!(
            "Regenerating Hammersley table: {} -> {} samples",
            self.count,
            count
        );
        let replacement = Self::new(backend, count)?;
        self.texture.destroy(backend);
        *self = replacement;
        Ok(true)
    }

    pub fn view(&self) -> TextureViewHandle {
        self.texture.view
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_ensure_regenerates_only_on_change() {
        let mut backend = DummyBackend::new();
        let mut table = HammersleyTexture::new(&mut backend, 128).unwrap();
        assert_eq!(table.count(), 128);
        let view = table.view();

        assert!(!table.ensure(&mut backend, 128).unwrap());
        assert_eq!(table.view(), view);

        assert!(table.ensure(&mut backend, 1024).unwrap());
        assert_eq!(table.count(), 1024);
        assert_ne!(table.view(), view);
        assert_eq!(backend.texture_count(), 1);
    }
}
