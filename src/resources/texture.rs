//! Texture creation and readback

use crate::backend::traits::*;
use crate::backend::types::*;

/// CPU-side texel data ready for upload
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Row of RGBA32F texels, one texel per entry
    pub fn from_rgba_f32(texels: &[[f32; 4]], name: &str) -> Self {
        Self {
            width: texels.len() as u32,
            height: 1,
            format: TextureFormat::Rgba32Float,
            data: bytemuck::cast_slice(texels).to_vec(),
            name: name.to_string(),
        }
    }

    /// Square RGBA16F texture filled with one colour
    pub fn solid_rgba16f(size: u32, color: [f32; 4], name: &str) -> Self {
        let texel: Vec<u8> = color
            .iter()
            .flat_map(|c| half::f16::from_f32(*c).to_le_bytes())
            .collect();
        let data = texel.repeat((size * size) as usize);

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba16Float,
            data,
            name: name.to_string(),
        }
    }
}

/// GPU texture with its default view
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub name: String,
}

impl GpuTexture {
    /// Create and upload texture to GPU
    pub fn create<B: GraphicsBackend>(backend: &mut B, data: &TextureData) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(data.name.clone()),
            width: data.width,
            height: data.height,
            format: data.format,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            ..Default::default()
        })?;

        let view = backend.create_texture_view(handle, &TextureViewDescriptor::default())?;
        let region = TextureRegion {
            width: data.width,
            height: data.height,
            ..TextureRegion::square(0)
        };
        backend.write_texture(handle, &region, &data.data)?;

        Ok(Self {
            handle,
            view,
            width: data.width,
            height: data.height,
            format: data.format,
            name: data.name.clone(),
        })
    }

    /// Square colour target that can also be sampled, copied and read back
    pub fn create_render_target<B: GraphicsBackend>(
        backend: &mut B,
        name: &str,
        size: u32,
        format: TextureFormat,
    ) -> BackendResult<Self> {
        let usage = TextureUsage::RENDER_ATTACHMENT
            | TextureUsage::TEXTURE_BINDING
            | TextureUsage::COPY_SRC
            | TextureUsage::COPY_DST;
        Self::create_empty(backend, &TextureDescriptor::new_2d(name, size, format, usage))
    }

    /// Depth attachment matching a square colour target
    pub fn create_depth<B: GraphicsBackend>(
        backend: &mut B,
        name: &str,
        size: u32,
    ) -> BackendResult<Self> {
        Self::create_empty(
            backend,
            &TextureDescriptor::new_2d(
                name,
                size,
                TextureFormat::Depth32Float,
                TextureUsage::RENDER_ATTACHMENT,
            ),
        )
    }

    fn create_empty<B: GraphicsBackend>(
        backend: &mut B,
        desc: &TextureDescriptor,
    ) -> BackendResult<Self> {
        let handle = backend.create_texture(desc)?;
        let view = backend.create_texture_view(handle, &TextureViewDescriptor::default())?;

        Ok(Self {
            handle,
            view,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            name: desc.label.clone().unwrap_or_default(),
        })
    }

    /// Read a rectangle back as RGBA floats, row by row from the top
    pub fn read_rgba_f32<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> BackendResult<Vec<[f32; 4]>> {
        let region = TextureRegion {
            mip_level: 0,
            layer: 0,
            x,
            y,
            width,
            height,
        };
        let bytes = backend.read_texture(self.handle, &region)?;
        decode_rgba(self.format, &bytes)
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        backend.destroy_texture(self.handle);
    }
}

/// Decode little-endian RGBA16F texels
pub fn decode_rgba16f(bytes: &[u8]) -> Vec<[f32; 4]> {
    bytes
        .chunks_exact(8)
        .map(|texel| {
            let channel = |i: usize| {
                half::f16::from_le_bytes([texel[2 * i], texel[2 * i + 1]]).to_f32()
            };
            [channel(0), channel(1), channel(2), channel(3)]
        })
        .collect()
}

/// Decode tightly packed texels of any colour format to RGBA floats
pub fn decode_rgba(format: TextureFormat, bytes: &[u8]) -> BackendResult<Vec<[f32; 4]>> {
    match format {
        TextureFormat::Rgba16Float => Ok(decode_rgba16f(bytes)),
        TextureFormat::Rgba32Float => Ok(bytes
            .chunks_exact(16)
            .map(|texel| {
                let channel = |i: usize| {
                    f32::from_le_bytes([
                        texel[4 * i],
                        texel[4 * i + 1],
                        texel[4 * i + 2],
                        texel[4 * i + 3],
                    ])
                };
                [channel(0), channel(1), channel(2), channel(3)]
            })
            .collect()),
        TextureFormat::Rgba8Unorm => Ok(bytes
            .chunks_exact(4)
            .map(|texel| {
                [
                    texel[0] as f32 / 255.0,
                    texel[1] as f32 / 255.0,
                    texel[2] as f32 / 255.0,
                    texel[3] as f32 / 255.0,
                ]
            })
            .collect()),
        TextureFormat::Depth32Float => Err(BackendError::ReadbackFailed(
            "depth textures cannot be decoded as colour".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_decode_rgba16f() {
        let data = TextureData::solid_rgba16f(2, [1.0, 0.5, 0.25, 1.0], "solid");
        assert_eq!(data.data.len(), 2 * 2 * 8);
        let texels = decode_rgba16f(&data.data);
        assert_eq!(texels, vec![[1.0, 0.5, 0.25, 1.0]; 4]);
    }

    #[test]
    fn test_decode_rgba8() {
        let texels = decode_rgba(TextureFormat::Rgba8Unorm, &[255, 0, 51, 255]).unwrap();
        assert_eq!(texels, vec![[1.0, 0.0, 0.2, 1.0]]);
        assert!(decode_rgba(TextureFormat::Depth32Float, &[0; 4]).is_err());
    }

    #[test]
    fn test_render_target_readback_on_dummy() {
        let mut backend = DummyBackend::new();
        let target =
            GpuTexture::create_render_target(&mut backend, "target", 32, TextureFormat::Rgba16Float)
                .unwrap();
        let texels = target.read_rgba_f32(&mut backend, 8, 8, 4, 2).unwrap();
        assert_eq!(texels.len(), 8);
        assert!(target.read_rgba_f32(&mut backend, 30, 0, 4, 4).is_err());
    }

    #[test]
    fn test_upload_row_texture() {
        let mut backend = DummyBackend::new();
        let data = TextureData::from_rgba_f32(&[[0.0, 0.5, 0.0, 0.0]; 16], "row");
        let texture = GpuTexture::create(&mut backend, &data).unwrap();
        assert_eq!((texture.width, texture.height), (16, 1));
        assert!(backend.errors().is_empty());
    }
}
