//! Common types shared between backends

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /// Whether the format can be sampled with a linear filter
    pub fn is_filterable(&self) -> bool {
        matches!(self, TextureFormat::Rgba8Unorm | TextureFormat::Rgba16Float)
    }
}

/// Texture usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureUsage(u32);

impl TextureUsage {
    pub const COPY_SRC: Self = Self(1 << 0);
    pub const COPY_DST: Self = Self(1 << 1);
    pub const TEXTURE_BINDING: Self = Self(1 << 2);
    pub const RENDER_ATTACHMENT: Self = Self(1 << 4);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for TextureUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Buffer usage flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferUsage(u32);

impl BufferUsage {
    pub const COPY_DST: Self = Self(1 << 3);
    pub const VERTEX: Self = Self(1 << 5);
    pub const UNIFORM: Self = Self(1 << 6);

    pub fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for BufferUsage {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

/// Texture dimensionality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    D2,
    /// Six square array layers in +X, -X, +Y, -Y, +Z, -Z order
    Cube,
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    /// Array layers, 6 for cube textures
    pub depth: u32,
    pub mip_levels: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }
}

impl TextureDescriptor {
    /// Square 2D texture with a single mip
    pub fn new_2d(label: &str, size: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: Some(label.to_string()),
            width: size,
            height: size,
            format,
            usage,
            ..Default::default()
        }
    }

    /// Cube texture with six faces of `size` and `mip_levels` mips
    pub fn new_cube(
        label: &str,
        size: u32,
        mip_levels: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Self {
        Self {
            label: Some(label.to_string()),
            width: size,
            height: size,
            depth: 6,
            mip_levels,
            dimension: TextureDimension::Cube,
            format,
            usage,
        }
    }

    /// Size of a mip level, never below one texel
    pub fn mip_size(&self, mip_level: u32) -> (u32, u32) {
        ((self.width >> mip_level).max(1), (self.height >> mip_level).max(1))
    }
}

/// Dimension a texture is viewed as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureViewDimension {
    D2,
    Cube,
}

/// Describes which part of a texture a view covers
#[derive(Debug, Clone)]
pub struct TextureViewDescriptor {
    pub label: Option<String>,
    pub dimension: TextureViewDimension,
    pub base_mip_level: u32,
    /// `None` means all remaining mips
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    /// `None` means all remaining layers
    pub array_layer_count: Option<u32>,
}

impl Default for TextureViewDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            dimension: TextureViewDimension::D2,
            base_mip_level: 0,
            mip_level_count: None,
            base_array_layer: 0,
            array_layer_count: None,
        }
    }
}

impl TextureViewDescriptor {
    /// Sampling view over every face and mip of a cube texture
    pub fn cube() -> Self {
        Self {
            dimension: TextureViewDimension::Cube,
            ..Default::default()
        }
    }

    /// Render target view of one cube face at one mip level
    pub fn cube_face(face: u32, mip_level: u32) -> Self {
        Self {
            label: Some(format!("Cube Face {} Mip {}", face, mip_level)),
            dimension: TextureViewDimension::D2,
            base_mip_level: mip_level,
            mip_level_count: Some(1),
            base_array_layer: face,
            array_layer_count: Some(1),
        }
    }
}

/// A rectangle inside one mip level and array layer of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRegion {
    pub mip_level: u32,
    pub layer: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    /// Whole square mip level of layer 0
    pub fn square(size: u32) -> Self {
        Self {
            mip_level: 0,
            layer: 0,
            x: 0,
            y: 0,
            width: size,
            height: size,
        }
    }

    pub fn with_target(mut self, mip_level: u32, layer: u32) -> Self {
        self.mip_level = mip_level;
        self.layer = layer;
        self
    }
}

/// Render pass viewport in framebuffer pixels, origin top-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x: x as f32,
            y: y as f32,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }

    pub fn square(size: u32) -> Self {
        Self::new(0, 0, size, size)
    }

    /// Whether the viewport is non-empty and inside a `width` x `height` target
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.x >= 0.0
            && self.y >= 0.0
            && self.x + self.width <= width as f32
            && self.y + self.height <= height as f32
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

/// Vertex attribute format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// Vertex attribute description
#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

/// Vertex buffer layout, used by scene pipelines drawn during capture
#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

/// Uniforms shared by every full-screen kernel.
///
/// `target_rect` and `source_rect` are `(x, y, width, height)` in pixels of the
/// render target and the bound source texture. `source_size` is
/// `(width, height, 1 / width, 1 / height)` of the source. `params` holds
/// roughness in `x` and the sample count in `y`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct KernelUniforms {
    pub inv_view_proj: Mat4,
    pub target_rect: Vec4,
    pub source_rect: Vec4,
    pub source_size: Vec4,
    pub params: Vec4,
}

impl Default for KernelUniforms {
    fn default() -> Self {
        Self {
            inv_view_proj: Mat4::IDENTITY,
            target_rect: Vec4::ZERO,
            source_rect: Vec4::ZERO,
            source_size: Vec4::ONE,
            params: Vec4::ZERO,
        }
    }
}

/// Primitive topology
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTopology {
    TriangleList,
    TriangleStrip,
}

/// Front face winding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Ccw,
    Cw,
}

/// Cull mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Compare function for depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Greater,
    Always,
}

/// Filter mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Address mode for samplers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

/// Sampler descriptor
#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_uniforms_layout() {
        // mat4 + four vec4, all 16-byte aligned for WGSL uniform rules
        assert_eq!(std::mem::size_of::<KernelUniforms>(), 128);
    }

    #[test]
    fn test_cube_descriptor_mips() {
        let desc = TextureDescriptor::new_cube(
            "cube",
            512,
            4,
            TextureFormat::Rgba16Float,
            TextureUsage::RENDER_ATTACHMENT,
        );
        assert_eq!(desc.depth, 6);
        assert_eq!(desc.mip_size(0), (512, 512));
        assert_eq!(desc.mip_size(3), (64, 64));
        assert_eq!(desc.mip_size(12), (1, 1));
    }

    #[test]
    fn test_viewport_bounds() {
        assert!(Viewport::new(1984, 1984, 64, 64).fits(2048, 2048));
        assert!(!Viewport::new(1985, 0, 64, 64).fits(2048, 2048));
        assert!(!Viewport::new(0, 0, 0, 64).fits(2048, 2048));
    }

    #[test]
    fn test_usage_flags() {
        let usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;
        assert!(usage.contains(TextureUsage::RENDER_ATTACHMENT));
        assert!(!usage.contains(TextureUsage::COPY_SRC));
    }
}
