//! Probe configuration

use crate::atlas::MIN_LEVEL_SIZE;
use crate::backend::DeviceCapabilities;
use crate::error::{ProbeError, ProbeResult};

/// Requested prefilter quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeQuality {
    /// Pick from the device capabilities
    #[default]
    Auto,
    /// 1024 GGX samples, rendered straight into float targets
    High,
    /// 128 GGX samples, CPU readback for cube mips
    Low,
}

/// Configuration for a reflection probe
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Face resolution of the captured cubemap
    pub cubemap_size: u32,
    /// Resolution of the temporary octahedral map
    pub oct_map_size: u32,
    /// Width and height of the octahedral atlas
    pub atlas_size: u32,
    /// Size of the irradiance square in the atlas corner
    pub irradiance_size: u32,
    /// Clear colour for each captured face
    pub background: [f32; 4],
    /// Capture projection near plane
    pub near: f32,
    /// Capture projection far plane
    pub far: f32,
    pub quality: ProbeQuality,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            cubemap_size: 512,
            oct_map_size: 1024,
            atlas_size: 2048,
            irradiance_size: MIN_LEVEL_SIZE,
            background: [0.0, 0.0, 0.0, 0.0],
            near: 0.001,
            far: 50.0,
            quality: ProbeQuality::Auto,
        }
    }
}

impl ProbeConfig {
    /// Config for a given atlas width, with the octahedral map at half of it.
    pub fn with_atlas_size(mut self, atlas_size: u32) -> Self {
        self.atlas_size = atlas_size;
        self.oct_map_size = atlas_size / 2;
        self
    }

    pub fn with_cubemap_size(mut self, cubemap_size: u32) -> Self {
        self.cubemap_size = cubemap_size;
        self
    }

    pub fn with_background(mut self, background: [f32; 4]) -> Self {
        self.background = background;
        self
    }

    pub fn with_quality(mut self, quality: ProbeQuality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_clip_planes(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Check sizes against the fixed packing scheme and the device limits.
    pub fn validate(&self, capabilities: &DeviceCapabilities) -> ProbeResult<()> {
        for (name, size) in [
            ("cubemap_size", self.cubemap_size),
            ("oct_map_size", self.oct_map_size),
            ("atlas_size", self.atlas_size),
        ] {
            if !size.is_power_of_two() {
                return Err(ProbeError::Configuration(format!(
                    "{} must be a power of two, got {}",
                    name, size
                )));
            }
            if size > capabilities.max_texture_size {
                return Err(ProbeError::Configuration(format!(
                    "{} {} exceeds the device limit of {}",
                    name, size, capabilities.max_texture_size
                )));
            }
        }

        if self.atlas_size < 2 * MIN_LEVEL_SIZE {
            return Err(ProbeError::Configuration(format!(
                "atlas_size must be at least {}, got {}",
                2 * MIN_LEVEL_SIZE,
                self.atlas_size
            )));
        }
        if self.oct_map_size != self.atlas_size / 2 {
            return Err(ProbeError::Configuration(format!(
                "oct_map_size must be half the atlas size ({}), got {}",
                self.atlas_size / 2,
                self.oct_map_size
            )));
        }
        if self.irradiance_size != MIN_LEVEL_SIZE {
            return Err(ProbeError::Configuration(format!(
                "irradiance_size must be {}, got {}",
                MIN_LEVEL_SIZE, self.irradiance_size
            )));
        }
        if !(self.near > 0.0 && self.far > self.near) {
            return Err(ProbeError::Configuration(format!(
                "invalid clip planes: near {} far {}",
                self.near, self.far
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps() -> DeviceCapabilities {
        DeviceCapabilities::default()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ProbeConfig::default();
        assert_eq!(config.cubemap_size, 512);
        assert_eq!(config.oct_map_size, 1024);
        assert_eq!(config.atlas_size, 2048);
        assert_eq!(config.irradiance_size, 64);
        assert!(config.validate(&caps()).is_ok());
    }

    #[test]
    fn test_with_atlas_size_keeps_oct_map_at_half() {
        let config = ProbeConfig::default().with_atlas_size(256);
        assert_eq!(config.oct_map_size, 128);
        assert!(config.validate(&caps()).is_ok());
    }

    #[test]
    fn test_rejects_non_power_of_two() {
        let config = ProbeConfig::default().with_cubemap_size(500);
        assert!(matches!(
            config.validate(&caps()),
            Err(ProbeError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_tiny_atlas() {
        let config = ProbeConfig::default().with_atlas_size(64);
        assert!(config.validate(&caps()).is_err());
    }

    #[test]
    fn test_rejects_mismatched_oct_map() {
        let mut config = ProbeConfig::default();
        config.oct_map_size = 512;
        assert!(config.validate(&caps()).is_err());
    }

    #[test]
    fn test_rejects_atlas_beyond_device_limit() {
        let limits = DeviceCapabilities {
            max_texture_size: 1024,
            ..DeviceCapabilities::default()
        };
        assert!(ProbeConfig::default().validate(&limits).is_err());
        assert!(ProbeConfig::default()
            .with_atlas_size(1024)
            .validate(&limits)
            .is_ok());
    }

    #[test]
    fn test_rejects_inverted_clip_planes() {
        let config = ProbeConfig::default().with_clip_planes(10.0, 1.0);
        assert!(config.validate(&caps()).is_err());
    }
}
