//! Octahedral atlas addressing
//!
//! The atlas is a square power-of-two texture. Row `r` (starting at the top)
//! holds roughness level `r`, and within a row mip level `m` sits to the right
//! of mip `m - 1`. Every region is square and never smaller than
//! [`MIN_LEVEL_SIZE`]; the irradiance map takes the bottom-right corner.
//!
//! Shading code samples the atlas with exactly these offsets, so the formulas
//! here are the contract between the baker and the material shaders.

use crate::backend::Viewport;
use crate::error::{ProbeError, ProbeResult};
use glam::Vec4;

/// Smallest region edge in pixels, also the irradiance map size
pub const MIN_LEVEL_SIZE: u32 = 64;

/// Roughness added per atlas row
pub const ROUGHNESS_STEP: f32 = 0.2;

/// A square sub-rectangle of the atlas, in pixels from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtlasRegion {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

impl AtlasRegion {
    pub fn new(x: u32, y: u32, size: u32) -> Self {
        Self { x, y, size }
    }

    pub fn overlaps(&self, other: &AtlasRegion) -> bool {
        self.x < other.x + other.size
            && other.x < self.x + self.size
            && self.y < other.y + other.size
            && other.y < self.y + self.size
    }

    /// Whether the region lies inside a `width` x `width` atlas
    pub fn contains_in(&self, width: u32) -> bool {
        self.size > 0 && self.x + self.size <= width && self.y + self.size <= width
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.x, self.y, self.size, self.size)
    }

    /// `(x, y, width, height)` as consumed by the kernel uniforms
    pub fn rect(&self) -> Vec4 {
        Vec4::new(
            self.x as f32,
            self.y as f32,
            self.size as f32,
            self.size as f32,
        )
    }
}

/// Region arithmetic for one atlas width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    width: u32,
    max_mip_level: u32,
}

impl AtlasLayout {
    pub fn new(width: u32) -> ProbeResult<Self> {
        if !width.is_power_of_two() || width < 2 * MIN_LEVEL_SIZE {
            return Err(ProbeError::Configuration(format!(
                "atlas width must be a power of two of at least {}, got {}",
                2 * MIN_LEVEL_SIZE,
                width
            )));
        }

        let layout = Self {
            width,
            max_mip_level: width.ilog2(),
        };
        layout.debug_check_packing();
        Ok(layout)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// `log2(width)`
    pub fn max_mip_level(&self) -> u32 {
        self.max_mip_level
    }

    /// Highest mip or roughness level; `m + r` never exceeds it
    pub fn max_level(&self) -> u32 {
        self.max_mip_level - MIN_LEVEL_SIZE.ilog2()
    }

    /// Edge length of the region for `(mip_level, roughness_level)`
    pub fn level_size(&self, mip_level: u32, roughness_level: u32) -> u32 {
        let level_size_in_pixels = 1u32 << (1 + mip_level + roughness_level).min(31);
        (self.width / level_size_in_pixels).max(MIN_LEVEL_SIZE)
    }

    /// Width of the band holding roughness row `roughness_level`
    pub fn roughness_level_width(&self, roughness_level: u32) -> u32 {
        self.width >> (1 + roughness_level)
    }

    /// Region for `(mip_level, roughness_level)`
    pub fn region(&self, mip_level: u32, roughness_level: u32) -> AtlasRegion {
        debug_assert!(
            mip_level + roughness_level <= self.max_level(),
            "level ({}, {}) beyond max level {}",
            mip_level,
            roughness_level,
            self.max_level()
        );

        let roughness_level_width = self.roughness_level_width(roughness_level);
        let v_offset = self.width - (1u32 << (self.max_mip_level - roughness_level));
        let row_width = 2 * roughness_level_width;
        let h_offset = row_width - (1u32 << (row_width.ilog2() - mip_level));

        AtlasRegion::new(
            h_offset,
            v_offset,
            self.level_size(mip_level, roughness_level),
        )
    }

    /// Bottom-right corner reserved for the irradiance map
    pub fn irradiance_region(&self) -> AtlasRegion {
        AtlasRegion::new(
            self.width - MIN_LEVEL_SIZE,
            self.width - MIN_LEVEL_SIZE,
            MIN_LEVEL_SIZE,
        )
    }

    /// Every addressable `(mip, roughness, region)` with `mip + roughness <= max_level`
    pub fn regions(&self) -> Vec<(u32, u32, AtlasRegion)> {
        let max_level = self.max_level();
        (0..=max_level)
            .flat_map(|r| (0..=max_level - r).map(move |m| (m, r)))
            .map(|(m, r)| (m, r, self.region(m, r)))
            .collect()
    }

    /// Regions a bake writes: the roughness-0 mip chain, the base mip of each
    /// roughness row, and the irradiance corner.
    pub fn baked_regions(&self) -> Vec<AtlasRegion> {
        let max_level = self.max_level();
        let mut regions: Vec<AtlasRegion> = (0..=max_level).map(|m| self.region(m, 0)).collect();
        regions.extend((1..=max_level).map(|r| self.region(0, r)));
        regions.push(self.irradiance_region());
        regions
    }

    /// GGX roughness of row `roughness_level`
    pub fn roughness_for_level(roughness_level: u32) -> f32 {
        (roughness_level as f32 * ROUGHNESS_STEP).min(1.0)
    }

    fn debug_check_packing(&self) {
        if cfg!(debug_assertions) {
            let mut regions: Vec<AtlasRegion> =
                self.regions().into_iter().map(|(_, _, region)| region).collect();
            regions.push(self.irradiance_region());

            for (i, a) in regions.iter().enumerate() {
                debug_assert!(a.contains_in(self.width), "{:?} outside atlas", a);
                for b in &regions[i + 1..] {
                    debug_assert!(!a.overlaps(b), "{:?} overlaps {:?}", a, b);
                }
            }
        }
    }
}
