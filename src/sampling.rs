//! Low-discrepancy sampling and octahedral mapping
//!
//! These are the CPU versions of the math the GPU kernels run. The Hammersley
//! table uploaded to the GPU is generated here, and the reference kernels at
//! the bottom of the module are used to check the numeric behaviour of the
//! convolution, prefilter and downsample passes.

use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// Van der Corput radical inverse in base 2
pub fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x55555555) << 1) | ((bits & 0xAAAAAAAA) >> 1);
    bits = ((bits & 0x33333333) << 2) | ((bits & 0xCCCCCCCC) >> 2);
    bits = ((bits & 0x0F0F0F0F) << 4) | ((bits & 0xF0F0F0F0) >> 4);
    bits = ((bits & 0x00FF00FF) << 8) | ((bits & 0xFF00FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

/// Point `i` of an `n` point Hammersley set
pub fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

/// A precomputed Hammersley table
#[derive(Debug, Clone, PartialEq)]
pub struct HammersleyPointSet {
    points: Vec<Vec2>,
}

impl HammersleyPointSet {
    pub fn new(count: u32) -> Self {
        Self {
            points: (0..count).map(|i| hammersley(i, count)).collect(),
        }
    }

    pub fn count(&self) -> u32 {
        self.points.len() as u32
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Texels with the point in `rg` and zero in `ba`
    pub fn texels(&self) -> Vec<[f32; 4]> {
        self.points.iter().map(|p| [p.x, p.y, 0.0, 0.0]).collect()
    }
}

/// Orthonormal tangent and bitangent around `n`
pub fn tangent_frame(n: Vec3) -> (Vec3, Vec3) {
    let up = if n.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = n.cross(up).normalize();
    let bitangent = n.cross(tangent);
    (tangent, bitangent)
}

/// GGX importance sampling of the half vector around `n`
pub fn importance_sample_ggx(xi: Vec2, n: Vec3, roughness: f32) -> Vec3 {
    let a = roughness * roughness;

    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();

    let (tangent, bitangent) = tangent_frame(n);
    (tangent * (phi.cos() * sin_theta) + bitangent * (phi.sin() * sin_theta) + n * cos_theta)
        .normalize()
}

/// Cosine weighted hemisphere direction around `n`
pub fn cosine_sample_hemisphere(xi: Vec2, n: Vec3) -> Vec3 {
    let phi = 2.0 * PI * xi.x;
    let cos_theta = (1.0 - xi.y).sqrt();
    let sin_theta = xi.y.sqrt();

    let (tangent, bitangent) = tangent_frame(n);
    (tangent * (phi.cos() * sin_theta) + bitangent * (phi.sin() * sin_theta) + n * cos_theta)
        .normalize()
}

fn sign_not_zero(v: Vec2) -> Vec2 {
    Vec2::new(
        if v.x >= 0.0 { 1.0 } else { -1.0 },
        if v.y >= 0.0 { 1.0 } else { -1.0 },
    )
}

/// Map a direction to octahedral UV in `[0, 1]^2`.
///
/// Y is the hemisphere axis. U follows X and V follows Z; the lower hemisphere
/// is folded over the diagonals.
pub fn oct_encode(dir: Vec3) -> Vec2 {
    let n = dir / (dir.x.abs() + dir.y.abs() + dir.z.abs());
    let mut xz = Vec2::new(n.x, n.z);
    if n.y < 0.0 {
        xz = (Vec2::ONE - Vec2::new(n.z.abs(), n.x.abs())) * sign_not_zero(xz);
    }
    xz * 0.5 + 0.5
}

/// Inverse of [`oct_encode`], returns a unit direction
pub fn oct_decode(uv: Vec2) -> Vec3 {
    let p = uv * 2.0 - 1.0;
    let y = 1.0 - p.x.abs() - p.y.abs();
    let xz = if y < 0.0 {
        (Vec2::ONE - Vec2::new(p.y.abs(), p.x.abs())) * sign_not_zero(p)
    } else {
        p
    };
    Vec3::new(xz.x, y, xz.y).normalize()
}

/// Cosine weighted average of `env` over the hemisphere around `n`.
///
/// Uses the same sample mapping as the irradiance kernel, so a constant
/// environment integrates to itself.
pub fn convolve_irradiance<F: Fn(Vec3) -> Vec3>(n: Vec3, sample_count: u32, env: &F) -> Vec3 {
    let mut sum = Vec3::ZERO;
    for i in 0..sample_count {
        let l = cosine_sample_hemisphere(hammersley(i, sample_count), n);
        sum += env(l);
    }
    sum / sample_count.max(1) as f32
}

/// GGX prefiltered radiance around `n` with `V = N`, weighted by `N.L`
pub fn prefilter<F: Fn(Vec3) -> Vec3>(
    n: Vec3,
    roughness: f32,
    sample_count: u32,
    env: &F,
) -> Vec3 {
    let mut sum = Vec3::ZERO;
    let mut total_weight = 0.0;

    for i in 0..sample_count {
        let h = importance_sample_ggx(hammersley(i, sample_count), n, roughness);
        let l = (2.0 * n.dot(h) * h - n).normalize();

        let n_dot_l = n.dot(l);
        if n_dot_l > 0.0 {
            sum += env(l) * n_dot_l;
            total_weight += n_dot_l;
        }
    }

    sum / f32::max(total_weight, 0.001)
}

/// Halve a square grid of texels with a 2x2 box filter
pub fn box_downsample(texels: &[Vec3], size: usize) -> Vec<Vec3> {
    let half = (size / 2).max(1);
    let mut out = Vec::with_capacity(half * half);
    for y in 0..half {
        for x in 0..half {
            let at = |dx: usize, dy: usize| {
                let sx = (2 * x + dx).min(size - 1);
                let sy = (2 * y + dy).min(size - 1);
                texels[sy * size + sx]
            };
            out.push((at(0, 0) + at(1, 0) + at(0, 1) + at(1, 1)) * 0.25);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn test_directions() -> Vec<Vec3> {
        let mut dirs = vec![
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for i in 0..32 {
            let t = i as f32 * 0.7;
            dirs.push(Vec3::new(t.sin(), (t * 1.3).cos(), (t * 0.5).sin() - 0.2).normalize());
        }
        dirs
    }

    #[test]
    fn test_hammersley_points() {
        assert_eq!(hammersley(0, 4), Vec2::new(0.0, 0.0));
        assert_eq!(hammersley(1, 4), Vec2::new(0.25, 0.5));
        assert_eq!(hammersley(2, 4), Vec2::new(0.5, 0.25));
        assert_eq!(hammersley(3, 4), Vec2::new(0.75, 0.75));
    }

    #[test]
    fn test_point_set_texels() {
        let set = HammersleyPointSet::new(512);
        assert_eq!(set.count(), 512);
        let texels = set.texels();
        assert_eq!(texels.len(), 512);
        assert_eq!(texels[1], [1.0 / 512.0, 0.5, 0.0, 0.0]);
        assert!(set.points().iter().all(|p| p.y < 1.0));
    }

    #[test]
    fn test_oct_roundtrip() {
        for dir in test_directions() {
            let uv = oct_encode(dir);
            assert!(uv.x >= 0.0 && uv.x <= 1.0 && uv.y >= 0.0 && uv.y <= 1.0);
            let back = oct_decode(uv);
            assert!(
                back.distance(dir) < EPSILON,
                "{:?} -> {:?} -> {:?}",
                dir,
                uv,
                back
            );
        }
    }

    #[test]
    fn test_oct_axes() {
        assert!(oct_encode(Vec3::Y).distance(Vec2::splat(0.5)) < EPSILON);
        assert!(oct_encode(Vec3::X).distance(Vec2::new(1.0, 0.5)) < EPSILON);
        assert!(oct_encode(Vec3::Z).distance(Vec2::new(0.5, 1.0)) < EPSILON);
        // The lower pole unfolds into the corners
        assert!(oct_decode(Vec2::ZERO).distance(Vec3::NEG_Y) < EPSILON);
        assert!(oct_decode(Vec2::ONE).distance(Vec3::NEG_Y) < EPSILON);
    }

    #[test]
    fn test_samples_stay_in_hemisphere() {
        for n in test_directions() {
            for i in 0..64 {
                let xi = hammersley(i, 64);
                assert!(cosine_sample_hemisphere(xi, n).dot(n) >= -EPSILON);
                assert!(importance_sample_ggx(xi, n, 0.6).dot(n) >= -EPSILON);
            }
        }
    }

    #[test]
    fn test_convolution_of_constant_is_constant() {
        let c = Vec3::new(0.2, 0.5, 1.0);
        for n in test_directions() {
            let e = convolve_irradiance(n, 512, &|_| c);
            assert!(e.distance(c) < EPSILON, "{:?}", e);
        }
    }

    #[test]
    fn test_prefilter_of_constant_is_constant() {
        let c = Vec3::splat(0.75);
        for roughness in [0.2, 0.6, 1.0] {
            let p = prefilter(Vec3::Y, roughness, 128, &|_| c);
            assert!(p.distance(c) < 1e-3);
        }
    }

    #[test]
    fn test_prefilter_roughness_zero_is_identity() {
        let env = |d: Vec3| d * 0.5 + Vec3::splat(0.5);
        for n in test_directions() {
            let p = prefilter(n, 0.0, 1024, &env);
            assert!(p.distance(env(n)) < 1e-3, "{:?} vs {:?}", p, env(n));
        }
    }

    #[test]
    fn test_box_downsample_preserves_constant() {
        let c = Vec3::new(0.3, 0.6, 0.9);
        let mut grid = vec![c; 64 * 64];
        let mut size = 64;
        while size > 1 {
            grid = box_downsample(&grid, size);
            size /= 2;
        }
        assert_eq!(grid.len(), 1);
        assert!(grid[0].distance(c) < EPSILON);
    }

    #[test]
    fn test_box_downsample_averages() {
        let grid = vec![
            Vec3::splat(0.0),
            Vec3::splat(1.0),
            Vec3::splat(2.0),
            Vec3::splat(3.0),
        ];
        assert_eq!(box_downsample(&grid, 2), vec![Vec3::splat(1.5)]);
    }
}
