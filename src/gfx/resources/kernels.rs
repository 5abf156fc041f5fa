//! Static lookup data for the indirect pass
//!
//! The sample kernel and the dither pattern are generated on the CPU once and uploaded at
//! startup; no pass ever writes them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[rustfmt::skip]
const BAYER_4X4: [u8; 16] = [
     0,  8,  2, 10,
    12,  4, 14,  6,
     3, 11,  1,  9,
    15,  7, 13,  5,
];

#[rustfmt::skip]
const BAYER_8X8: [u8; 64] = [
     1, 49, 13, 61,  4, 52, 16, 64,
    33, 17, 45, 29, 36, 20, 48, 32,
     9, 57,  5, 53, 12, 60,  8, 56,
    41, 25, 37, 21, 44, 28, 40, 24,
     3, 51, 15, 63,  2, 50, 14, 62,
    35, 19, 47, 31, 34, 18, 46, 30,
    11, 59,  7, 55, 10, 58,  6, 54,
    43, 27, 39, 23, 42, 26, 38, 22,
];

/// Ordered dither used to rotate the sample kernel per pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DitherPattern {
    #[default]
    FourByFour,
    EightByEight,
    Off,
}

impl DitherPattern {
    /// Edge length of the square pattern; `Off` still uploads a 1x1 texel so the slot is bound
    pub fn size(self) -> u32 {
        match self {
            DitherPattern::FourByFour => 4,
            DitherPattern::EightByEight => 8,
            DitherPattern::Off => 1,
        }
    }

    pub fn enabled(self) -> bool {
        self != DitherPattern::Off
    }

    /// Row-major `R8Unorm` texels
    pub fn texels(self) -> Vec<u8> {
        match self {
            DitherPattern::FourByFour => normalize(&BAYER_4X4, 16.0),
            DitherPattern::EightByEight => normalize(&BAYER_8X8, 65.0),
            DitherPattern::Off => vec![0],
        }
    }
}

fn normalize(table: &[u8], denominator: f32) -> Vec<u8> {
    table
        .iter()
        .map(|&v| (v as f32 / denominator * 255.0) as u8)
        .collect()
}

/// Polar disk samples `(r sin θ, r cos θ, r)` with `θ = 2π ξ₂` and `r = ξ₁`
///
/// The third component carries the radius so the shader can weight by it. Each sample is
/// padded to four floats for an `Rgba32Float` texel.
pub fn generate_sample_kernel(count: u32, seed: u64) -> Vec<[f32; 4]> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            let xi1: f32 = rng.random_range(0.0..1.0);
            let xi2: f32 = rng.random_range(0.0..1.0);
            let theta = 2.0 * std::f32::consts::PI * xi2;

            [xi1 * theta.sin(), xi1 * theta.cos(), xi1, 0.0]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_samples_lie_in_unit_disk() {
        let kernel = generate_sample_kernel(256, 0);
        assert_eq!(kernel.len(), 256);

        for [x, y, r, w] in kernel {
            assert!((0.0..1.0).contains(&r));
            assert!(((x * x + y * y).sqrt() - r).abs() < 1e-5);
            assert_eq!(w, 0.0);
        }
    }

    #[test]
    fn test_kernel_is_deterministic_per_seed() {
        assert_eq!(generate_sample_kernel(32, 7), generate_sample_kernel(32, 7));
        assert_ne!(generate_sample_kernel(32, 7), generate_sample_kernel(32, 8));
    }

    #[test]
    fn test_dither_tables() {
        let four = DitherPattern::FourByFour.texels();
        assert_eq!(four.len(), 16);
        assert_eq!(four[0], 0);
        assert_eq!(four[1], 127);
        assert_eq!(four[8], 47);

        let eight = DitherPattern::EightByEight.texels();
        assert_eq!(eight.len(), 64);
        assert_eq!(eight[7], 251);

        assert_eq!(DitherPattern::Off.texels().len(), 1);
        assert!(!DitherPattern::Off.enabled());
    }

    #[test]
    fn test_dither_values_are_distinct() {
        for pattern in [DitherPattern::FourByFour, DitherPattern::EightByEight] {
            let mut texels = pattern.texels();
            texels.sort_unstable();
            texels.dedup();
            assert_eq!(texels.len() as u32, pattern.size() * pattern.size());
        }
    }
}
