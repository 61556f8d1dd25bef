//! Visual fingerprints.
//!
//! Three pure functions over a decoded bitmap:
//!
//! - [`perceptual_hash`]: 32×32 grayscale, separable DCT-II, the top-left
//!   8×8 low-frequency block thresholded at its median
//! - [`difference_hash`]: 9×8 grayscale, each pixel compared with its right
//!   neighbour
//! - [`blur_score`]: variance of a 3×3 Laplacian over a 128×128 grayscale
//!
//! Hashes are 64-bit words with bit index 0 stored in the most significant
//! position. Compare them with [`hamming_distance`].

use std::sync::OnceLock;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};

const DCT_SIZE: usize = 32;
const DCT_BLOCK: usize = 8;
const DHASH_WIDTH: u32 = 9;
const DHASH_HEIGHT: u32 = 8;
const BLUR_SIZE: u32 = 128;
const LAPLACIAN: [[f64; 3]; 3] = [[1.0, -2.0, 1.0], [-2.0, 4.0, -2.0], [1.0, -2.0, 1.0]];

/// Cosine table for an unnormalized DCT-II of length 32, restricted to the
/// first 8 frequencies. `plan[k * 32 + n] = cos(pi / 32 * (n + 0.5) * k)`.
fn dct_plan() -> &'static [f64] {
    static PLAN: OnceLock<Vec<f64>> = OnceLock::new();
    PLAN.get_or_init(|| {
        let mut plan = Vec::with_capacity(DCT_BLOCK * DCT_SIZE);
        for k in 0..DCT_BLOCK {
            for n in 0..DCT_SIZE {
                let angle = std::f64::consts::PI / DCT_SIZE as f64 * (n as f64 + 0.5) * k as f64;
                plan.push(angle.cos());
            }
        }
        plan
    })
}

fn grayscale(image: &DynamicImage, width: u32, height: u32) -> GrayImage {
    image
        .resize_exact(width, height, FilterType::Triangle)
        .to_luma8()
}

/// Number of differing bits between two hashes.
#[inline]
pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// DCT-based perceptual hash.
pub fn perceptual_hash(image: &DynamicImage) -> u64 {
    let gray = grayscale(image, DCT_SIZE as u32, DCT_SIZE as u32);
    let pixels: Vec<f64> = gray.as_raw().iter().map(|&p| p as f64).collect();
    let plan = dct_plan();

    // Row pass: 32 rows × 8 low frequencies.
    let mut rows = [[0.0f64; DCT_BLOCK]; DCT_SIZE];
    for (y, row) in rows.iter_mut().enumerate() {
        let line = &pixels[y * DCT_SIZE..(y + 1) * DCT_SIZE];
        for (k, out) in row.iter_mut().enumerate() {
            let basis = &plan[k * DCT_SIZE..(k + 1) * DCT_SIZE];
            *out = line.iter().zip(basis).map(|(p, c)| p * c).sum();
        }
    }

    // Column pass over the retained frequencies.
    let mut coefficients = [0.0f64; DCT_BLOCK * DCT_BLOCK];
    for v in 0..DCT_BLOCK {
        let basis = &plan[v * DCT_SIZE..(v + 1) * DCT_SIZE];
        for u in 0..DCT_BLOCK {
            coefficients[v * DCT_BLOCK + u] =
                rows.iter().zip(basis).map(|(row, c)| row[u] * c).sum();
        }
    }

    let mut sorted = coefficients;
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    let median = (sorted[mid - 1] + sorted[mid]) / 2.0;

    coefficients
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c > median)
        .fold(0u64, |hash, (i, _)| hash | (1u64 << (63 - i)))
}

/// Gradient hash: each row contributes one bit per left/right pixel pair.
pub fn difference_hash(image: &DynamicImage) -> u64 {
    let gray = grayscale(image, DHASH_WIDTH, DHASH_HEIGHT);
    let mut hash = 0u64;
    let mut bit = 1u64 << 63;
    for y in 0..DHASH_HEIGHT {
        for x in 0..DHASH_WIDTH - 1 {
            let left = gray.get_pixel(x, y)[0];
            let right = gray.get_pixel(x + 1, y)[0];
            if left > right {
                hash |= bit;
            }
            bit >>= 1;
        }
    }
    hash
}

/// Laplacian variance on a 0..=255 luma scale. Lower is blurrier.
pub fn blur_score(image: &DynamicImage) -> f64 {
    let gray = grayscale(image, BLUR_SIZE, BLUR_SIZE);
    let (width, height) = gray.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut acc = 0.0;
            for (dy, kernel_row) in LAPLACIAN.iter().enumerate() {
                for (dx, weight) in kernel_row.iter().enumerate() {
                    let p = gray.get_pixel(x + dx as u32 - 1, y + dy as u32 - 1)[0];
                    acc += weight * p as f64;
                }
            }
            responses.push(acc);
        }
    }
    population_variance(&responses)
}

/// Sample variance of BT.601 luma. Near zero for flat frames.
pub fn luma_variance(image: &DynamicImage) -> f64 {
    let rgb = image.to_rgb8();
    let values: Vec<f64> = rgb
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .collect();
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    squares / (values.len() - 1) as f64
}

fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
