//! Gaussian kernel density estimation.
//!
//! For samples `x_0 .. x_{n-1}` and bandwidth `h` the density at each sample
//! is `1 / (n h) * sum_j K((x_i - x_j) / h)` with the standard normal kernel
//! `K(u) = exp(-u^2 / 2) / sqrt(2 pi)`.

use rayon::prelude::*;
use thiserror::Error;

/// `1 / sqrt(2 pi)`.
pub const K_SCALE: f32 = 0.398942;

#[derive(Debug, Error, PartialEq)]
pub enum DensityError {
    #[error("asked for {needed} samples but only {len} were given")]
    InputTooShort { needed: usize, len: usize },

    #[error("bandwidth must be finite and positive, got {0}")]
    InvalidBandwidth(f32),
}

/// Something that estimates a density at every sample, possibly off-core.
pub trait DensityEstimator {
    /// Density at each of the first `n` samples of `xs`, using those same
    /// samples as the kernel centres. The result has `n` elements.
    fn estimate_density(&self, n: usize, bandwidth: f32, xs: &[f32])
        -> Result<Vec<f32>, DensityError>;
}

/// Evaluates every sample in parallel on the rayon pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuEstimator;

pub fn gaussian_kernel(u: f32) -> f32 {
    K_SCALE * (-(u * u) / 2.0).exp()
}

impl DensityEstimator for CpuEstimator {
    fn estimate_density(
        &self,
        n: usize,
        bandwidth: f32,
        xs: &[f32],
    ) -> Result<Vec<f32>, DensityError> {
        if n > xs.len() {
            return Err(DensityError::InputTooShort {
                needed: n,
                len: xs.len(),
            });
        }
        if !(bandwidth.is_finite() && bandwidth > 0.0) {
            return Err(DensityError::InvalidBandwidth(bandwidth));
        }

        let xs = &xs[..n];
        let scale = 1.0 / (n as f32 * bandwidth);
        Ok(xs
            .par_iter()
            .map(|&x| {
                let sum: f32 = xs
                    .iter()
                    .map(|&xi| gaussian_kernel((x - xi) / bandwidth))
                    .sum();
                scale * sum
            })
            .collect())
    }
}
