//! Bivariate Gaussian kernel in whitened coordinates.
//!
//! With the kernel covariance factored as `K = L Lᵀ` (Cholesky), the
//! Mahalanobis distance between a grid point `p` and a sample `s` is
//!
//! ```text
//! (p - s)ᵀ K⁻¹ (p - s) = |L⁻¹p - L⁻¹s|²
//! ```
//!
//! so samples are whitened once and each evaluation is a plain squared
//! Euclidean distance. The normalizing constant is `1 / (2π · det(L))`.

use std::f64::consts::PI;

use nalgebra::{Matrix2, Vector2};

use crate::error::AppError;

/// A Gaussian kernel with fixed covariance, ready for repeated evaluation.
#[derive(Debug, Clone)]
pub struct WhitenedKernel {
    l_inv: Matrix2<f64>,
    norm: f64,
}

impl WhitenedKernel {
    /// Factor `covariance`; fails if it is not positive definite.
    pub fn new(covariance: &Matrix2<f64>) -> Result<Self, AppError> {
        let chol = covariance.cholesky().ok_or_else(|| {
            AppError::singular_covariance("Kernel covariance is not positive definite.")
        })?;
        let l = chol.l();
        let l_inv = l.try_inverse().ok_or_else(|| {
            AppError::singular_covariance("Kernel covariance factor is not invertible.")
        })?;

        let det_l = l[(0, 0)] * l[(1, 1)];
        let norm = 1.0 / (2.0 * PI * det_l);
        if !norm.is_finite() {
            return Err(AppError::singular_covariance(
                "Kernel normalizing constant is not finite.",
            ));
        }

        Ok(Self { l_inv, norm })
    }

    pub fn whiten(&self, x: f64, y: f64) -> Vector2<f64> {
        self.l_inv * Vector2::new(x, y)
    }

    /// Mean kernel value at whitened point `u` over whitened `centers`.
    ///
    /// The sum runs in `centers` order, so results are reproducible.
    pub fn mean_density(&self, u: &Vector2<f64>, centers: &[Vector2<f64>]) -> f64 {
        if centers.is_empty() {
            return 0.0;
        }
        let sum: f64 = centers
            .iter()
            .map(|v| (-0.5 * (u - v).norm_squared()).exp())
            .sum();
        self.norm * sum / centers.len() as f64
    }
}
