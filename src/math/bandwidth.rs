//! Bandwidth selection (Scott's rule).
//!
//! For `n` samples in `d` dimensions Scott's factor is
//!
//! ```text
//! h = n^(-1/(d+4))
//! ```
//!
//! and the kernel covariance is the sample covariance scaled by `h²`.
//!
//! A singular covariance (identical or collinear samples) leaves the kernel
//! undefined, so it is rejected here rather than surfacing later as NaNs.

use nalgebra::Matrix2;

use crate::domain::{Bandwidth, SampleSet};
use crate::error::AppError;

/// Dimensionality of the estimator.
pub const DIMS: usize = 2;

/// Relative determinant threshold below which `Σ` is treated as singular.
///
/// Compared against `σx² · σy²`, so the test is scale-free: collinear data
/// gives a correlation of ±1 and a relative determinant near rounding noise.
const SINGULAR_REL_DET: f64 = 1e-12;

/// Scott's factor `n^(-1/(d+4))`.
pub fn scott_factor(n: usize) -> f64 {
    (n as f64).powf(-1.0 / (DIMS as f64 + 4.0))
}

/// Pick the kernel bandwidth for `samples`.
pub fn select_bandwidth(samples: &SampleSet) -> Result<Bandwidth, AppError> {
    let cov = samples.covariance();
    ensure_non_singular(&cov)?;

    let factor = scott_factor(samples.len());
    Ok(Bandwidth {
        factor,
        covariance: cov * (factor * factor),
    })
}

fn ensure_non_singular(cov: &Matrix2<f64>) -> Result<(), AppError> {
    let var_x = cov[(0, 0)];
    let var_y = cov[(1, 1)];
    let scale = var_x * var_y;
    let det = cov.determinant();

    let singular = !(var_x > 0.0 && var_y > 0.0 && scale.is_finite() && det.is_finite())
        || det <= SINGULAR_REL_DET * scale;

    if singular {
        return Err(AppError::singular_covariance(format!(
            "Sample covariance is singular (var_x={var_x:.6e}, var_y={var_y:.6e}, det={det:.6e}); \
             samples are identical or collinear."
        )));
    }
    Ok(())
}
