//! Min-max rescaling of a raw density grid into `[0, 1]`.

use crate::domain::DensityGrid;
use crate::error::AppError;

/// Rescale `raw` so its minimum maps to 0 and its maximum to 1.
///
/// A flat grid (`max == min`) has no range to scale by and is rejected, as is
/// a grid holding non-finite values.
pub fn scale(raw: DensityGrid) -> Result<DensityGrid, AppError> {
    let (nx, ny) = raw.shape();
    let (min, max) = raw.finite_range().ok_or_else(|| {
        AppError::degenerate_range("Raw density grid is empty or contains non-finite values.")
    })?;

    let range = max - min;
    if !(range > 0.0 && range.is_finite()) {
        return Err(AppError::degenerate_range(format!(
            "Raw density is constant ({min:.6e}); cannot rescale to [0, 1]."
        )));
    }

    let scaled = raw
        .into_values()
        .into_iter()
        .map(|v| ((v - min) / range).clamp(0.0, 1.0))
        .collect();
    DensityGrid::from_values(nx, ny, scaled)
}
