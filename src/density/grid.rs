//! Regular grid construction.
//!
//! The grid step is a spatial resolution in sample units, not a point count.
//! Each axis starts at the sample minimum and advances by `step` while it
//! stays within the maximum:
//!
//! ```text
//! N = floor((max - min) / step) + 1
//! ```
//!
//! A step wider than the data extent therefore gives a single cell on that
//! axis, which is a valid (coarse) grid.

use crate::domain::{BoundingBox, Grid};
use crate::error::AppError;

/// Number of points along one axis.
pub fn axis_len(min: f64, max: f64, step: f64) -> Result<usize, AppError> {
    validate_step(step)?;
    let span = max - min;
    if !(span.is_finite() && span >= 0.0) {
        return Err(AppError::invalid_grid(format!(
            "Invalid axis range: min={min}, max={max}."
        )));
    }

    // A span that is a whole number of steps up to rounding keeps its last point.
    let k = span / step;
    let steps = if (k - k.round()).abs() <= 1e-9 * k.max(1.0) {
        k.round()
    } else {
        k.floor()
    };
    if steps >= (usize::MAX - 1) as f64 {
        return Err(AppError::invalid_grid(format!(
            "Grid step {step} is too small for an extent of {span}."
        )));
    }
    Ok(steps as usize + 1)
}

/// `len` evenly spaced points `min, min + step, ...`, never past `max`.
pub fn axis(min: f64, max: f64, step: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| (min + step * i as f64).min(max)).collect()
}

/// Build the evaluation grid over `bounds`.
///
/// Fails if the step is unusable or `Nx * Ny` exceeds `max_cells`.
pub fn build_grid(bounds: &BoundingBox, step: f64, max_cells: usize) -> Result<Grid, AppError> {
    let nx = axis_len(bounds.x_min, bounds.x_max, step)?;
    let ny = axis_len(bounds.y_min, bounds.y_max, step)?;

    let cells = nx.checked_mul(ny).ok_or_else(|| {
        AppError::invalid_grid(format!("Grid of {nx} x {ny} cells overflows."))
    })?;
    if cells > max_cells {
        return Err(AppError::invalid_grid(format!(
            "Grid of {nx} x {ny} = {cells} cells exceeds the limit of {max_cells}; \
             use a larger grid step."
        )));
    }

    Ok(Grid::from_axes(
        axis(bounds.x_min, bounds.x_max, step, nx),
        axis(bounds.y_min, bounds.y_max, step, ny),
        step,
    ))
}

fn validate_step(step: f64) -> Result<(), AppError> {
    if !(step.is_finite() && step > 0.0) {
        return Err(AppError::invalid_grid(format!(
            "Grid step must be finite and > 0, got {step}."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn square(max: f64) -> BoundingBox {
        BoundingBox {
            x_min: 0.0,
            y_min: 0.0,
            x_max: max,
            y_max: max,
        }
    }

    #[test]
    fn coarse_step_gives_two_by_two() {
        let grid = build_grid(&square(10_000.0), 9500.0, usize::MAX).unwrap();
        assert_eq!(grid.shape(), (2, 2));
        assert_eq!(grid.xs(), &[0.0, 9500.0]);
        assert_eq!(grid.ys(), &[0.0, 9500.0]);
    }

    #[test]
    fn step_wider_than_extent_gives_single_cell() {
        let grid = build_grid(&square(10.0), 50.0, usize::MAX).unwrap();
        assert_eq!(grid.shape(), (1, 1));
    }

    #[test]
    fn exact_multiple_includes_max() {
        let grid = build_grid(&square(100.0), 10.0, usize::MAX).unwrap();
        assert_eq!(grid.shape(), (11, 11));
        assert_eq!(*grid.xs().last().unwrap(), 100.0);
    }

    #[test]
    fn fractional_step_keeps_max_despite_rounding() {
        // 0.3 / 0.1 is 2.9999999999999996 in f64.
        let grid = build_grid(&square(0.3), 0.1, usize::MAX).unwrap();
        assert_eq!(grid.shape(), (4, 4));
        assert_eq!(grid.xs().len(), 4);
        assert_eq!(grid.xs()[..3], [0.0, 0.1, 0.2]);
        assert_eq!(*grid.xs().last().unwrap(), 0.3);

        let grid = build_grid(&square(2.9), 0.1, usize::MAX).unwrap();
        assert_eq!(grid.xs().len(), 30);
        assert_eq!(*grid.xs().last().unwrap(), 2.9);
        assert!(grid.xs().windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn step_just_short_of_max_is_floored() {
        assert_eq!(axis_len(0.0, 10.0, 3.0).unwrap(), 4);
        assert_eq!(axis_len(0.0, 0.35, 0.1).unwrap(), 4);
    }

    #[test]
    fn rectangular_bounds() {
        let b = BoundingBox {
            x_min: -5.0,
            y_min: 100.0,
            x_max: 5.0,
            y_max: 103.0,
        };
        let grid = build_grid(&b, 2.0, usize::MAX).unwrap();
        assert_eq!(grid.shape(), (6, 2));
        assert_eq!(grid.x_at(5, 0), 5.0);
        assert_eq!(grid.y_at(0, 1), 102.0);
    }

    #[test]
    fn invalid_steps_are_rejected() {
        for step in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = build_grid(&square(10.0), step, usize::MAX).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidGrid);
        }
    }

    #[test]
    fn cell_limit_is_enforced() {
        let err = build_grid(&square(100.0), 1.0, 1000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidGrid);
    }
}
