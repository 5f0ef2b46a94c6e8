//! Shared domain types.
//!
//! These types are owned by exactly one pipeline stage at a time and moved to
//! the next stage; nothing here is shared or mutated after construction.

use std::path::PathBuf;
use std::time::Duration;

use nalgebra::Matrix2;

use crate::error::AppError;

/// Default grid step, in the same linear unit as the samples (meters).
pub const DEFAULT_GRID_SIZE: f64 = 9500.0;

/// Default upper bound on `Nx * Ny`.
pub const DEFAULT_MAX_CELLS: usize = 50_000_000;

/// Resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Grid step (spatial resolution, not a point count).
    pub grid_size: f64,
    /// Worker threads for kernel evaluation; `0` uses rayon's global pool.
    pub threads: usize,
    pub max_cells: usize,
    pub log_file: PathBuf,
    pub log_level: tracing::Level,
    /// Cancel the computation once this much time has passed.
    pub timeout: Option<Duration>,
}

/// Immutable snapshot of the input coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl SampleSet {
    /// Copy `x` / `y` into a validated sample set.
    ///
    /// Requires equal lengths, at least two points and finite coordinates.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self, AppError> {
        if x.len() != y.len() {
            return Err(AppError::invalid_sample(format!(
                "Sample variables differ in length: x has {} values, y has {}.",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(AppError::invalid_sample(format!(
                "At least 2 samples are required, got {}.",
                x.len()
            )));
        }
        if let Some(idx) = x
            .iter()
            .zip(y)
            .position(|(a, b)| !(a.is_finite() && b.is_finite()))
        {
            return Err(AppError::invalid_sample(format!(
                "Sample {idx} is not finite: ({}, {}).",
                x[idx], y[idx]
            )));
        }

        Ok(Self {
            xs: x.to_vec(),
            ys: y.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Always false: construction rejects fewer than two samples.
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    pub fn bounds(&self) -> BoundingBox {
        let mut b = BoundingBox {
            x_min: f64::INFINITY,
            y_min: f64::INFINITY,
            x_max: f64::NEG_INFINITY,
            y_max: f64::NEG_INFINITY,
        };
        for (x, y) in self.points() {
            b.x_min = b.x_min.min(x);
            b.y_min = b.y_min.min(y);
            b.x_max = b.x_max.max(x);
            b.y_max = b.y_max.max(y);
        }
        b
    }

    /// Unbiased (n - 1) sample covariance of `(x, y)`.
    pub fn covariance(&self) -> Matrix2<f64> {
        let n = self.len() as f64;
        let mean_x = self.xs.iter().sum::<f64>() / n;
        let mean_y = self.ys.iter().sum::<f64>() / n;

        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (x, y) in self.points() {
            let dx = x - mean_x;
            let dy = y - mean_y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }

        let denom = n - 1.0;
        Matrix2::new(sxx / denom, sxy / denom, sxy / denom, syy / denom)
    }
}

/// Axis-aligned bounds of a sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Regular evaluation grid.
///
/// Cell `(i, j)` sits at `(xs[i], ys[j])`; the 2-D coordinate arrays are
/// implied by the two axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    xs: Vec<f64>,
    ys: Vec<f64>,
    step: f64,
}

impl Grid {
    pub(crate) fn from_axes(xs: Vec<f64>, ys: Vec<f64>, step: f64) -> Self {
        Self { xs, ys, step }
    }

    /// `(Nx, Ny)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.xs.len(), self.ys.len())
    }

    pub fn len(&self) -> usize {
        self.xs.len() * self.ys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ys(&self) -> &[f64] {
        &self.ys
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn cell_area(&self) -> f64 {
        self.step * self.step
    }

    pub fn x_at(&self, i: usize, _j: usize) -> f64 {
        self.xs[i]
    }

    pub fn y_at(&self, _i: usize, j: usize) -> f64 {
        self.ys[j]
    }
}

/// 2-D density values, row-major with the x index outer.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    nx: usize,
    ny: usize,
    values: Vec<f64>,
}

impl DensityGrid {
    pub fn from_values(nx: usize, ny: usize, values: Vec<f64>) -> Result<Self, AppError> {
        if nx.checked_mul(ny) != Some(values.len()) {
            return Err(AppError::invalid_grid(format!(
                "Density grid shape ({nx}, {ny}) does not match {} values.",
                values.len()
            )));
        }
        Ok(Self { nx, ny, values })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.ny + j]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// `(min, max)` over all cells, or `None` if any value is non-finite.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &v in &self.values {
            if !v.is_finite() {
                return None;
            }
            min = min.min(v);
            max = max.max(v);
        }
        if self.values.is_empty() { None } else { Some((min, max)) }
    }

    /// Index `(i, j)` of the largest cell; ties go to the first in row-major order.
    pub fn argmax(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, f64)> = None;
        for (k, &v) in self.values.iter().enumerate() {
            match best {
                Some((_, b)) if v <= b => {}
                _ => best = Some((k, v)),
            }
        }
        best.map(|(k, _)| (k / self.ny, k % self.ny))
    }
}

/// Kernel bandwidth chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bandwidth {
    /// Scott factor `n^(-1/6)`.
    pub factor: f64,
    /// `factor² · Σ`.
    pub covariance: Matrix2<f64>,
}

/// Final product of a run: grid, normalized density and the bandwidth used.
#[derive(Debug, Clone)]
pub struct DensityField {
    pub grid: Grid,
    pub density: DensityGrid,
    pub bandwidth: Bandwidth,
}
