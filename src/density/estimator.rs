//! Kernel density evaluation over a regular grid.
//!
//! Given:
//! - a validated `SampleSet`
//! - a grid step (spatial resolution)
//!
//! we:
//! - build the grid over the sample bounding box
//! - pick the bandwidth with Scott's rule
//! - evaluate the mean Gaussian kernel at every cell (parallel over rows)
//! - scale each value by the cell area, giving approximate mass per cell
//!
//! Each cell sums its kernel contributions in sample order on a single
//! thread, so the output does not depend on the worker count.

use nalgebra::Vector2;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::density::cancel::CancelToken;
use crate::density::grid::build_grid;
use crate::domain::{Bandwidth, DEFAULT_MAX_CELLS, DensityGrid, Grid, SampleSet};
use crate::error::AppError;
use crate::math::{WhitenedKernel, select_bandwidth};

/// Engine settings that do not change the estimate itself.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Upper bound on `Nx * Ny`.
    pub max_cells: usize,
    /// Worker threads; `0` uses the global rayon pool.
    pub threads: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_cells: DEFAULT_MAX_CELLS,
            threads: 0,
        }
    }
}

/// Grid plus raw (unnormalized) density for one evaluation.
#[derive(Debug, Clone)]
pub struct RawEstimate {
    pub grid: Grid,
    pub raw: DensityGrid,
    pub bandwidth: Bandwidth,
}

/// Gaussian KDE evaluator.
pub struct KdeEngine {
    opts: EngineOptions,
    pool: Option<ThreadPool>,
}

impl KdeEngine {
    pub fn new(opts: EngineOptions) -> Result<Self, AppError> {
        let pool = if opts.threads > 0 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(opts.threads)
                .build()
                .map_err(|e| AppError::config(format!("Failed to start {} worker threads: {e}", opts.threads)))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self { opts, pool })
    }

    /// Evaluate the density of `samples` on a grid with step `grid_size`.
    ///
    /// `cancel` is checked before each grid row; once set, evaluation stops
    /// with a `Cancelled` error and the partial grid is dropped.
    pub fn evaluate(
        &self,
        samples: &SampleSet,
        grid_size: f64,
        cancel: &CancelToken,
    ) -> Result<RawEstimate, AppError> {
        let grid = build_grid(&samples.bounds(), grid_size, self.opts.max_cells)?;
        let bandwidth = select_bandwidth(samples)?;
        let kernel = WhitenedKernel::new(&bandwidth.covariance)?;

        let centers: Vec<Vector2<f64>> = samples.points().map(|(x, y)| kernel.whiten(x, y)).collect();

        let values = match &self.pool {
            Some(pool) => pool.install(|| evaluate_rows(&grid, &kernel, &centers, cancel)),
            None => evaluate_rows(&grid, &kernel, &centers, cancel),
        }?;

        let (nx, ny) = grid.shape();
        let raw = DensityGrid::from_values(nx, ny, values)?;

        Ok(RawEstimate {
            grid,
            raw,
            bandwidth,
        })
    }
}

/// Evaluate with default options and no cancellation.
pub fn evaluate(samples: &SampleSet, grid_size: f64) -> Result<(Grid, DensityGrid), AppError> {
    let engine = KdeEngine::new(EngineOptions::default())?;
    let estimate = engine.evaluate(samples, grid_size, &CancelToken::new())?;
    Ok((estimate.grid, estimate.raw))
}

fn evaluate_rows(
    grid: &Grid,
    kernel: &WhitenedKernel,
    centers: &[Vector2<f64>],
    cancel: &CancelToken,
) -> Result<Vec<f64>, AppError> {
    let ny = grid.ys().len();
    let area = grid.cell_area();
    let mut values = vec![0.0; grid.len()];

    // Rows are disjoint slices of `values`, one per x index.
    values
        .par_chunks_mut(ny)
        .enumerate()
        .try_for_each(|(i, row)| {
            if cancel.is_cancelled() {
                return Err(AppError::cancelled(format!(
                    "Density evaluation cancelled at grid row {i}."
                )));
            }
            let x = grid.xs()[i];
            for (cell, &y) in row.iter_mut().zip(grid.ys()) {
                let u = kernel.whiten(x, y);
                *cell = kernel.mean_density(&u, centers) * area;
            }
            Ok(())
        })?;

    Ok(values)
}
