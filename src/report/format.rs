//! Formatted terminal output.
//!
//! We keep formatting code in one place so the pipeline and density code
//! stay free of presentation concerns.

use crate::app::pipeline::RunReport;
use crate::domain::RunConfig;

/// Lines printed before a run starts.
pub fn format_start_banner(config: &RunConfig) -> String {
    let mut out = String::new();
    out.push_str("=== kde - 2-D Gaussian density grid ===\n");
    out.push_str(&format!("Input:     {}\n", config.input.display()));
    out.push_str(&format!("Output:    {}\n", config.output.display()));
    out.push_str(&format!("Grid step: {}\n", config.grid_size));
    out.push_str(&format!("Log file:  {}", config.log_file.display()));
    out
}

/// Summary of a completed run.
pub fn format_run_summary(report: &RunReport) -> String {
    let b = &report.bounds;
    let k = &report.bandwidth.covariance;
    let (nx, ny) = report.grid_shape;

    let mut out = String::new();
    out.push_str(&format!("Samples: n={}\n", report.n_samples));
    out.push_str(&format!(
        "Bounds:  x=[{:.3}, {:.3}] | y=[{:.3}, {:.3}]\n",
        b.x_min, b.x_max, b.y_min, b.y_max
    ));
    out.push_str(&format!("Scott factor: {:.6}\n", report.bandwidth.factor));
    out.push_str(&format!(
        "Kernel covariance: [[{:.6e}, {:.6e}], [{:.6e}, {:.6e}]]\n",
        k[(0, 0)],
        k[(0, 1)],
        k[(1, 0)],
        k[(1, 1)]
    ));
    out.push_str(&format!(
        "Grid: {nx} x {ny} = {} cells (step {})\n",
        nx * ny,
        report.grid_size
    ));
    out.push_str(&format!("Output: {}\n", report.output));
    out.push_str(&format!(
        "Completed: {} ({:.3}s)",
        report.created.format("%Y-%m-%d %H:%M:%S"),
        report.elapsed.as_secs_f64()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bandwidth, BoundingBox};
    use chrono::Local;
    use nalgebra::Matrix2;
    use std::time::Duration;

    #[test]
    fn summary_mentions_shape_and_samples() {
        let report = RunReport {
            n_samples: 42,
            bounds: BoundingBox {
                x_min: 0.0,
                y_min: 0.0,
                x_max: 10_000.0,
                y_max: 10_000.0,
            },
            bandwidth: Bandwidth {
                factor: 0.5,
                covariance: Matrix2::identity(),
            },
            grid_shape: (2, 2),
            grid_size: 9500.0,
            output: "'out.json'".to_string(),
            created: Local::now(),
            elapsed: Duration::from_millis(1500),
        };

        let text = format_run_summary(&report);
        assert!(text.contains("n=42"));
        assert!(text.contains("Grid: 2 x 2 = 4 cells (step 9500)"));
        assert!(text.contains("(1.500s)"));
    }
}
