//! Run pipeline shared by the CLI and by library callers.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load samples -> evaluate density on grid -> normalize -> persist
//!
//! The pipeline is a small state machine:
//!
//! ```text
//! Idle -> Loaded -> Computed -> Scaled -> Done
//!   \________\_________\_________\______-> Failed
//! ```
//!
//! Each stage's data is moved into the next one. Any error, including a
//! transition requested out of order, drops whatever the pipeline holds and
//! leaves it in `Failed` and is logged once, here. The density core stays
//! silent.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::density::{CancelToken, KdeEngine, RawEstimate, scale};
use crate::domain::{Bandwidth, BoundingBox, DensityField, SampleSet};
use crate::error::AppError;
use crate::io::{DensitySink, SampleSource, load_samples};

/// Observable pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Loaded,
    Computed,
    Scaled,
    Done,
    Failed,
}

enum Stage {
    Idle,
    Loaded(SampleSet),
    Computed(RawEstimate),
    Scaled(DensityField),
    Done,
    Failed,
}

impl Stage {
    fn state(&self) -> PipelineState {
        match self {
            Stage::Idle => PipelineState::Idle,
            Stage::Loaded(_) => PipelineState::Loaded,
            Stage::Computed(_) => PipelineState::Computed,
            Stage::Scaled(_) => PipelineState::Scaled,
            Stage::Done => PipelineState::Done,
            Stage::Failed => PipelineState::Failed,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub n_samples: usize,
    pub bounds: BoundingBox,
    pub bandwidth: Bandwidth,
    pub grid_shape: (usize, usize),
    pub grid_size: f64,
    pub output: String,
    pub created: DateTime<Local>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct Facts {
    n_samples: usize,
    bounds: Option<BoundingBox>,
    grid_shape: (usize, usize),
    grid_size: f64,
    started: Option<Instant>,
}

pub struct Pipeline {
    engine: KdeEngine,
    cancel: CancelToken,
    stage: Stage,
    facts: Facts,
}

impl Pipeline {
    pub fn new(engine: KdeEngine) -> Self {
        Self {
            engine,
            cancel: CancelToken::new(),
            stage: Stage::Idle,
            facts: Facts::default(),
        }
    }

    /// Use `cancel` for the compute step instead of a private token.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle for cancelling the compute step from another thread.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn state(&self) -> PipelineState {
        self.stage.state()
    }

    /// `Idle -> Loaded` from an already validated sample set.
    pub fn load(&mut self, samples: SampleSet) -> Result<(), AppError> {
        self.transition("load", |stage, facts| match stage {
            Stage::Idle => {
                facts.started = Some(Instant::now());
                facts.n_samples = samples.len();
                facts.bounds = Some(samples.bounds());
                tracing::info!(n_samples = samples.len(), "samples loaded");
                Ok(Stage::Loaded(samples))
            }
            other => Err(out_of_order("load", other.state())),
        })
    }

    /// `Idle -> Loaded`, reading `x` / `y` from `source`.
    pub fn load_from(&mut self, source: &dyn SampleSource) -> Result<(), AppError> {
        if self.state() != PipelineState::Idle {
            let state = self.state();
            return self.fail(out_of_order("load", state));
        }
        tracing::info!(source = %source.describe(), "reading samples");
        match load_samples(source) {
            Ok(samples) => self.load(samples),
            Err(e) => self.fail(e),
        }
    }

    /// `Loaded -> Computed`: evaluate the raw density with step `grid_size`.
    pub fn compute(&mut self, grid_size: f64) -> Result<(), AppError> {
        let engine = &self.engine;
        let cancel = &self.cancel;
        let stage = std::mem::replace(&mut self.stage, Stage::Failed);
        let result = match stage {
            Stage::Loaded(samples) => {
                tracing::info!(grid_size, "evaluating density");
                let started = Instant::now();
                engine.evaluate(&samples, grid_size, cancel).map(|estimate| {
                    let (nx, ny) = estimate.grid.shape();
                    tracing::info!(
                        nx,
                        ny,
                        scott_factor = estimate.bandwidth.factor,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "density evaluated"
                    );
                    estimate
                })
            }
            other => Err(out_of_order("compute", other.state())),
        };

        match result {
            Ok(estimate) => {
                self.facts.grid_shape = estimate.grid.shape();
                self.facts.grid_size = grid_size;
                self.stage = Stage::Computed(estimate);
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    /// `Computed -> Scaled`: min-max rescale into `[0, 1]`.
    pub fn normalize(&mut self) -> Result<(), AppError> {
        self.transition("normalize", |stage, _| match stage {
            Stage::Computed(estimate) => {
                let density = scale(estimate.raw)?;
                tracing::debug!("density rescaled to [0, 1]");
                Ok(Stage::Scaled(DensityField {
                    grid: estimate.grid,
                    density,
                    bandwidth: estimate.bandwidth,
                }))
            }
            other => Err(out_of_order("normalize", other.state())),
        })
    }

    /// `Scaled -> Done`: hand the field to `sink`.
    pub fn finalize(&mut self, sink: &mut dyn DensitySink) -> Result<RunReport, AppError> {
        let stage = std::mem::replace(&mut self.stage, Stage::Failed);
        let field = match stage {
            Stage::Scaled(field) => field,
            other => return self.fail(out_of_order("finalize", other.state())),
        };

        let Some(bounds) = self.facts.bounds else {
            return self.fail(AppError::state("Cannot finalize a run that was never loaded."));
        };

        let created = Local::now();
        tracing::info!(output = %sink.describe(), "writing density");
        if let Err(e) = sink.write(&field, created) {
            return self.fail(e);
        }
        tracing::info!(output = %sink.describe(), "density written");

        self.stage = Stage::Done;
        let facts = std::mem::take(&mut self.facts);
        Ok(RunReport {
            n_samples: facts.n_samples,
            bounds,
            bandwidth: field.bandwidth,
            grid_shape: facts.grid_shape,
            grid_size: facts.grid_size,
            output: sink.describe(),
            created,
            elapsed: facts.started.map(|s| s.elapsed()).unwrap_or_default(),
        })
    }

    fn transition<F>(&mut self, name: &str, step: F) -> Result<(), AppError>
    where
        F: FnOnce(Stage, &mut Facts) -> Result<Stage, AppError>,
    {
        let stage = std::mem::replace(&mut self.stage, Stage::Failed);
        match step(stage, &mut self.facts) {
            Ok(next) => {
                tracing::debug!(transition = name, state = ?next.state(), "pipeline transition");
                self.stage = next;
                Ok(())
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail<T>(&mut self, err: AppError) -> Result<T, AppError> {
        self.stage = Stage::Failed;
        tracing::error!(kind = ?err.kind(), "{err}");
        Err(err)
    }
}

fn out_of_order(transition: &str, state: PipelineState) -> AppError {
    AppError::state(format!("Cannot {transition} from state {state:?}."))
}

/// Run every transition in order.
pub fn run_density(
    pipeline: &mut Pipeline,
    source: &dyn SampleSource,
    grid_size: f64,
    sink: &mut dyn DensitySink,
) -> Result<RunReport, AppError> {
    pipeline.load_from(source)?;
    pipeline.compute(grid_size)?;
    pipeline.normalize()?;
    pipeline.finalize(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::EngineOptions;
    use crate::domain::DensityField;
    use crate::error::ErrorKind;
    use crate::io::{Dataset, FileSink, VAR_DENSITY};
    use rand::prelude::*;
    use rand::rngs::StdRng;
    use rand_distr::Normal;

    /// In-memory source.
    struct MemSource(Vec<(&'static str, Vec<f64>)>);

    impl SampleSource for MemSource {
        fn variable(&self, name: &str) -> Result<Option<Vec<f64>>, AppError> {
            Ok(self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v.clone()))
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    /// Sink that keeps what it receives.
    #[derive(Default)]
    struct MemSink {
        written: Option<DensityField>,
        fail: bool,
    }

    impl DensitySink for MemSink {
        fn write(&mut self, field: &DensityField, _created: DateTime<Local>) -> Result<(), AppError> {
            if self.fail {
                return Err(AppError::output("disk full"));
            }
            self.written = Some(field.clone());
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(KdeEngine::new(EngineOptions::default()).unwrap())
    }

    /// Tight cluster at (50, 50) amid a uniform scatter over [0, 100]².
    fn clustered(seed: u64) -> MemSource {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0, 2.0).unwrap();
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..200 {
            x.push(50.0 + noise.sample(&mut rng));
            y.push(50.0 + noise.sample(&mut rng));
        }
        for _ in 0..40 {
            x.push(rng.gen_range(0.0..=100.0));
            y.push(rng.gen_range(0.0..=100.0));
        }
        // Pin the bounding box to [0, 100]².
        x.extend([0.0, 100.0]);
        y.extend([0.0, 100.0]);
        MemSource(vec![("x", x), ("y", y)])
    }

    #[test]
    fn full_run_reaches_done() {
        let mut p = pipeline();
        let mut sink = MemSink::default();
        let report = run_density(&mut p, &clustered(7), 10.0, &mut sink).unwrap();

        assert_eq!(p.state(), PipelineState::Done);
        assert_eq!(report.n_samples, 242);
        assert_eq!(report.grid_shape, (11, 11));

        let field = sink.written.unwrap();
        let values = field.density.values();
        assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn peak_is_next_to_cluster_center() {
        let mut p = pipeline();
        let mut sink = MemSink::default();
        run_density(&mut p, &clustered(11), 10.0, &mut sink).unwrap();

        let field = sink.written.unwrap();
        let (i, j) = field.density.argmax().unwrap();
        let (px, py) = (field.grid.x_at(i, j), field.grid.y_at(i, j));
        assert!((px - 50.0).abs() <= 10.0 && (py - 50.0).abs() <= 10.0, "peak at ({px}, {py})");
    }

    #[test]
    fn repeated_runs_are_identical() {
        let source = clustered(3);
        let mut a = MemSink::default();
        let mut b = MemSink::default();
        run_density(&mut pipeline(), &source, 5.0, &mut a).unwrap();
        run_density(&mut pipeline(), &source, 5.0, &mut b).unwrap();
        assert_eq!(a.written.unwrap().density.values(), b.written.unwrap().density.values());
    }

    #[test]
    fn missing_y_fails_before_compute() {
        let mut p = pipeline();
        let source = MemSource(vec![("x", vec![1.0, 2.0, 3.0])]);
        let err = p.load_from(&source).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
        assert_eq!(p.state(), PipelineState::Failed);

        // A failed pipeline accepts no further transitions.
        assert_eq!(p.compute(1.0).unwrap_err().kind(), ErrorKind::State);
    }

    #[test]
    fn identical_samples_fail_compute() {
        let mut p = pipeline();
        p.load(SampleSet::new(&[2.0; 6], &[9.0; 6]).unwrap()).unwrap();
        let err = p.compute(1.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SingularCovariance);
        assert_eq!(p.state(), PipelineState::Failed);
    }

    #[test]
    fn out_of_order_transition_fails() {
        let mut p = pipeline();
        assert_eq!(p.normalize().unwrap_err().kind(), ErrorKind::State);
        assert_eq!(p.state(), PipelineState::Failed);
    }

    #[test]
    fn cancelled_compute_fails() {
        let token = CancelToken::new();
        let mut p = pipeline().with_cancel_token(token.clone());
        p.load_from(&clustered(1)).unwrap();
        token.cancel();
        assert_eq!(p.compute(10.0).unwrap_err().kind(), ErrorKind::Cancelled);
        assert_eq!(p.state(), PipelineState::Failed);
    }

    #[test]
    fn expired_deadline_cancels_compute() {
        let mut p = pipeline();
        p.load_from(&clustered(2)).unwrap();
        let token = p.cancel_token().clone();
        let deadline = crate::density::Deadline::start(token.clone(), Duration::ZERO).unwrap();
        let waited = Instant::now();
        while !token.is_cancelled() && waited.elapsed() < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(1));
        }
        drop(deadline);
        assert_eq!(p.compute(10.0).unwrap_err().kind(), ErrorKind::Cancelled);
        assert_eq!(p.state(), PipelineState::Failed);
    }

    #[test]
    fn sink_failure_fails_finalize() {
        let mut p = pipeline();
        let mut sink = MemSink {
            fail: true,
            ..MemSink::default()
        };
        let err = run_density(&mut p, &clustered(5), 10.0, &mut sink).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Output);
        assert_eq!(p.state(), PipelineState::Failed);
        assert!(sink.written.is_none());
    }

    #[test]
    fn coarse_grid_over_large_extent() {
        let mut p = pipeline();
        let x = vec![0.0, 10_000.0, 2_500.0, 7_000.0, 4_000.0];
        let y = vec![0.0, 10_000.0, 6_000.0, 3_000.0, 8_500.0];
        let mut sink = MemSink::default();
        let report = run_density(&mut p, &MemSource(vec![("x", x), ("y", y)]), 9500.0, &mut sink).unwrap();
        assert_eq!(report.grid_shape, (2, 2));
        assert_eq!(sink.written.unwrap().grid.xs(), &[0.0, 9500.0]);
    }

    #[test]
    fn file_output_dimensions_match_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("density.json");
        let mut sink = FileSink::new(&path);
        run_density(&mut pipeline(), &clustered(9), 10.0, &mut sink).unwrap();

        let ds: Dataset = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(ds.dimensions["x"], ds.variables["x"].data.len());
        assert_eq!(ds.dimensions["y"], ds.variables["y"].data.len());
        let density = &ds.variables[VAR_DENSITY].data;
        assert_eq!(density.len(), 11 * 11);
        let best = density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        let (bx, by) = (ds.variables["x"].data[best / 11], ds.variables["y"].data[best % 11]);
        assert!((bx - 50.0).abs() <= 10.0 && (by - 50.0).abs() <= 10.0);
    }
}
