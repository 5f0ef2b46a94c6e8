//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and resolves configuration
//! - opens the run log
//! - drives the density pipeline
//! - prints the run summary

use crate::config::{EnvSettings, resolve};
use crate::density::{Deadline, EngineOptions, KdeEngine};
use crate::domain::RunConfig;
use crate::error::AppError;
use crate::io::{FileSink, open_source};

pub mod logging;
pub mod pipeline;

use pipeline::{Pipeline, RunReport, run_density};

/// Entry point for the `kde` binary.
pub fn run() -> Result<(), AppError> {
    let Some(cli) = crate::cli::parse(std::env::args_os())? else {
        return Ok(());
    };
    let env = EnvSettings::from_env()?;
    let config = resolve(&cli, &env)?;

    logging::init(&config.log_file, config.log_level)?;
    tracing::info!(
        input = %config.input.display(),
        output = %config.output.display(),
        grid_size = config.grid_size,
        "starting"
    );
    println!("{}", crate::report::format_start_banner(&config));

    let report = execute(&config)?;

    tracing::info!(elapsed_ms = report.elapsed.as_millis() as u64, "complete");
    println!("{}", crate::report::format_run_summary(&report));
    Ok(())
}

/// Run one density computation as described by `config`.
///
/// With a timeout set, a watchdog cancels the compute step once it expires.
pub fn execute(config: &RunConfig) -> Result<RunReport, AppError> {
    let engine = KdeEngine::new(EngineOptions {
        max_cells: config.max_cells,
        threads: config.threads,
    })
    .inspect_err(log_failure)?;
    let mut pipeline = Pipeline::new(engine);

    let source = open_source(&config.input).inspect_err(log_failure)?;
    let _deadline = match config.timeout {
        Some(timeout) => Some(
            Deadline::start(pipeline.cancel_token().clone(), timeout).inspect_err(log_failure)?,
        ),
        None => None,
    };

    // The pipeline logs its own failures.
    let mut sink = FileSink::new(&config.output);
    run_density(&mut pipeline, source.as_ref(), config.grid_size, &mut sink)
}

fn log_failure(err: &AppError) {
    tracing::error!(kind = ?err.kind(), "{err}");
}
