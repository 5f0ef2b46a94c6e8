//! Run configuration.
//!
//! Precedence: command-line flags, then environment (optionally from a
//! `.env` file), then built-in defaults.
//!
//! | variable        | meaning                         | default      |
//! |-----------------|---------------------------------|--------------|
//! | `KDE_GRID_SIZE` | grid step in sample units       | `9500`       |
//! | `KDE_THREADS`   | worker threads (`0` = default)  | `0`          |
//! | `KDE_MAX_CELLS` | upper bound on `Nx * Ny`        | `50000000`   |
//! | `KDE_LOG_FILE`  | append-only run log             | `output.log` |
//! | `KDE_LOG`       | log level                       | `info`       |
//! | `KDE_TIMEOUT`   | seconds before the run cancels  | none         |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cli::Cli;
use crate::domain::{DEFAULT_GRID_SIZE, DEFAULT_MAX_CELLS, RunConfig};
use crate::error::AppError;

pub const DEFAULT_LOG_FILE: &str = "output.log";

pub const ENV_GRID_SIZE: &str = "KDE_GRID_SIZE";
pub const ENV_THREADS: &str = "KDE_THREADS";
pub const ENV_MAX_CELLS: &str = "KDE_MAX_CELLS";
pub const ENV_LOG_FILE: &str = "KDE_LOG_FILE";
pub const ENV_LOG: &str = "KDE_LOG";
pub const ENV_TIMEOUT: &str = "KDE_TIMEOUT";

/// Settings taken from the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvSettings {
    pub grid_size: Option<f64>,
    pub threads: Option<usize>,
    pub max_cells: Option<usize>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<tracing::Level>,
    pub timeout: Option<f64>,
}

impl EnvSettings {
    /// Read the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            grid_size: parse_var(&lookup, ENV_GRID_SIZE)?,
            threads: parse_var(&lookup, ENV_THREADS)?,
            max_cells: parse_var(&lookup, ENV_MAX_CELLS)?,
            log_file: lookup(ENV_LOG_FILE)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            log_level: parse_var(&lookup, ENV_LOG)?,
            timeout: parse_var(&lookup, ENV_TIMEOUT)?,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| AppError::config(format!("Invalid value '{raw}' for {key}.")))
}

/// Merge CLI flags with environment settings.
pub fn resolve(cli: &Cli, env: &EnvSettings) -> Result<RunConfig, AppError> {
    let grid_size = cli.grid_size.or(env.grid_size).unwrap_or(DEFAULT_GRID_SIZE);
    if !(grid_size.is_finite() && grid_size > 0.0) {
        return Err(AppError::config(format!(
            "Grid size must be finite and > 0, got {grid_size}."
        )));
    }

    let max_cells = cli.max_cells.or(env.max_cells).unwrap_or(DEFAULT_MAX_CELLS);
    if max_cells == 0 {
        return Err(AppError::config("Maximum cell count must be > 0."));
    }

    let timeout = match cli.timeout.or(env.timeout) {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => {
            return Err(AppError::config(format!(
                "Timeout must be finite and > 0 seconds, got {secs}."
            )));
        }
        None => None,
    };

    Ok(RunConfig {
        input: cli.input.clone(),
        output: cli.output.clone(),
        grid_size,
        threads: cli.threads.or(env.threads).unwrap_or(0),
        max_cells,
        log_file: cli
            .log_file
            .clone()
            .or_else(|| env.log_file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        log_level: cli.log_level.or(env.log_level).unwrap_or(tracing::Level::INFO),
        timeout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use clap::Parser;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> Result<EnvSettings, AppError> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        EnvSettings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_without_flags_or_env() {
        let cli = Cli::parse_from(["kde", "in.csv", "out.json"]);
        let config = resolve(&cli, &EnvSettings::default()).unwrap();
        assert_eq!(config.grid_size, 9500.0);
        assert_eq!(config.threads, 0);
        assert_eq!(config.log_file, PathBuf::from("output.log"));
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn flags_override_environment() {
        let settings = env(&[(ENV_GRID_SIZE, "250"), (ENV_THREADS, "3"), (ENV_LOG, "debug")]).unwrap();
        let cli = Cli::parse_from(["kde", "in.csv", "out.json", "--grid-size", "10"]);
        let config = resolve(&cli, &settings).unwrap();
        assert_eq!(config.grid_size, 10.0);
        assert_eq!(config.threads, 3);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn bad_environment_value_is_a_config_error() {
        let err = env(&[(ENV_MAX_CELLS, "lots")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn timeout_comes_from_flag_or_environment() {
        let settings = env(&[(ENV_TIMEOUT, "30")]).unwrap();
        let cli = Cli::parse_from(["kde", "in.csv", "out.json"]);
        let config = resolve(&cli, &settings).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));

        let cli = Cli::parse_from(["kde", "in.csv", "out.json", "--timeout", "0.5"]);
        let config = resolve(&cli, &settings).unwrap();
        assert_eq!(config.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn non_positive_timeout_is_rejected() {
        let cli = Cli::parse_from(["kde", "in.csv", "out.json", "--timeout", "0"]);
        assert_eq!(resolve(&cli, &EnvSettings::default()).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn non_positive_grid_size_is_rejected() {
        let cli = Cli::parse_from(["kde", "in.csv", "out.json", "--grid-size", "0"]);
        assert_eq!(resolve(&cli, &EnvSettings::default()).unwrap_err().kind(), ErrorKind::Config);
    }
}
