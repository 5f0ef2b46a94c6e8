//! Command-line parsing for the density tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! density code. Unset options fall back to the environment (see `config`).

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;

use crate::error::AppError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "kde",
    version,
    about = "Estimate a 2-D Gaussian kernel density from x/y samples on a regular grid"
)]
pub struct Cli {
    /// Input samples: CSV with `x` and `y` columns, or a JSON dataset (`.json`).
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output file: JSON dataset, or long-form CSV when the name ends in `.csv`.
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Grid step in sample units (e.g. meters) [env: KDE_GRID_SIZE, default: 9500].
    #[arg(long, value_name = "STEP")]
    pub grid_size: Option<f64>,

    /// Worker threads for evaluation; 0 uses all cores [env: KDE_THREADS].
    #[arg(long)]
    pub threads: Option<usize>,

    /// Refuse grids with more cells than this [env: KDE_MAX_CELLS].
    #[arg(long)]
    pub max_cells: Option<usize>,

    /// Append-only run log [env: KDE_LOG_FILE, default: output.log].
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace [env: KDE_LOG].
    #[arg(long)]
    pub log_level: Option<tracing::Level>,

    /// Cancel the run after this many seconds [env: KDE_TIMEOUT].
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<f64>,
}

/// Parse `argv`.
///
/// Returns `Ok(None)` after printing `--help` / `--version`; any other parse
/// failure becomes a usage error instead of exiting the process.
pub fn parse<I, T>(argv: I) -> Result<Option<Cli>, AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(argv) {
        Ok(cli) => Ok(Some(cli)),
        Err(e) if matches!(e.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) => {
            print!("{e}");
            Ok(None)
        }
        Err(e) => Err(AppError::usage(format!(
            "{}\nUsage: kde <INPUT> <OUTPUT> [--grid-size STEP]",
            e.to_string().trim_end()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn two_positionals_parse() {
        let cli = parse(["kde", "samples.csv", "density.json"]).unwrap().unwrap();
        assert_eq!(cli.input, PathBuf::from("samples.csv"));
        assert_eq!(cli.output, PathBuf::from("density.json"));
        assert!(cli.grid_size.is_none());
    }

    #[test]
    fn missing_output_is_a_usage_error() {
        let err = parse(["kde", "samples.csv"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.message().contains("Usage"));
    }

    #[test]
    fn log_level_parses() {
        let cli = parse(["kde", "a", "b", "--log-level", "warn"]).unwrap().unwrap();
        assert_eq!(cli.log_level, Some(tracing::Level::WARN));
    }

    #[test]
    fn timeout_parses_fractional_seconds() {
        let cli = parse(["kde", "a", "b", "--timeout", "2.5"]).unwrap().unwrap();
        assert_eq!(cli.timeout, Some(2.5));
    }
}
