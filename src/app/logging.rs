//! Run log setup.
//!
//! Events go to an append-only file, one timestamped, level-tagged line each.
//! Console output is left to the caller.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use crate::error::AppError;

/// Install the global subscriber writing to `path` at `level` and above.
pub fn init(path: &Path, level: tracing::Level) -> Result<(), AppError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| AppError::config(format!("Failed to open log file '{}': {e}", path.display())))?;

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| AppError::config(format!("Failed to initialise logging: {e}")))
}
