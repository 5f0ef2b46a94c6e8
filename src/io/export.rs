//! Persist a density field.
//!
//! Output goes to a temporary file next to the target and is renamed into
//! place only once it has been fully written and synced. If anything fails
//! before that, the temporary file is removed when the guard drops, so a
//! failed run never leaves a complete-looking file at the output path.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::domain::DensityField;
use crate::error::AppError;
use crate::io::dataset::Dataset;
use crate::io::ingest::has_extension;

/// Receiver of the final density field.
pub trait DensitySink {
    /// Write `field`; `created` is recorded as provenance where supported.
    fn write(&mut self, field: &DensityField, created: DateTime<Local>) -> Result<(), AppError>;

    fn describe(&self) -> String;
}

/// On-disk layout of a `FileSink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON dataset with dimensions, variables and attributes.
    Dataset,
    /// Long-form `x,y,density` table, one row per cell.
    Csv,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Self {
        if has_extension(path, "csv") {
            OutputFormat::Csv
        } else {
            OutputFormat::Dataset
        }
    }
}

/// Writes a density field to a file, atomically.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = OutputFormat::from_path(&path);
        Self { path, format }
    }
}

impl DensitySink for FileSink {
    fn write(&mut self, field: &DensityField, created: DateTime<Local>) -> Result<(), AppError> {
        let staged = StagedFile::create(&self.path)?;
        let mut out = BufWriter::new(staged.file()?);

        match self.format {
            OutputFormat::Dataset => write_dataset(&mut out, field, created)?,
            OutputFormat::Csv => write_cells_csv(&mut out, field)?,
        }

        let file = out
            .into_inner()
            .map_err(|e| AppError::output(format!("Failed to flush '{}': {}", self.path.display(), e.error())))?;
        staged.commit(file)
    }

    fn describe(&self) -> String {
        format!("'{}'", self.path.display())
    }
}

/// Provenance string stored in the `history` attribute.
pub fn history_stamp(created: DateTime<Local>) -> String {
    format!("Created on: {}", created.format("%Y-%m-%d %H:%M:%S%.6f"))
}

fn write_dataset<W: Write>(out: &mut W, field: &DensityField, created: DateTime<Local>) -> Result<(), AppError> {
    let dataset = Dataset::from_field(field, history_stamp(created));
    serde_json::to_writer_pretty(&mut *out, &dataset)
        .map_err(|e| AppError::output(format!("Failed to write JSON dataset: {e}")))?;
    writeln!(out).map_err(|e| AppError::output(format!("Failed to write JSON dataset: {e}")))
}

fn write_cells_csv<W: Write>(out: &mut W, field: &DensityField) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(["x", "y", "density"])
        .map_err(|e| AppError::output(format!("Failed to write CSV header: {e}")))?;

    let grid = &field.grid;
    let (nx, ny) = grid.shape();
    for i in 0..nx {
        for j in 0..ny {
            writer
                .write_record([
                    grid.x_at(i, j).to_string(),
                    grid.y_at(i, j).to_string(),
                    field.density.get(i, j).to_string(),
                ])
                .map_err(|e| AppError::output(format!("Failed to write CSV row: {e}")))?;
        }
    }
    writer
        .flush()
        .map_err(|e| AppError::output(format!("Failed to flush CSV: {e}")))
}

/// A temporary sibling of `target` that is removed unless committed.
struct StagedFile {
    target: PathBuf,
    temp: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl StagedFile {
    fn create(target: &Path) -> Result<Self, AppError> {
        let name = target
            .file_name()
            .ok_or_else(|| AppError::output(format!("Output path '{}' has no file name.", target.display())))?;
        let mut temp_name = std::ffi::OsString::from(".");
        temp_name.push(name);
        temp_name.push(format!(".{}.partial", std::process::id()));
        let temp = target.with_file_name(temp_name);

        let file = File::create(&temp)
            .map_err(|e| AppError::output(format!("Failed to create '{}': {e}", temp.display())))?;

        Ok(Self {
            target: target.to_path_buf(),
            temp,
            file: Some(file),
            committed: false,
        })
    }

    fn file(&self) -> Result<File, AppError> {
        self.file
            .as_ref()
            .ok_or_else(|| AppError::output("Staged output file already taken."))?
            .try_clone()
            .map_err(|e| AppError::output(format!("Failed to open '{}': {e}", self.temp.display())))
    }

    fn commit(mut self, written: File) -> Result<(), AppError> {
        written
            .sync_all()
            .map_err(|e| AppError::output(format!("Failed to sync '{}': {e}", self.temp.display())))?;
        drop(written);
        self.file.take();

        fs::rename(&self.temp, &self.target).map_err(|e| {
            AppError::output(format!(
                "Failed to move '{}' to '{}': {e}",
                self.temp.display(),
                self.target.display()
            ))
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}
