//! Sample ingest.
//!
//! Turns an input file into the two coordinate arrays `x` and `y` and then
//! into a validated `SampleSet`.
//!
//! Design goals:
//! - **Strict schema**: both `x` and `y` must exist, checked before any work
//! - **Clear errors**: malformed cells report their line and column
//! - **Separation of concerns**: no density logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use csv::StringRecord;

use crate::domain::SampleSet;
use crate::error::AppError;
use crate::io::dataset::{DIM_X, DIM_Y, Dataset};

/// Something that can hand out named 1-D numeric variables.
pub trait SampleSource {
    /// The variable called `name`, or `None` if the source has no such variable.
    fn variable(&self, name: &str) -> Result<Option<Vec<f64>>, AppError>;

    /// Short human-readable origin, used in error messages.
    fn describe(&self) -> String;
}

/// Read `x` and `y` from `source` and validate them.
///
/// Both variables are looked up before the sample set is built, so a source
/// missing either one fails with an input error and nothing else runs.
pub fn load_samples(source: &dyn SampleSource) -> Result<SampleSet, AppError> {
    let x = source.variable(DIM_X)?;
    let y = source.variable(DIM_Y)?;

    let missing: Vec<&str> = [(DIM_X, x.is_none()), (DIM_Y, y.is_none())]
        .into_iter()
        .filter_map(|(name, absent)| absent.then_some(name))
        .collect();

    match (x, y) {
        (Some(x), Some(y)) => SampleSet::new(&x, &y),
        _ => Err(AppError::input(format!(
            "Input {} is missing required variable(s): {}.",
            source.describe(),
            missing.join(", ")
        ))),
    }
}

/// Open `path` as CSV or, for a `.json` extension, as a JSON dataset.
pub fn open_source(path: &Path) -> Result<Box<dyn SampleSource>, AppError> {
    if has_extension(path, "json") {
        Ok(Box::new(JsonSource::open(path)?))
    } else {
        Ok(Box::new(CsvSource::open(path)?))
    }
}

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// CSV table with a header row; every column is a candidate variable.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    columns: HashMap<String, Vec<f64>>,
}

impl CsvSource {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
        Self::from_reader(path, file)
    }

    pub fn from_reader<R: std::io::Read>(path: &Path, reader: R) -> Result<Self, AppError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
            .clone();
        let names = normalized_headers(&headers);

        // Only columns that can become samples are parsed.
        let wanted: Vec<(usize, String)> = names
            .iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() == DIM_X || name.as_str() == DIM_Y)
            .map(|(idx, name)| (idx, name.clone()))
            .collect();
        for (pos, (_, name)) in wanted.iter().enumerate() {
            if wanted[..pos].iter().any(|(_, seen)| seen == name) {
                return Err(AppError::input(format!(
                    "Duplicate column '{name}' in CSV header."
                )));
            }
        }

        let mut columns: HashMap<String, Vec<f64>> =
            wanted.iter().map(|(_, name)| (name.clone(), Vec::new())).collect();

        for (idx, result) in reader.records().enumerate() {
            // Header is line 1.
            let line = idx + 2;
            let record =
                result.map_err(|e| AppError::input(format!("CSV parse error on line {line}: {e}")))?;
            for (col, name) in &wanted {
                let cell = record.get(*col).unwrap_or("");
                let value = cell.parse::<f64>().map_err(|_| {
                    AppError::input(format!(
                        "Invalid number '{cell}' in column '{name}' on line {line}."
                    ))
                })?;
                if let Some(values) = columns.get_mut(name) {
                    values.push(value);
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns,
        })
    }
}

impl SampleSource for CsvSource {
    fn variable(&self, name: &str) -> Result<Option<Vec<f64>>, AppError> {
        Ok(self.columns.get(name).cloned())
    }

    fn describe(&self) -> String {
        format!("CSV '{}'", self.path.display())
    }
}

fn normalized_headers(headers: &StringRecord) -> Vec<String> {
    headers
        .iter()
        .map(|name| name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect()
}

/// JSON dataset document (see `io::dataset`).
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: PathBuf,
    dataset: Dataset,
}

impl JsonSource {
    pub fn open(path: &Path) -> Result<Self, AppError> {
        let file = File::open(path)
            .map_err(|e| AppError::input(format!("Failed to open JSON '{}': {e}", path.display())))?;
        let dataset: Dataset = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| AppError::input(format!("Failed to parse JSON '{}': {e}", path.display())))?;
        Ok(Self {
            path: path.to_path_buf(),
            dataset,
        })
    }
}

impl SampleSource for JsonSource {
    fn variable(&self, name: &str) -> Result<Option<Vec<f64>>, AppError> {
        let Some(var) = self.dataset.variables.get(name) else {
            return Ok(None);
        };
        if var.dims.len() > 1 {
            return Err(AppError::input(format!(
                "Variable '{name}' in {} must be 1-D, found dims {:?}.",
                self.describe(),
                var.dims
            )));
        }
        Ok(Some(var.data.clone()))
    }

    fn describe(&self) -> String {
        format!("JSON '{}'", self.path.display())
    }
}
