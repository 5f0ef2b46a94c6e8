//! Input/output adapters.
//!
//! - sample ingest from CSV or JSON datasets (`ingest`)
//! - JSON dataset schema (`dataset`)
//! - atomic density export (`export`)

pub mod dataset;
pub mod export;
pub mod ingest;

pub use dataset::*;
pub use export::*;
pub use ingest::*;
