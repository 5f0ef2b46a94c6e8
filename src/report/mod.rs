//! Reporting utilities: start banner and run summary.

pub mod format;

pub use format::*;
