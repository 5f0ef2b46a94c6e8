//! `kde-grid` library crate.
//!
//! The binary (`kde`) is a thin wrapper around this library so that:
//!
//! - the density core is testable without spawning processes
//! - the pipeline can be driven with other sources and sinks
//! - the compute path stays free of logging and file I/O

pub mod app;
pub mod cli;
pub mod config;
pub mod density;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod report;
