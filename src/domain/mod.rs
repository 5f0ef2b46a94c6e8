//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the validated input snapshot (`SampleSet`)
//! - the evaluation grid and density values (`Grid`, `DensityGrid`)
//! - run configuration and final output (`RunConfig`, `DensityField`)

pub mod types;

pub use types::*;
