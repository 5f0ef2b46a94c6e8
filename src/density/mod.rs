//! Density estimation core.
//!
//! Responsibilities:
//!
//! - build the regular evaluation grid (`grid`)
//! - evaluate the Gaussian KDE on it, parallel over rows (`estimator`)
//! - rescale the raw grid into `[0, 1]` (`normalize`)
//!
//! Nothing in here logs or touches the file system.

pub mod cancel;
pub mod estimator;
pub mod grid;
pub mod normalize;

pub use cancel::*;
pub use estimator::*;
pub use grid::*;
pub use normalize::scale;
