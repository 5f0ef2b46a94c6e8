//! Mathematical utilities: bandwidth selection and the Gaussian kernel.

pub mod bandwidth;
pub mod kernel;

pub use bandwidth::*;
pub use kernel::*;
