//! Mathematical utilities: least squares, Levenberg–Marquardt, uncertainty
//! propagation and summary statistics.

pub mod lm;
pub mod ols;
pub mod stats;
pub mod uncertain;

pub use lm::*;
pub use ols::*;
pub use stats::*;
pub use uncertain::*;
