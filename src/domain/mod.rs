//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - fitting method/mode enums (`AutoFitMethod`, `FittingMode`, `ModelKind`)
//! - the per-sample growth-parameter record (`GrowthRecord`) and the record set
//! - analysis settings and fitted-curve outputs

pub mod records;
pub mod types;

pub use records::*;
pub use types::*;
