//! Input/output helpers.
//!
//! - plate CSV ingest and sample-setup side files (`ingest`)
//! - growth-record TSV export (`export`)
//! - fitted-curve JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod ingest;

pub use curve::*;
pub use export::*;
pub use ingest::*;
