//! Growth-curve fitting.
//!
//! Responsibilities:
//!
//! - detect the exponential phase (manual-like search, Easy-Linear scan)
//! - fit exponential and sigmoid models
//! - derive growth parameters with propagated uncertainty
//! - dispatch auto-fit methods and rebuild fitted curves

pub mod curve;
pub mod derive;
pub mod easy_linear;
pub mod exponential;
pub mod manual_like;
pub mod method;
pub mod sigmoid;

pub use curve::*;
pub use derive::*;
pub use easy_linear::*;
pub use exponential::*;
pub use manual_like::*;
pub use method::*;
pub use sigmoid::*;
