//! Plate data: the dataset model, blank subtraction and synthetic plates.

pub mod blank;
pub mod dataset;
pub mod synthetic;

pub use blank::{BlankedTrace, blank_trace, mean_trace};
pub use dataset::{Dataset, Sample, plate_locations};
pub use synthetic::{SimulatedPlate, SimulationConfig, TrueParams, simulate_plate};
