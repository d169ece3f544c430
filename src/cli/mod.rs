//! Command-line parsing for the growth-curve fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code. Every analysis flag is optional so that values from a settings
//! file are only overridden when the user actually passes a flag.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::AutoFitMethod;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "growthfit", version, about = "Growth-curve parameter extraction for plate-reader data")]
pub struct Cli {
    /// Log at debug level (RUST_LOG takes precedence when set).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// TOML settings file; command-line flags override its values.
    #[arg(long, global = true, value_name = "TOML")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Auto-fit every sample, print the records and replicate summaries, optionally export.
    Fit(FitArgs),
    /// Fit one sample over a selected exponential phase.
    Manual(ManualArgs),
    /// Write a synthetic plate in the input format.
    Simulate(SimulateArgs),
}

/// Input data and sample setup shared by `fit` and `manual`.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Semicolon-delimited measurements: first column sample name, remaining headers timestamps.
    #[arg(value_name = "CSV")]
    pub input: PathBuf,

    /// Blank references (names or locations) applied to every sample.
    #[arg(long = "blank", value_delimiter = ',')]
    pub blanks: Vec<String>,

    /// Per-sample blank overrides, one `location;ref1,ref2` line each.
    #[arg(long, value_name = "FILE")]
    pub blank_map: Option<PathBuf>,

    /// Renames, one `location;new name` line each.
    #[arg(long, value_name = "FILE")]
    pub names: Option<PathBuf>,

    /// Smooth raw data with a centered moving average before blanking.
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    pub smooth: Option<usize>,
}

/// Export targets shared by `fit` and `manual`.
#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    /// Write growth records as a tab-separated table.
    #[arg(long, value_name = "TSV")]
    pub export: Option<PathBuf>,

    /// Write fitted curves (with phase markers) as JSON.
    #[arg(long = "export-curves", value_name = "JSON")]
    pub export_curves: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub output: ExportArgs,

    /// Auto-fit method.
    #[arg(short, long, value_enum)]
    pub method: Option<AutoFitMethod>,

    /// Manual-like: moving-average window size.
    #[arg(long)]
    pub ws: Option<usize>,

    /// Manual-like: fraction of the steepest slope that still counts as exponential.
    #[arg(long)]
    pub slope_range: Option<f64>,

    /// Manual-like: weight of R² against explained log range.
    #[arg(long)]
    pub weight: Option<f64>,

    /// Manual-like: shortest window considered.
    #[arg(long)]
    pub min_window: Option<usize>,

    /// Easy-Linear: window width in points.
    #[arg(long)]
    pub window: Option<usize>,

    /// Skip samples that lose more than this fraction of points to log filtering.
    #[arg(long)]
    pub max_invalid: Option<f64>,

    /// Locations excluded from replicate-group statistics.
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ManualArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub output: ExportArgs,

    /// Sample to fit (name or location).
    #[arg(short, long)]
    pub sample: String,

    /// First time-axis index of the phase.
    #[arg(long, requires = "end", conflicts_with_all = ["t_min", "t_max", "y_min", "y_max"])]
    pub start: Option<usize>,

    /// Last time-axis index of the phase (inclusive).
    #[arg(long, requires = "start")]
    pub end: Option<usize>,

    /// Selection rectangle: earliest time.
    #[arg(long, requires = "t_max")]
    pub t_min: Option<f64>,

    /// Selection rectangle: latest time.
    #[arg(long, requires = "t_min")]
    pub t_max: Option<f64>,

    /// Selection rectangle: smallest blanked value.
    #[arg(long, allow_negative_numbers = true)]
    pub y_min: Option<f64>,

    /// Selection rectangle: largest blanked value.
    #[arg(long)]
    pub y_max: Option<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output CSV in the input format.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    /// Write the generating parameters as JSON.
    #[arg(long, value_name = "JSON")]
    pub truth: Option<PathBuf>,

    /// Number of wells (12, 24, 96 and 384 get plate well ids).
    #[arg(short = 'n', long, default_value_t = 96)]
    pub samples: usize,

    /// Leading blank wells.
    #[arg(long, default_value_t = 3)]
    pub blanks: usize,

    /// Wells per strain.
    #[arg(long, default_value_t = 3)]
    pub replicates: usize,

    /// Experiment length (hours).
    #[arg(long, default_value_t = 24.0)]
    pub duration: f64,

    /// Time between reads (hours).
    #[arg(long, default_value_t = 0.25)]
    pub interval: f64,

    /// Std dev of Gaussian measurement noise.
    #[arg(long, default_value_t = 0.002)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}
