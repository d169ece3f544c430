//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and the optional settings file
//! - installs the log subscriber
//! - runs batch or manual fits
//! - prints reports and writes optional exports

use std::fs::File;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, DataArgs, ExportArgs, FitArgs, ManualArgs, SimulateArgs};
use crate::config::Config;
use crate::data::Dataset;
use crate::domain::{AnalysisSettings, RecordSet};
use crate::error::AppError;
use crate::fit::Selection;

pub mod batch;
pub mod pipeline;

pub use batch::*;

/// Entry point for the `growthfit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Fit(args) => handle_fit(args, &config),
        Command::Manual(args) => handle_manual(args, &config),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_fit(args: FitArgs, config: &Config) -> Result<(), AppError> {
    let settings = settings_from_args(&args, config);
    let setup = dataset_setup(&args.data, config, args.exclude.clone());
    let run = pipeline::run_fit(&setup, &settings)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.dataset, &settings, &run.outcome)
    );
    println!("{}", crate::report::format_records(&run.dataset, &run.records));
    println!("{}", crate::report::format_groups(&run.groups));

    write_exports(&args.output, &run.dataset, &run.records, &settings)?;

    if let BatchStatus::Aborted(err) = &run.outcome.status {
        return Err(AppError::internal(format!(
            "Batch fit aborted after {} samples: {err}",
            run.outcome.fitted
        )));
    }
    Ok(())
}

fn handle_manual(args: ManualArgs, config: &Config) -> Result<(), AppError> {
    let selection = selection_from_args(&args)?;
    let settings = AnalysisSettings {
        smoothing_window: args.data.smooth.or(config.analysis.smoothing_window),
        ..config.analysis.clone()
    };
    settings.validate()?;

    let setup = dataset_setup(&args.data, config, Vec::new());
    let out = pipeline::run_manual(&setup, settings.smoothing_window, &args.sample, &selection)?;

    let name = out
        .dataset
        .sample(&out.location)
        .map(|s| s.name.as_str())
        .unwrap_or_default();
    println!(
        "{}",
        crate::report::format_record_detail(&out.location, name, &out.record)
    );

    write_exports(&args.output, &out.dataset, &out.records, &settings)
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let sim = crate::data::SimulationConfig {
        samples: args.samples,
        blanks: args.blanks,
        replicates: args.replicates,
        duration: args.duration,
        interval: args.interval,
        noise: args.noise,
        seed: args.seed,
        ..crate::data::SimulationConfig::default()
    };
    let plate = crate::data::simulate_plate(&sim)?;
    crate::io::write_plate(&args.output, &plate.times, &plate.rows)?;
    info!(path = %args.output.display(), wells = plate.rows.len(), "wrote synthetic plate");

    if let Some(path) = &args.truth {
        let file = File::create(path)
            .map_err(|e| AppError::input(format!("Failed to create truth JSON '{}': {e}", path.display())))?;
        serde_json::to_writer_pretty(file, &plate.truth)
            .map_err(|e| AppError::internal(format!("Failed to write truth JSON: {e}")))?;
    }

    println!(
        "Wrote {} wells x {} timestamps to {}",
        plate.rows.len(),
        plate.times.len(),
        args.output.display()
    );
    Ok(())
}

fn write_exports(
    output: &ExportArgs,
    dataset: &Dataset,
    records: &RecordSet,
    settings: &AnalysisSettings,
) -> Result<(), AppError> {
    if let Some(path) = &output.export {
        crate::io::write_records_tsv(path, dataset, records)?;
    }
    if let Some(path) = &output.export_curves {
        let curves = crate::io::collect_curves(dataset, records);
        crate::io::write_curve_json(path, settings, curves)?;
    }
    Ok(())
}

fn dataset_setup(data: &DataArgs, config: &Config, excluded: Vec<String>) -> pipeline::DatasetSetup {
    let default_blanks = if data.blanks.is_empty() {
        config.default_blanks.clone()
    } else {
        Some(data.blanks.clone())
    };
    pipeline::DatasetSetup {
        input: data.input.clone(),
        names: data.names.clone(),
        default_blanks,
        blank_map: data.blank_map.clone(),
        excluded,
    }
}

/// Settings file values, overridden by any flag the user passed.
pub fn settings_from_args(args: &FitArgs, config: &Config) -> AnalysisSettings {
    let base = &config.analysis;
    let ml = &base.manual_like;
    AnalysisSettings {
        method: args.method.unwrap_or(base.method),
        manual_like: crate::domain::ManualLikeParams {
            ws: args.ws.unwrap_or(ml.ws),
            slope_range: args.slope_range.unwrap_or(ml.slope_range),
            weight: args.weight.unwrap_or(ml.weight),
            min_window_length: args.min_window.unwrap_or(ml.min_window_length),
        },
        easy_linear_window: args.window.unwrap_or(base.easy_linear_window),
        smoothing_window: args.data.smooth.or(base.smoothing_window),
        max_invalid_fraction: args.max_invalid.unwrap_or(base.max_invalid_fraction),
    }
}

fn selection_from_args(args: &ManualArgs) -> Result<Selection, AppError> {
    match (args.start, args.end, args.t_min, args.t_max) {
        (Some(start), Some(end), _, _) => Ok(Selection::Indices { start, end }),
        (_, _, Some(t_min), Some(t_max)) => Ok(Selection::Rectangle {
            t_min,
            t_max,
            y_min: args.y_min.unwrap_or(f64::NEG_INFINITY),
            y_max: args.y_max.unwrap_or(f64::INFINITY),
        }),
        _ => Err(AppError::input(
            "Manual fit needs --start/--end or a --t-min/--t-max selection.",
        )),
    }
}
