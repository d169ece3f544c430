//! Shared fit workflow used by the `fit` and `manual` commands.
//!
//! load CSV -> names -> blanks -> optional smoothing -> batch or manual fit
//!
//! The command handlers in `app` only map arguments in and print results out.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::app::batch::{BatchOutcome, BatchRunner, BatchStatus};
use crate::data::Dataset;
use crate::domain::{AnalysisSettings, GrowthRecord, RecordSet};
use crate::error::{AppError, DatasetError, EXIT_EMPTY, FitError};
use crate::fit::Selection;
use crate::io::{load_dataset, read_blank_map, read_name_map};
use crate::report::{GroupSummary, group_summaries};

/// Where the data comes from and how samples are set up.
#[derive(Debug, Clone, Default)]
pub struct DatasetSetup {
    pub input: PathBuf,
    pub names: Option<PathBuf>,
    /// Blank list for every sample; `None` keeps the built-in default.
    pub default_blanks: Option<Vec<String>>,
    pub blank_map: Option<PathBuf>,
    /// Samples (names or locations) excluded from group statistics.
    pub excluded: Vec<String>,
}

/// Load the dataset and apply names, blanks and smoothing.
///
/// Names are applied first so blank references may use the new names.
pub fn prepare_dataset(setup: &DatasetSetup, smoothing_window: Option<usize>) -> Result<Dataset, AppError> {
    let mut dataset = load_dataset(&setup.input)?;

    if let Some(path) = &setup.names {
        for (location, name) in read_name_map(path)? {
            dataset.rename(&location, &name)?;
        }
    }
    if let Some(refs) = &setup.default_blanks {
        dataset.set_default_blanks(refs)?;
    }
    if let Some(path) = &setup.blank_map {
        for (location, refs) in read_blank_map(path)? {
            dataset.set_blanks(&location, &refs)?;
        }
    }
    if let Some(window) = smoothing_window {
        dataset = dataset.smoothed(window)?;
    }

    debug!(
        samples = dataset.len(),
        skipped = dataset.samples().iter().filter(|s| s.is_skipped()).count(),
        smoothing = ?smoothing_window,
        "dataset ready"
    );
    Ok(dataset)
}

fn resolve_location(dataset: &Dataset, reference: &str) -> Result<String, AppError> {
    dataset
        .find(reference)
        .map(|s| s.location.clone())
        .ok_or_else(|| DatasetError::UnknownSample(reference.trim().to_string()).into())
}

/// All outputs of a single `fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub dataset: Arc<Dataset>,
    pub outcome: BatchOutcome,
    /// Records as committed to the store.
    pub records: RecordSet,
    pub groups: Vec<GroupSummary>,
}

/// Run the batch auto-fit on a background worker and wait for its report.
pub fn run_fit(setup: &DatasetSetup, settings: &AnalysisSettings) -> Result<RunOutput, AppError> {
    settings.validate()?;
    let dataset = Arc::new(prepare_dataset(setup, settings.smoothing_window)?);
    if dataset.samples().iter().all(|s| s.is_skipped()) {
        return Err(AppError::new(EXIT_EMPTY, "Every sample is marked as skipped; nothing to fit."));
    }

    let runner = BatchRunner::new(dataset.empty_records());
    for reference in &setup.excluded {
        let location = resolve_location(&dataset, reference)?;
        runner.set_excluded(&location, true);
    }

    let subscription = runner.start(Arc::clone(&dataset), settings.clone());
    // The progress sender lives until the worker returns.
    for p in subscription.progress.iter() {
        debug!(current = p.current, total = p.total, "batch progress");
    }
    let report = subscription
        .report
        .recv()
        .map_err(|_| AppError::internal("Batch worker exited without a report."))?;

    if report.outcome.status == BatchStatus::Cancelled {
        return Err(AppError::internal("Batch fit was cancelled."));
    }
    info!(generation = report.generation, fitted = report.outcome.fitted, "batch report received");

    let records = runner.records();
    let groups = group_summaries(&dataset, &records);
    Ok(RunOutput {
        dataset,
        outcome: report.outcome,
        records,
        groups,
    })
}

/// Result of a single manual fit.
#[derive(Debug, Clone)]
pub struct ManualOutput {
    pub dataset: Arc<Dataset>,
    pub location: String,
    pub record: GrowthRecord,
    pub records: RecordSet,
}

pub fn run_manual(
    setup: &DatasetSetup,
    smoothing_window: Option<usize>,
    sample: &str,
    selection: &Selection,
) -> Result<ManualOutput, AppError> {
    let dataset = Arc::new(prepare_dataset(setup, smoothing_window)?);
    let location = resolve_location(&dataset, sample)?;
    if dataset.sample(&location).is_some_and(|s| s.is_skipped()) {
        return Err(AppError::input(format!("Sample '{location}' is marked as skipped.")));
    }

    let runner = BatchRunner::new(dataset.empty_records());
    let record = runner
        .manual_fit(&dataset, &location, selection)
        .map_err(|err| match err {
            FitError::InvalidSelection(_) => AppError::input(format!("Manual fit failed: {err}")),
            other => AppError::from(other),
        })?;

    Ok(ManualOutput {
        dataset,
        location,
        record,
        records: runner.records(),
    })
}
