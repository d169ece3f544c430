//! Batch auto-fit over a whole dataset.
//!
//! `run_batch` is the synchronous core: it walks the samples in order, isolates
//! per-sample failures and reports progress through a callback. `BatchRunner`
//! runs it on a background thread and owns the shared record store.
//!
//! Concurrency rules:
//!
//! - at most one batch run executes at a time; starting a run cancels its
//!   predecessor and the new worker joins it before fitting, so `start` returns
//!   immediately
//! - cancellation is polled between samples, never mid-fit
//! - progress is fire-and-forget over a bounded channel (`try_send`, dropped when
//!   the observer is slow); the final report always arrives on its own channel
//! - a finished run that is still the latest generation writes back only the
//!   locations it fitted, one record at a time, keeping the live exclusion flag.
//!   A cancelled run writes nothing. Manual fits replace single records and
//!   whichever write lands last wins.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver};
use tracing::{debug, info, warn};

use crate::data::Dataset;
use crate::domain::{AnalysisSettings, GrowthRecord, RecordSet};
use crate::error::FitError;
use crate::fit::{Selection, fit_manual, fit_sample};

/// Capacity of the progress channel; older updates are dropped beyond this.
pub const PROGRESS_CAPACITY: usize = 64;

/// Cooperative cancellation flag shared between a caller and a worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// "Sample `current` of `total` done."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub generation: u64,
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    Completed,
    Cancelled,
    /// A fatal invariant violation stopped the run; earlier results are kept.
    Aborted(FitError),
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub status: BatchStatus,
    /// Every record, including samples the run did not touch. A committed
    /// background run reports the store as it stands right after its commit.
    pub records: RecordSet,
    /// Locations this run fitted, in dataset order.
    pub updated: Vec<String>,
    pub fitted: usize,
    /// Samples that could not be fitted, with the reason.
    pub skipped: Vec<(String, FitError)>,
}

/// Final message of one background run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub generation: u64,
    pub outcome: BatchOutcome,
}

/// Fit every non-skipped sample with `settings.method`.
///
/// Records of samples that fail keep their previous contents; successful fits
/// keep the sample's exclusion flag.
pub fn run_batch<P>(
    dataset: &Dataset,
    records: RecordSet,
    settings: &AnalysisSettings,
    progress: P,
    cancel: &CancelToken,
) -> BatchOutcome
where
    P: FnMut(usize, usize),
{
    debug!(method = ?settings.method, samples = dataset.len(), "batch fit started");
    run_batch_with(dataset, records, progress, cancel, |location| {
        fit_sample(dataset, location, settings)
    })
}

fn run_batch_with<P, F>(
    dataset: &Dataset,
    mut records: RecordSet,
    mut progress: P,
    cancel: &CancelToken,
    mut fit: F,
) -> BatchOutcome
where
    P: FnMut(usize, usize),
    F: FnMut(&str) -> Result<GrowthRecord, FitError>,
{
    let total = dataset.len();
    let mut updated = Vec::new();
    let mut skipped = Vec::new();

    for (i, sample) in dataset.samples().iter().enumerate() {
        if cancel.is_cancelled() {
            info!(done = i, total, "batch fit cancelled");
            return BatchOutcome {
                status: BatchStatus::Cancelled,
                records,
                fitted: updated.len(),
                updated,
                skipped,
            };
        }

        if !sample.is_skipped() {
            match fit(&sample.location) {
                Ok(rec) => {
                    if records.store_fit(&sample.location, rec) {
                        updated.push(sample.location.clone());
                    }
                }
                Err(err) if err.is_fatal() => {
                    warn!(location = %sample.location, error = %err, "batch fit aborted");
                    return BatchOutcome {
                        status: BatchStatus::Aborted(err),
                        records,
                        fitted: updated.len(),
                        updated,
                        skipped,
                    };
                }
                Err(err) => {
                    debug!(location = %sample.location, name = %sample.name, error = %err, "sample skipped");
                    skipped.push((sample.location.clone(), err));
                }
            }
        }
        progress(i + 1, total);
    }

    info!(fitted = updated.len(), skipped = skipped.len(), total, "batch fit finished");
    BatchOutcome {
        status: BatchStatus::Completed,
        records,
        fitted: updated.len(),
        updated,
        skipped,
    }
}

/// Write the records `outcome` fitted into `store`, one location at a time.
///
/// Live exclusion flags and locations the run did not fit are left alone. A
/// cancelled run writes nothing. Returns the number of records written.
fn commit(store: &mut RecordSet, outcome: &BatchOutcome) -> usize {
    if outcome.status == BatchStatus::Cancelled {
        return 0;
    }
    outcome
        .updated
        .iter()
        .filter(|location| {
            outcome
                .records
                .get(location)
                .is_some_and(|rec| store.store_fit(location, rec.clone()))
        })
        .count()
}

/// Receiving side of one background run.
#[derive(Debug)]
pub struct BatchSubscription {
    pub generation: u64,
    pub progress: Receiver<Progress>,
    pub report: Receiver<BatchReport>,
}

struct ActiveRun {
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

/// Owns the record store and runs batch fits in the background.
pub struct BatchRunner {
    store: Arc<Mutex<RecordSet>>,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveRun>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BatchRunner {
    pub fn new(records: RecordSet) -> Self {
        Self {
            store: Arc::new(Mutex::new(records)),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
        }
    }

    /// Snapshot of the current records.
    pub fn records(&self) -> RecordSet {
        lock(&self.store).clone()
    }

    pub fn set_excluded(&self, location: &str, excluded: bool) -> bool {
        lock(&self.store).set_excluded(location, excluded)
    }

    /// Start a batch fit, superseding any run still in progress.
    pub fn start(&self, dataset: Arc<Dataset>, settings: AnalysisSettings) -> BatchSubscription {
        let mut active = lock(&self.active);
        let previous = active.take();
        if let Some(prev) = &previous {
            prev.cancel.cancel();
            info!("previous batch fit superseded");
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelToken::new();
        let (progress_tx, progress_rx) = channel::bounded(PROGRESS_CAPACITY);
        let (report_tx, report_rx) = channel::bounded(1);

        let store = Arc::clone(&self.store);
        let latest = Arc::clone(&self.generation);
        let worker_cancel = cancel.clone();
        let handle = thread::spawn(move || {
            if let Some(prev) = previous {
                if prev.handle.join().is_err() {
                    warn!("previous batch worker panicked");
                }
            }
            let snapshot = lock(&store).clone();
            let mut outcome = run_batch(
                &dataset,
                snapshot,
                &settings,
                |current, total| {
                    let _ = progress_tx.try_send(Progress {
                        generation,
                        current,
                        total,
                    });
                },
                &worker_cancel,
            );

            {
                let mut live = lock(&store);
                if latest.load(Ordering::SeqCst) == generation {
                    let written = commit(&mut live, &outcome);
                    debug!(generation, written, "batch results committed");
                    outcome.records = live.clone();
                }
            }
            let _ = report_tx.send(BatchReport { generation, outcome });
        });

        *active = Some(ActiveRun { cancel, handle });
        BatchSubscription {
            generation,
            progress: progress_rx,
            report: report_rx,
        }
    }

    /// Request cancellation of the running batch, if any.
    pub fn cancel(&self) {
        if let Some(run) = lock(&self.active).as_ref() {
            run.cancel.cancel();
        }
    }

    /// Fit one sample from a user selection and store it (last writer wins).
    pub fn manual_fit(&self, dataset: &Dataset, location: &str, selection: &Selection) -> Result<GrowthRecord, FitError> {
        let fit = fit_manual(dataset, location, selection)?;
        let mut store = lock(&self.store);
        store.store_fit(location, fit);
        store
            .get(location)
            .cloned()
            .ok_or_else(|| FitError::InvalidSelection(format!("unknown sample '{location}'")))
    }
}

impl Drop for BatchRunner {
    fn drop(&mut self) {
        if let Some(run) = lock(&self.active).take() {
            run.cancel.cancel();
            let _ = run.handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationConfig, simulate_plate};
    use crate::domain::{AutoFitMethod, FittingMode};

    fn small_plate() -> Dataset {
        let plate = simulate_plate(&SimulationConfig {
            samples: 6,
            noise: 0.0005,
            ..SimulationConfig::default()
        })
        .unwrap();
        Dataset::new(plate.times, plate.rows).unwrap()
    }

    #[test]
    fn cancelled_before_start_touches_nothing() {
        let ds = small_plate();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut calls = 0;
        let outcome = run_batch(&ds, ds.empty_records(), &AnalysisSettings::default(), |_, _| calls += 1, &cancel);
        assert_eq!(outcome.status, BatchStatus::Cancelled);
        assert_eq!(outcome.fitted, 0);
        assert_eq!(calls, 0);
        assert_eq!(outcome.records.fitted_count(), 0);
    }

    #[test]
    fn progress_reports_every_sample() {
        let ds = small_plate();
        let mut seen = Vec::new();
        let settings = AnalysisSettings {
            method: AutoFitMethod::EasyLinear,
            ..AnalysisSettings::default()
        };
        let outcome = run_batch(
            &ds,
            ds.empty_records(),
            &settings,
            |c, t| seen.push((c, t)),
            &CancelToken::new(),
        );
        assert_eq!(outcome.status, BatchStatus::Completed);
        assert_eq!(seen, (1..=6).map(|i| (i, 6)).collect::<Vec<_>>());
    }

    fn fitted(mumax: f64) -> GrowthRecord {
        GrowthRecord {
            fitting_mode: Some(FittingMode::EasyLinear),
            mumax: Some(mumax),
            ..GrowthRecord::default()
        }
    }

    #[test]
    fn cancel_mid_run_stops_at_a_sample_boundary() {
        let ds = small_plate();
        let cancel = CancelToken::new();
        let mut calls = 0;
        let outcome = run_batch_with(
            &ds,
            ds.empty_records(),
            |current, _| {
                calls += 1;
                if current == 2 {
                    cancel.cancel();
                }
            },
            &cancel,
            |_| Ok(fitted(0.4)),
        );
        assert_eq!(outcome.status, BatchStatus::Cancelled);
        assert_eq!(calls, 2);
        assert_eq!(outcome.fitted, 2);
        assert_eq!(outcome.updated, ds.samples()[..2].iter().map(|s| s.location.clone()).collect::<Vec<_>>());

        let mut store = ds.empty_records();
        assert_eq!(commit(&mut store, &outcome), 0);
        assert_eq!(store.fitted_count(), 0);
    }

    #[test]
    fn fatal_error_aborts_and_keeps_earlier_fits() {
        let ds = small_plate();
        let mut attempts = 0;
        let mut calls = 0;
        let outcome = run_batch_with(
            &ds,
            ds.empty_records(),
            |_, _| calls += 1,
            &CancelToken::new(),
            |_| {
                attempts += 1;
                if attempts == 3 {
                    Err(FitError::LengthMismatch(10, 9))
                } else {
                    Ok(fitted(0.4))
                }
            },
        );
        assert_eq!(outcome.status, BatchStatus::Aborted(FitError::LengthMismatch(10, 9)));
        assert_eq!(calls, 2);
        assert_eq!(outcome.fitted, 2);
        assert_eq!(outcome.records.fitted_count(), 2);

        // Partial results of an aborted run are committed.
        let mut store = ds.empty_records();
        assert_eq!(commit(&mut store, &outcome), 2);
        assert_eq!(store.fitted_count(), 2);
        assert!(store.get(&ds.samples()[2].location).is_some_and(|r| !r.is_fitted()));
    }

    #[test]
    fn commit_keeps_live_flags_and_untouched_locations() {
        let ds = small_plate();
        let a = ds.samples()[3].location.clone();
        let b = ds.samples()[4].location.clone();

        let mut records = ds.empty_records();
        records.store_fit(&a, fitted(0.5));
        records.store_fit(&b, fitted(0.6));
        let outcome = BatchOutcome {
            status: BatchStatus::Completed,
            records,
            updated: vec![a.clone()],
            fitted: 1,
            skipped: vec![(b.clone(), FitError::NonPositive)],
        };

        // Changes made while the run was in flight.
        let mut store = ds.empty_records();
        store.set_excluded(&a, true);
        let manual = GrowthRecord {
            fitting_mode: Some(FittingMode::Manual),
            mumax: Some(0.9),
            ..GrowthRecord::default()
        };
        store.store_fit(&b, manual.clone());

        assert_eq!(commit(&mut store, &outcome), 1);
        let a_rec = store.get(&a).unwrap();
        assert!(a_rec.excluded_flag);
        assert_eq!(a_rec.mumax, Some(0.5));
        assert_eq!(store.get(&b), Some(&manual));
    }

    #[test]
    fn exclusion_set_during_a_run_survives_the_commit() {
        let ds = Arc::new(small_plate());
        let runner = BatchRunner::new(ds.empty_records());
        let location = ds.samples()[4].location.clone();
        let settings = AnalysisSettings {
            method: AutoFitMethod::Richards,
            ..AnalysisSettings::default()
        };
        let sub = runner.start(Arc::clone(&ds), settings);
        assert!(runner.set_excluded(&location, true));

        let report = sub.report.recv().unwrap();
        assert_eq!(report.outcome.status, BatchStatus::Completed);
        assert!(runner.records().get(&location).unwrap().excluded_flag);
        assert!(report.outcome.records.get(&location).unwrap().excluded_flag);
    }

    #[test]
    fn runner_commits_latest_generation() {
        let ds = Arc::new(small_plate());
        let runner = BatchRunner::new(ds.empty_records());
        let settings = AnalysisSettings {
            method: AutoFitMethod::EasyLinear,
            ..AnalysisSettings::default()
        };
        let first = runner.start(Arc::clone(&ds), settings.clone());
        let second = runner.start(Arc::clone(&ds), settings);
        assert_eq!(second.generation, first.generation + 1);

        let report = second.report.recv().unwrap();
        assert_eq!(report.outcome.status, BatchStatus::Completed);
        // The second worker joins the first before fitting, so its report is already queued.
        assert!(first.report.try_recv().is_ok());
        assert_eq!(runner.records(), report.outcome.records);
    }
}
