//! Export growth records as a tab-separated table.
//!
//! One row per sample location, in dataset order. Unset values are written as
//! `NaN` so that spreadsheets and numeric readers keep the column types.

use std::path::Path;

use crate::data::Dataset;
use crate::domain::{GrowthRecord, RecordSet};
use crate::error::AppError;

pub const RECORD_COLUMNS: [&str; 27] = [
    "location",
    "sample_name",
    "fitting_mode",
    "t0",
    "t0_std",
    "t0_idx",
    "t1",
    "t1_std",
    "t1_idx",
    "mumax",
    "mumax_std",
    "dt",
    "dt_std",
    "doublings",
    "doublings_log",
    "doublings_log_std",
    "carrying_capacity",
    "carrying_capacity_std",
    "n0",
    "v",
    "v_std",
    "yield",
    "error",
    "error_measure",
    "excluded_flag",
    "smoothing_window",
    "blanks",
];

fn num(v: Option<f64>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "NaN".to_string())
}

fn idx(v: Option<usize>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "NaN".to_string())
}

fn record_row(location: &str, name: &str, blanks: &[String], r: &GrowthRecord) -> Vec<String> {
    vec![
        location.to_string(),
        name.to_string(),
        r.fitting_mode
            .map(|m| m.display_name().to_string())
            .unwrap_or_else(|| "NaN".to_string()),
        num(r.t0),
        num(r.t0_std),
        idx(r.t0_idx),
        num(r.t1),
        num(r.t1_std),
        idx(r.t1_idx),
        num(r.mumax),
        num(r.mumax_std),
        num(r.dt),
        num(r.dt_std),
        num(r.doublings),
        num(r.doublings_log),
        num(r.doublings_log_std),
        num(r.carrying_capacity),
        num(r.carrying_capacity_std),
        num(r.n0),
        num(r.v),
        num(r.v_std),
        num(r.yield_),
        num(r.error),
        r.fitting_mode
            .map(|m| m.error_measure().label().to_string())
            .unwrap_or_else(|| "NaN".to_string()),
        r.excluded_flag.to_string(),
        idx(r.smoothing_window),
        blanks.join(","),
    ]
}

/// Write every record of `records`, labelled with the dataset's sample names.
pub fn write_records_tsv(path: &Path, dataset: &Dataset, records: &RecordSet) -> Result<(), AppError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create export '{}': {e}", path.display())))?;

    writer
        .write_record(RECORD_COLUMNS)
        .map_err(|e| AppError::internal(format!("Failed to write export header: {e}")))?;

    for (location, record) in records.iter() {
        let (name, blanks) = dataset
            .sample(location)
            .map(|s| (s.name.as_str(), s.blanks.as_slice()))
            .unwrap_or((location, &[][..]));
        writer
            .write_record(record_row(location, name, blanks, record))
            .map_err(|e| AppError::internal(format!("Failed to write export row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::internal(format!("Failed to flush export: {e}")))?;
    Ok(())
}
