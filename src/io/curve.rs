//! Read/write fitted-curve JSON files.
//!
//! A curve file holds the settings of the run plus one sampled curve (with
//! phase-boundary markers) per fitted sample. The schema is `domain::CurveFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::data::Dataset;
use crate::domain::{AnalysisSettings, CurveFile, FittedCurve, RecordSet};
use crate::error::AppError;
use crate::fit::{CURVE_POINTS, fitted_curve};

/// Curves for every fitted record, in dataset order.
pub fn collect_curves(dataset: &Dataset, records: &RecordSet) -> Vec<FittedCurve> {
    records
        .iter()
        .filter_map(|(location, record)| {
            let sample = dataset.sample(location)?;
            fitted_curve(sample, record, dataset.times(), CURVE_POINTS)
        })
        .collect()
}

pub fn write_curve_json(path: &Path, settings: &AnalysisSettings, curves: Vec<FittedCurve>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create curve JSON '{}': {e}", path.display())))?;

    let curve_file = CurveFile {
        tool: env!("CARGO_PKG_NAME").to_string(),
        generated_at: Utc::now(),
        settings: settings.clone(),
        curves,
    };

    serde_json::to_writer_pretty(file, &curve_file)
        .map_err(|e| AppError::internal(format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid curve JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FittingMode, GrowthRecord};

    #[test]
    fn curves_survive_a_file_round_trip() {
        let ds = Dataset::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![
                ("blank".to_string(), vec![Some(0.0); 4]),
                ("wt_1".to_string(), vec![Some(0.1), Some(0.2), Some(0.4), Some(0.8)]),
            ],
        )
        .unwrap();
        let mut records = ds.empty_records();
        records.store_fit(
            "2",
            GrowthRecord {
                fitting_mode: Some(FittingMode::Manual),
                t0: Some(0.0),
                t1: Some(3.0),
                mumax: Some(std::f64::consts::LN_2),
                n0: Some(0.1),
                ..GrowthRecord::default()
            },
        );

        let curves = collect_curves(&ds, &records);
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].sample_name, "wt_1");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curves.json");
        write_curve_json(&path, &AnalysisSettings::default(), curves.clone()).unwrap();
        let back = read_curve_json(&path).unwrap();
        assert_eq!(back.curves.len(), 1);
        assert_eq!(back.curves[0].location, "2");
        let end = back.curves[0].phase_end.unwrap();
        assert!((end.y - 0.8).abs() < 1e-9);
    }
}
