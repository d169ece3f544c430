//! In-memory plate dataset: shared time axis, samples, names and blank references.
//!
//! Integrity rules enforced here, before anything reaches the fitting core:
//!
//! - timestamps are finite and strictly increasing
//! - every sample row has one value (or a gap) per timestamp
//! - names are unique among non-skipped samples
//! - blank references point at existing samples that are not skip markers

use std::collections::HashSet;

use crate::data::blank::{BlankedTrace, blank_trace};
use crate::domain::{RecordSet, SKIP_MARKER};
use crate::error::{DatasetError, FitError};
use crate::math::rolling_mean;

/// Number of leading samples used as blanks when nothing else is configured.
pub const DEFAULT_BLANK_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Stable plate location (well id or 1-based index).
    pub location: String,
    /// User-facing name; `SKIP_MARKER` removes the sample from analysis.
    pub name: String,
    pub values: Vec<Option<f64>>,
    /// Locations of the samples whose mean trace is subtracted from this one.
    pub blanks: Vec<String>,
}

impl Sample {
    pub fn is_skipped(&self) -> bool {
        self.name == SKIP_MARKER
    }

    /// Whether the user gave this sample a real name (not its location or the skip marker).
    pub fn is_named(&self) -> bool {
        !self.is_skipped() && self.name != self.location
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    times: Vec<f64>,
    samples: Vec<Sample>,
    smoothing_window: Option<usize>,
}

impl Dataset {
    /// Build a dataset from named rows sharing `times`.
    ///
    /// Locations are assigned from the row count and every sample gets the default
    /// blank set (the first non-skipped samples).
    pub fn new(times: Vec<f64>, rows: Vec<(String, Vec<Option<f64>>)>) -> Result<Self, DatasetError> {
        if rows.is_empty() {
            return Err(DatasetError::Empty);
        }
        if times.iter().any(|t| !t.is_finite()) || times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(DatasetError::InvalidTimestamps);
        }

        let locations = plate_locations(rows.len());
        let mut samples = Vec::with_capacity(rows.len());
        for ((name, values), location) in rows.into_iter().zip(locations) {
            if values.len() != times.len() {
                return Err(DatasetError::RaggedRow {
                    sample: name,
                    expected: times.len(),
                    got: values.len(),
                });
            }
            let values = values
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            samples.push(Sample {
                location,
                name: name.trim().to_string(),
                values,
                blanks: Vec::new(),
            });
        }
        check_unique_names(samples.iter().map(|s| s.name.as_str()))?;

        let default_blanks: Vec<String> = samples
            .iter()
            .filter(|s| !s.is_skipped())
            .take(DEFAULT_BLANK_COUNT)
            .map(|s| s.location.clone())
            .collect();
        for s in &mut samples {
            s.blanks = default_blanks.clone();
        }

        Ok(Self {
            times,
            samples,
            smoothing_window: None,
        })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn smoothing_window(&self) -> Option<usize> {
        self.smoothing_window
    }

    pub fn sample(&self, location: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.location == location)
    }

    /// Look a sample up by location first, then by name.
    pub fn find(&self, reference: &str) -> Option<&Sample> {
        let reference = reference.trim();
        self.sample(reference)
            .or_else(|| self.samples.iter().find(|s| s.name == reference && !s.is_skipped()))
    }

    /// Resolve user-supplied blank references (names or locations) to locations.
    pub fn resolve_blanks<S: AsRef<str>>(&self, refs: &[S]) -> Result<Vec<String>, DatasetError> {
        refs.iter()
            .map(|r| {
                let r = r.as_ref();
                match self.find(r) {
                    Some(s) if !s.is_skipped() => Ok(s.location.clone()),
                    _ => Err(DatasetError::InvalidBlank(r.trim().to_string())),
                }
            })
            .collect()
    }

    /// Set the blanks of one sample. Nothing changes if any reference is invalid.
    pub fn set_blanks<S: AsRef<str>>(&mut self, location: &str, refs: &[S]) -> Result<(), DatasetError> {
        let resolved = self.resolve_blanks(refs)?;
        let sample = self
            .samples
            .iter_mut()
            .find(|s| s.location == location)
            .ok_or_else(|| DatasetError::UnknownSample(location.to_string()))?;
        sample.blanks = resolved;
        Ok(())
    }

    /// Apply one blank list to every sample, replacing per-sample settings.
    pub fn set_default_blanks<S: AsRef<str>>(&mut self, refs: &[S]) -> Result<(), DatasetError> {
        let resolved = self.resolve_blanks(refs)?;
        for s in &mut self.samples {
            s.blanks = resolved.clone();
        }
        Ok(())
    }

    /// Rename a sample, keeping names unique and blank references valid.
    pub fn rename(&mut self, location: &str, new_name: &str) -> Result<(), DatasetError> {
        let new_name = new_name.trim();
        let idx = self
            .samples
            .iter()
            .position(|s| s.location == location)
            .ok_or_else(|| DatasetError::UnknownSample(location.to_string()))?;

        if new_name != SKIP_MARKER
            && self
                .samples
                .iter()
                .enumerate()
                .any(|(i, s)| i != idx && s.name == new_name)
        {
            return Err(DatasetError::DuplicateName(new_name.to_string()));
        }
        if new_name == SKIP_MARKER && self.samples.iter().any(|s| s.blanks.iter().any(|b| b == location)) {
            return Err(DatasetError::InvalidBlank(location.to_string()));
        }

        self.samples[idx].name = new_name.to_string();
        Ok(())
    }

    /// A copy with every sample smoothed by a centered moving average.
    pub fn smoothed(&self, window: usize) -> Result<Self, DatasetError> {
        if window == 0 {
            return Err(DatasetError::InvalidSetting(
                "smoothing window size needs to be an integer > 0".into(),
            ));
        }
        let samples = self
            .samples
            .iter()
            .map(|s| Sample {
                values: rolling_mean(&s.values, window),
                ..s.clone()
            })
            .collect();
        Ok(Self {
            times: self.times.clone(),
            samples,
            smoothing_window: Some(window),
        })
    }

    /// A fresh record set with one unset record per sample.
    pub fn empty_records(&self) -> RecordSet {
        RecordSet::new(self.samples.iter().map(|s| s.location.clone()))
    }

    /// Blank one sample against the mean of its configured blanks.
    pub fn blanked(&self, location: &str) -> Result<BlankedTrace, FitError> {
        let sample = self
            .sample(location)
            .ok_or_else(|| FitError::InvalidSelection(format!("unknown sample '{location}'")))?;
        let blanks: Vec<&[Option<f64>]> = sample
            .blanks
            .iter()
            .filter_map(|b| self.sample(b))
            .map(|b| b.values.as_slice())
            .collect();
        blank_trace(&self.times, &sample.values, &blanks)
    }
}

fn check_unique_names<'a>(names: impl Iterator<Item = &'a str>) -> Result<(), DatasetError> {
    let mut seen = HashSet::new();
    for name in names.filter(|n| *n != SKIP_MARKER) {
        if !seen.insert(name) {
            return Err(DatasetError::DuplicateName(name.to_string()));
        }
    }
    Ok(())
}

/// Plate well ids for standard plate sizes, 1-based indices otherwise.
pub fn plate_locations(n: usize) -> Vec<String> {
    let layout = match n {
        384 => Some((16, 24)),
        96 => Some((8, 12)),
        24 => Some((4, 6)),
        12 => Some((3, 4)),
        _ => None,
    };
    match layout {
        Some((rows, cols)) => (b'A'..b'A' + rows)
            .flat_map(|r| (1..=cols).map(move |c| format!("{}{c}", r as char)))
            .collect(),
        None => (1..=n).map(|i| i.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(names: &[&str]) -> Vec<(String, Vec<Option<f64>>)> {
        names
            .iter()
            .map(|n| (n.to_string(), vec![Some(0.1), Some(0.2), Some(0.4)]))
            .collect()
    }

    #[test]
    fn plate_locations_match_plate_formats() {
        let p96 = plate_locations(96);
        assert_eq!(p96.len(), 96);
        assert_eq!(p96[0], "A1");
        assert_eq!(p96[11], "A12");
        assert_eq!(p96[95], "H12");
        assert_eq!(plate_locations(12)[4], "B1");
        assert_eq!(plate_locations(384)[383], "P24");
        assert_eq!(plate_locations(5), vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn duplicate_names_are_rejected_but_skip_marker_may_repeat() {
        let err = Dataset::new(vec![0.0, 1.0, 2.0], rows(&["a", "b", "a"])).unwrap_err();
        assert_eq!(err, DatasetError::DuplicateName("a".into()));
        assert!(Dataset::new(vec![0.0, 1.0, 2.0], rows(&["-", "b", "-"])).is_ok());
    }

    #[test]
    fn ragged_rows_and_bad_timestamps_are_rejected() {
        let mut r = rows(&["a"]);
        r[0].1.pop();
        assert!(matches!(
            Dataset::new(vec![0.0, 1.0, 2.0], r),
            Err(DatasetError::RaggedRow { .. })
        ));
        assert_eq!(
            Dataset::new(vec![0.0, 2.0, 1.0], rows(&["a"])).unwrap_err(),
            DatasetError::InvalidTimestamps
        );
    }

    #[test]
    fn default_blanks_are_first_non_skipped_samples() {
        let ds = Dataset::new(vec![0.0, 1.0, 2.0], rows(&["-", "b1", "b2", "b3", "s"])).unwrap();
        assert_eq!(ds.samples()[4].blanks, vec!["2", "3", "4"]);
    }

    #[test]
    fn blank_references_resolve_by_name_or_location() {
        let mut ds = Dataset::new(vec![0.0, 1.0, 2.0], rows(&["blank", "-", "wt 1"])).unwrap();
        ds.set_blanks("3", &["blank", "1"]).unwrap();
        assert_eq!(ds.sample("3").unwrap().blanks, vec!["1", "1"]);

        let before = ds.sample("3").unwrap().blanks.clone();
        assert!(ds.set_blanks("3", &["nope"]).is_err());
        assert!(ds.set_blanks("3", &["2"]).is_err());
        assert_eq!(ds.sample("3").unwrap().blanks, before);
    }

    #[test]
    fn rename_validates_uniqueness_and_blank_use() {
        let mut ds = Dataset::new(vec![0.0, 1.0, 2.0], rows(&["blank", "wt 1", "wt 2"])).unwrap();
        assert!(matches!(ds.rename("3", "wt 1"), Err(DatasetError::DuplicateName(_))));
        // "1" is everyone's default blank and cannot become a skip marker.
        assert!(ds.rename("1", SKIP_MARKER).is_err());
        ds.rename("3", "mut 1").unwrap();
        assert_eq!(ds.sample("3").unwrap().name, "mut 1");
    }

    #[test]
    fn smoothing_records_window_and_keeps_shape() {
        let ds = Dataset::new(vec![0.0, 1.0, 2.0], rows(&["a"])).unwrap();
        let sm = ds.smoothed(3).unwrap();
        assert_eq!(sm.smoothing_window(), Some(3));
        assert_eq!(sm.samples()[0].values.len(), 3);
        assert!(ds.smoothed(0).is_err());
    }
}
