//! The per-experiment record set: one growth record per sample location.

use serde::Serialize;

use crate::domain::GrowthRecord;

/// Growth records in dataset order, keyed by location.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordSet {
    entries: Vec<(String, GrowthRecord)>,
}

impl RecordSet {
    /// One unset record per location.
    pub fn new<I, S>(locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: locations
                .into_iter()
                .map(|l| (l.into(), GrowthRecord::default()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, location: &str) -> Option<&GrowthRecord> {
        self.entries.iter().find(|(l, _)| l == location).map(|(_, r)| r)
    }

    pub fn get_mut(&mut self, location: &str) -> Option<&mut GrowthRecord> {
        self.entries
            .iter_mut()
            .find(|(l, _)| l == location)
            .map(|(_, r)| r)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GrowthRecord)> {
        self.entries.iter().map(|(l, r)| (l.as_str(), r))
    }

    /// Replace the fitted fields of one record, keeping its exclusion flag.
    ///
    /// Returns `false` if the location is unknown.
    pub fn store_fit(&mut self, location: &str, fit: GrowthRecord) -> bool {
        match self.get_mut(location) {
            Some(rec) => {
                rec.overwrite_with(fit);
                true
            }
            None => false,
        }
    }

    pub fn set_excluded(&mut self, location: &str, excluded: bool) -> bool {
        match self.get_mut(location) {
            Some(rec) => {
                rec.excluded_flag = excluded;
                true
            }
            None => false,
        }
    }

    pub fn fitted_count(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_fitted()).count()
    }
}
