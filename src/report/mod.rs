//! Replicate-group summaries and formatted terminal output.
//!
//! Replicates share a name up to their trailing token (`wt_1`, `wt_2`, `wt 3`
//! all belong to group `wt`). Samples still named after their location and
//! skipped samples are not grouped.

pub mod format;

pub use format::*;

use serde::Serialize;

use crate::data::Dataset;
use crate::domain::{GrowthRecord, RecordSet};
use crate::math::mean_std_present;

/// Mean and population standard deviation over the available values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeanStd {
    pub mean: Option<f64>,
    pub std: Option<f64>,
}

impl MeanStd {
    fn of<F>(records: &[&GrowthRecord], field: F) -> Self
    where
        F: Fn(&GrowthRecord) -> Option<f64>,
    {
        let values: Vec<Option<f64>> = records.iter().map(|r| field(r)).collect();
        let (mean, std) = mean_std_present(&values);
        Self { mean, std }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    /// Locations of all members, excluded ones included.
    pub members: Vec<String>,
    pub excluded: usize,
    pub mumax: MeanStd,
    pub dt: MeanStd,
    /// Start of the exponential phase, i.e. the lag time.
    pub t0: MeanStd,
    pub doublings: MeanStd,
    pub doublings_log: MeanStd,
    #[serde(rename = "yield")]
    pub yield_: MeanStd,
}

/// Group key of a sample name.
///
/// The name is split on `_` and spaces, the last token (the replicate number)
/// is dropped and the rest is joined with single spaces, so `mut_a_3` and
/// `mut a_2` share the group `mut a`. A name with a single token is its own
/// group rather than falling into an unnamed one.
pub fn group_name(name: &str) -> String {
    let tokens: Vec<&str> = name.split(['_', ' ']).filter(|t| !t.is_empty()).collect();
    match tokens.split_last() {
        Some((_, rest)) if !rest.is_empty() => rest.join(" "),
        _ => name.trim().to_string(),
    }
}

/// One summary per replicate group, in order of first appearance.
pub fn group_summaries(dataset: &Dataset, records: &RecordSet) -> Vec<GroupSummary> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for sample in dataset.samples().iter().filter(|s| s.is_named()) {
        let key = group_name(&sample.name);
        match groups.iter_mut().find(|(name, _)| *name == key) {
            Some((_, members)) => members.push(sample.location.clone()),
            None => groups.push((key, vec![sample.location.clone()])),
        }
    }

    groups
        .into_iter()
        .map(|(name, members)| {
            let all: Vec<&GrowthRecord> = members.iter().filter_map(|l| records.get(l)).collect();
            let included: Vec<&GrowthRecord> = all.iter().copied().filter(|r| !r.excluded_flag).collect();
            GroupSummary {
                excluded: all.len() - included.len(),
                mumax: MeanStd::of(&included, |r| r.mumax),
                dt: MeanStd::of(&included, |r| r.dt),
                t0: MeanStd::of(&included, |r| r.t0),
                doublings: MeanStd::of(&included, |r| r.doublings),
                doublings_log: MeanStd::of(&included, |r| r.doublings_log),
                yield_: MeanStd::of(&included, |r| r.yield_),
                name,
                members,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn group_names_drop_the_replicate_token() {
        assert_eq!(group_name("wt_1"), "wt");
        assert_eq!(group_name("delta abc 2"), "delta abc");
        assert_eq!(group_name("mut_a_3"), "mut a");
        assert_eq!(group_name("mut a_2"), "mut a");
        assert_eq!(group_name("wt__2"), "wt");
        assert_eq!(group_name("single"), "single");
    }

    #[test]
    fn excluded_and_unset_values_are_ignored() {
        let flat = vec![Some(0.1); 3];
        let ds = Dataset::new(
            vec![0.0, 1.0, 2.0],
            vec![
                ("blank".to_string(), flat.clone()),
                ("wt_1".to_string(), flat.clone()),
                ("wt_2".to_string(), flat.clone()),
                ("wt_3".to_string(), flat.clone()),
                ("-".to_string(), flat.clone()),
                ("6".to_string(), flat),
            ],
        )
        .unwrap();
        let mut records = ds.empty_records();
        let fit = |mu: f64| GrowthRecord {
            mumax: Some(mu),
            ..GrowthRecord::default()
        };
        records.store_fit("2", fit(0.4));
        records.store_fit("3", fit(0.6));
        records.store_fit("4", fit(5.0));
        records.set_excluded("4", true);

        let groups = group_summaries(&ds, &records);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["blank", "wt"]);

        let wt = &groups[1];
        assert_eq!(wt.members, vec!["2", "3", "4"]);
        assert_eq!(wt.excluded, 1);
        assert_relative_eq!(wt.mumax.mean.unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(wt.mumax.std.unwrap(), 0.1, epsilon = 1e-12);
        assert_eq!(wt.dt, MeanStd::default());
    }

    #[test]
    fn underscore_and_space_spellings_share_a_group() {
        let flat = vec![Some(0.1); 2];
        let ds = Dataset::new(
            vec![0.0, 1.0],
            vec![
                ("mut_a_1".to_string(), flat.clone()),
                ("mut a_2".to_string(), flat.clone()),
                ("mut a 3".to_string(), flat.clone()),
                ("control".to_string(), flat),
            ],
        )
        .unwrap();
        let groups = group_summaries(&ds, &ds.empty_records());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "mut a");
        assert_eq!(groups[0].members, vec!["1", "2", "3"]);
        assert_eq!(groups[1].name, "control");
    }
}
