//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use crate::app::BatchOutcome;
use crate::data::Dataset;
use crate::domain::{AnalysisSettings, FittingMode, GrowthRecord, RecordSet};
use crate::report::{GroupSummary, MeanStd};

/// Header block for a batch run.
pub fn format_run_summary(dataset: &Dataset, settings: &AnalysisSettings, outcome: &BatchOutcome) -> String {
    let mut out = String::new();
    let mode: FittingMode = settings.method.into();

    out.push_str("=== growthfit - growth-curve fit ===\n");
    out.push_str(&format!("Method: {}\n", mode.display_name()));
    let (first, last) = (dataset.times().first(), dataset.times().last());
    if let (Some(first), Some(last)) = (first, last) {
        out.push_str(&format!(
            "Samples: n={} | timestamps: n={} in [{first:.2}, {last:.2}]\n",
            dataset.len(),
            dataset.times().len(),
        ));
    }
    match dataset.smoothing_window() {
        Some(w) => out.push_str(&format!("Smoothing: moving average, window {w}\n")),
        None => out.push_str("Smoothing: off\n"),
    }
    out.push_str(&format!(
        "Fitted: {} | skipped: {}\n",
        outcome.fitted,
        outcome.skipped.len()
    ));
    for (location, reason) in &outcome.skipped {
        let name = dataset.sample(location).map(|s| s.name.as_str()).unwrap_or("");
        out.push_str(&format!("  (skipped {location} {name}) {reason}\n"));
    }
    out.push('\n');
    out
}

/// One line per sample.
pub fn format_records(dataset: &Dataset, records: &RecordSet) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<6} {:<20} {:<24} {:>9} {:>9} {:>8} {:>8} {:>9} {:>9} {:>10}\n",
            "loc", "name", "mode", "mumax", "dt", "t0", "t1", "doubl", "yield", "error"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<6} {:-<20} {:-<24} {:-<9} {:-<9} {:-<8} {:-<8} {:-<9} {:-<9} {:-<10}\n",
            "", "", "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for (location, r) in records.iter() {
        let name = dataset.sample(location).map(|s| s.name.as_str()).unwrap_or("");
        out.push_str(format_record_line(location, name, r).trim_end());
        out.push('\n');
    }
    out
}

fn format_record_line(location: &str, name: &str, r: &GrowthRecord) -> String {
    let mode = r.fitting_mode.map(FittingMode::display_name).unwrap_or("-");
    let marker = if r.excluded_flag { "x" } else { "" };
    format!(
        "{:<6} {:<20} {:<24} {:>9} {:>9} {:>8} {:>8} {:>9} {:>9} {:>10} {marker}\n",
        truncate(location, 6),
        truncate(name, 20),
        mode,
        fmt_opt(r.mumax, 4),
        fmt_opt(r.dt, 3),
        fmt_opt(r.t0, 2),
        fmt_opt(r.t1, 2),
        fmt_opt(r.doublings_log, 3),
        fmt_opt(r.yield_, 3),
        fmt_error(r),
    )
}

/// Detailed block for a single record (used after a manual fit).
pub fn format_record_detail(location: &str, name: &str, r: &GrowthRecord) -> String {
    let mut out = String::new();
    let mode = r.fitting_mode.map(FittingMode::display_name).unwrap_or("-");
    out.push_str(&format!("{location} ({name}) - {mode}\n"));
    let rows = [
        ("mumax", r.mumax, r.mumax_std),
        ("dt", r.dt, r.dt_std),
        ("t0", r.t0, r.t0_std),
        ("t1", r.t1, r.t1_std),
        ("doublings_log", r.doublings_log, r.doublings_log_std),
        ("A", r.carrying_capacity, r.carrying_capacity_std),
        ("v", r.v, r.v_std),
    ];
    for (label, value, std) in rows {
        if value.is_some() {
            out.push_str(&format!("  {label:<14} {} ± {}\n", fmt_opt(value, 4), fmt_opt(std, 4)));
        }
    }
    out.push_str(&format!("  {:<14} {}\n", "n0", fmt_opt(r.n0, 4)));
    out.push_str(&format!("  {:<14} {}\n", "doublings", fmt_opt(r.doublings, 3)));
    out.push_str(&format!("  {:<14} {}\n", "yield", fmt_opt(r.yield_, 4)));
    if let Some(m) = r.fitting_mode {
        out.push_str(&format!("  {:<14} {}\n", m.error_measure().label(), fmt_opt(r.error, 4)));
    }
    out
}

/// Replicate-group table.
pub fn format_groups(groups: &[GroupSummary]) -> String {
    let mut out = String::new();
    out.push_str("Replicate groups (mean ± std):\n");
    out.push_str(
        format!(
            "{:<20} {:>3} {:>3} {:>17} {:>17} {:>15} {:>15} {:>15}\n",
            "group", "n", "exc", "mumax", "dt", "lag", "doublings", "yield"
        )
        .trim_end(),
    );
    out.push('\n');
    for g in groups {
        out.push_str(
            format!(
                "{:<20} {:>3} {:>3} {:>17} {:>17} {:>15} {:>15} {:>15}\n",
                truncate(&g.name, 20),
                g.members.len(),
                g.excluded,
                fmt_mean_std(g.mumax, 4),
                fmt_mean_std(g.dt, 3),
                fmt_mean_std(g.t0, 2),
                fmt_mean_std(g.doublings_log, 2),
                fmt_mean_std(g.yield_, 3),
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn fmt_error(r: &GrowthRecord) -> String {
    match (r.fitting_mode, r.error) {
        (Some(m), Some(e)) => format!("{}={e:.3}", m.error_measure().label()),
        _ => "-".to_string(),
    }
}

fn fmt_opt(v: Option<f64>, digits: usize) -> String {
    match v {
        Some(x) => format!("{x:.digits$}"),
        None => "-".to_string(),
    }
}

fn fmt_mean_std(s: MeanStd, digits: usize) -> String {
    match (s.mean, s.std) {
        (Some(m), Some(sd)) => format!("{m:.digits$}±{sd:.digits$}"),
        _ => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_render_as_dashes() {
        let line = format_record_line("A1", "wt_1", &GrowthRecord::default());
        assert!(line.starts_with("A1"));
        assert!(line.contains(" - "));
        assert!(!line.contains("NaN"));
    }

    #[test]
    fn error_column_is_labelled_by_measure() {
        let r = GrowthRecord {
            fitting_mode: Some(FittingMode::Richards),
            error: Some(0.0123),
            excluded_flag: true,
            ..GrowthRecord::default()
        };
        let line = format_record_line("B2", "a_very_long_sample_name_indeed", &r);
        assert!(line.contains("RMSE=0.012"));
        assert!(line.contains("a_very_long_sample_."));
        assert!(line.trim_end().ends_with('x'));
    }

    #[test]
    fn group_table_lists_every_group() {
        let g = GroupSummary {
            name: "wt".into(),
            members: vec!["A1".into(), "A2".into()],
            excluded: 1,
            mumax: MeanStd {
                mean: Some(0.5),
                std: Some(0.1),
            },
            dt: MeanStd::default(),
            t0: MeanStd::default(),
            doublings: MeanStd::default(),
            doublings_log: MeanStd::default(),
            yield_: MeanStd::default(),
        };
        let text = format_groups(&[g]);
        assert!(text.contains("0.5000±0.1000"));
        assert_eq!(text.lines().count(), 3);
    }
}
