//! Exponential-phase detection without a whole-curve model ("manual-like").
//!
//! The log trace is smoothed, differentiated and smoothed again. Points whose
//! smoothed slope is within `slope_range` of the steepest slope form the candidate
//! region, and every sub-window of that region is scored as
//!
//! `objective = weight * R² + (ln y[end] - ln y[start]) / (max ln y - min ln y)`
//!
//! The R² term favours straight stretches, the second term favours windows that
//! cover a large share of the total growth.

use rayon::prelude::*;

use crate::domain::ManualLikeParams;
use crate::error::FitError;
use crate::math::{diff, fit_line, uniform_filter};

/// Detected window, as positions in the analysed trace.
///
/// The line fit covers `start..end`; `end` itself marks the phase end point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseWindow {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
struct Scored {
    idx: usize,
    window: PhaseWindow,
    objective: f64,
}

/// Smoothed first difference of the smoothed log trace.
pub fn smoothed_log_slope(y_log: &[f64], ws: usize) -> Vec<f64> {
    let smoothed = uniform_filter(y_log, ws);
    uniform_filter(&diff(&smoothed), ws)
}

/// First and last index whose smoothed slope exceeds `slope_range * max_slope`.
pub fn candidate_region(y: &[f64], ws: usize, slope_range: f64) -> Result<(usize, usize), FitError> {
    if y.iter().any(|v| !(*v > 0.0)) {
        return Err(FitError::NonPositive);
    }
    if y.len() < 2 {
        return Err(FitError::InsufficientData {
            needed: 2,
            have: y.len(),
        });
    }
    let y_log: Vec<f64> = y.iter().map(|v| v.ln()).collect();
    let slope = smoothed_log_slope(&y_log, ws);

    let max_slope = slope.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max_slope.is_finite() {
        return Err(FitError::NoCandidateRegion);
    }
    let min_slope = max_slope * slope_range;

    let first = slope.iter().position(|s| *s > min_slope);
    let last = slope.iter().rposition(|s| *s > min_slope);
    match (first, last) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(FitError::NoCandidateRegion),
    }
}

/// Find the best-scoring log-linear window of a strictly positive trace.
pub fn detect_phase(t: &[f64], y: &[f64], params: &ManualLikeParams) -> Result<PhaseWindow, FitError> {
    if t.len() != y.len() {
        return Err(FitError::LengthMismatch(t.len(), y.len()));
    }
    let (window_start, window_end) = candidate_region(y, params.ws, params.slope_range)?;
    let max_window_length = window_end - window_start;
    if max_window_length < params.min_window_length {
        return Err(FitError::WindowTooShort {
            length: max_window_length,
            min: params.min_window_length,
        });
    }

    let y_log: Vec<f64> = y.iter().map(|v| v.ln()).collect();
    let (lo, hi) = y_log
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let span = hi - lo;

    // Window lengths outer, offsets inner; the enumeration index breaks ties.
    let windows: Vec<PhaseWindow> = (params.min_window_length..=max_window_length)
        .flat_map(|wl| {
            (0..=max_window_length - wl).map(move |wp| PhaseWindow {
                start: window_start + wp,
                end: window_start + wp + wl,
            })
        })
        .collect();

    let scored: Vec<Scored> = windows
        .par_iter()
        .enumerate()
        .filter_map(|(idx, w)| {
            let line = fit_line(&t[w.start..w.end], &y_log[w.start..w.end]).ok()?;
            let r2 = line.r_squared?;
            let variance_explained = (y_log[w.end] - y_log[w.start]) / span;
            let objective = params.weight * r2 + variance_explained;
            objective.is_finite().then_some(Scored {
                idx,
                window: *w,
                objective,
            })
        })
        .collect();

    let Some(first) = scored.first() else {
        return Err(FitError::Degenerate("no window could be fitted".into()));
    };
    let mut best = first;
    for s in &scored[1..] {
        if s.objective > best.objective || (s.objective == best.objective && s.idx < best.idx) {
            best = s;
        }
    }
    Ok(best.window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::modified_gompertz;

    fn gompertz_trace() -> (Vec<f64>, Vec<f64>) {
        let t: Vec<f64> = (0..97).map(|i| i as f64 * 0.25).collect();
        let y = t
            .iter()
            .map(|&x| 0.01 * modified_gompertz(x, 3.5, 0.6, 4.0).exp())
            .collect();
        (t, y)
    }

    #[test]
    fn window_lies_in_growth_phase() {
        let (t, y) = gompertz_trace();
        let w = detect_phase(&t, &y, &ManualLikeParams::default()).unwrap();
        assert!(w.start < w.end);
        assert!(w.end < t.len());
        // Lag ends at 4 h; stationary phase starts around l + A/mu ≈ 9.8 h.
        assert!(t[w.start] >= 2.0, "start {}", t[w.start]);
        assert!(t[w.end] <= 11.0, "end {}", t[w.end]);
    }

    #[test]
    fn detection_is_deterministic() {
        let (t, y) = gompertz_trace();
        let params = ManualLikeParams::default();
        let first = detect_phase(&t, &y, &params).unwrap();
        for _ in 0..5 {
            assert_eq!(detect_phase(&t, &y, &params).unwrap(), first);
        }
    }

    #[test]
    fn flat_trace_has_no_candidate_region() {
        let t: Vec<f64> = (0..30).map(f64::from).collect();
        let y = vec![0.1; 30];
        // Every slope is 0, so nothing exceeds 0.6 * 0.
        assert_eq!(
            detect_phase(&t, &y, &ManualLikeParams::default()).unwrap_err(),
            FitError::NoCandidateRegion
        );
    }

    #[test]
    fn non_positive_input_is_rejected() {
        let t = [0.0, 1.0, 2.0];
        assert_eq!(
            detect_phase(&t, &[0.1, 0.0, 0.3], &ManualLikeParams::default()).unwrap_err(),
            FitError::NonPositive
        );
    }

    #[test]
    fn lower_slope_range_widens_region() {
        let (_, y) = gompertz_trace();
        let narrow = candidate_region(&y, 10, 0.6).unwrap();
        let wide = candidate_region(&y, 10, 0.2).unwrap();
        assert!(wide.0 <= narrow.0 && wide.1 >= narrow.1);
    }
}
