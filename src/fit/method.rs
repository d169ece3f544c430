//! Method dispatch: one table entry per auto-fit method.
//!
//! Each entry names the fitter to run and the phase policy used to place `t0`
//! and `t1`. Everything that needs to know "what does method X do" goes through
//! `method_spec` so the table is the single source of truth.

use tracing::debug;

use crate::data::{BlankedTrace, Dataset};
use crate::domain::{AnalysisSettings, AutoFitMethod, FittingMode, GrowthRecord, ModelKind};
use crate::error::FitError;
use crate::fit::derive::{PhasePolicy, easy_linear_record, exponential_record, sigmoid_record};
use crate::fit::easy_linear::easy_linear;
use crate::fit::exponential::{Selection, fit_exponential, manual_bounds, manual_like_bounds, resolve_selection};
use crate::fit::manual_like::detect_phase;
use crate::fit::sigmoid::fit_sigmoid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fitter {
    ManualLike,
    Sigmoid(ModelKind),
    EasyLinear,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MethodSpec {
    pub method: AutoFitMethod,
    pub fitter: Fitter,
    pub phase: PhasePolicy,
}

const GOMPERTZ_TIGHT: PhasePolicy = PhasePolicy::Tight { start: 0.014, end: 0.72 };
const LOGISTIC_TIGHT: PhasePolicy = PhasePolicy::Tight { start: 0.17, end: 0.83 };

pub const METHODS: [MethodSpec; 8] = [
    MethodSpec {
        method: AutoFitMethod::ManualLike,
        fitter: Fitter::ManualLike,
        phase: PhasePolicy::Conventional,
    },
    MethodSpec {
        method: AutoFitMethod::GompertzTight,
        fitter: Fitter::Sigmoid(ModelKind::Gompertz),
        phase: GOMPERTZ_TIGHT,
    },
    MethodSpec {
        method: AutoFitMethod::GompertzConventional,
        fitter: Fitter::Sigmoid(ModelKind::Gompertz),
        phase: PhasePolicy::Conventional,
    },
    MethodSpec {
        method: AutoFitMethod::LogisticTight,
        fitter: Fitter::Sigmoid(ModelKind::Logistic),
        phase: LOGISTIC_TIGHT,
    },
    MethodSpec {
        method: AutoFitMethod::LogisticConventional,
        fitter: Fitter::Sigmoid(ModelKind::Logistic),
        phase: PhasePolicy::Conventional,
    },
    MethodSpec {
        method: AutoFitMethod::Richards,
        fitter: Fitter::Sigmoid(ModelKind::Richards),
        phase: PhasePolicy::Conventional,
    },
    MethodSpec {
        method: AutoFitMethod::Schnute,
        fitter: Fitter::Sigmoid(ModelKind::Schnute),
        phase: PhasePolicy::Conventional,
    },
    MethodSpec {
        method: AutoFitMethod::EasyLinear,
        fitter: Fitter::EasyLinear,
        phase: PhasePolicy::Conventional,
    },
];

pub fn method_spec(method: AutoFitMethod) -> &'static MethodSpec {
    // METHODS is ordered like AutoFitMethod::ALL.
    &METHODS[method as usize]
}

/// Phase policy that produced a record, for curve reconstruction.
pub fn phase_policy(mode: FittingMode) -> PhasePolicy {
    METHODS
        .iter()
        .find(|m| FittingMode::from(m.method) == mode)
        .map_or(PhasePolicy::Conventional, |m| m.phase)
}

/// Run `method` on a blanked, strictly positive trace.
///
/// `smoothing` is the window the trace was already smoothed with; it is only
/// recorded.
pub fn fit_trace(
    method: AutoFitMethod,
    trace: &BlankedTrace,
    settings: &AnalysisSettings,
    smoothing: Option<usize>,
) -> Result<GrowthRecord, FitError> {
    let spec = method_spec(method);
    let mode = FittingMode::from(method);

    match spec.fitter {
        Fitter::ManualLike => {
            let window = detect_phase(&trace.t, &trace.y, &settings.manual_like)?;
            let fit = fit_exponential(
                &trace.t[window.start..window.end],
                &trace.y[window.start..window.end],
                &manual_like_bounds(),
            )?;
            Ok(exponential_record(mode, trace, window.start, window.end, &fit, smoothing))
        }
        Fitter::Sigmoid(model) => {
            let fit = fit_sigmoid(model, &trace.t, &trace.y)?;
            Ok(sigmoid_record(mode, spec.phase, &fit, trace, smoothing))
        }
        Fitter::EasyLinear => {
            let fit = easy_linear(&trace.t, &trace.y, settings.easy_linear_window)?;
            Ok(easy_linear_record(&fit, trace, smoothing))
        }
    }
}

/// Blank one sample, check it is analysable and run `settings.method` on it.
pub fn fit_sample(dataset: &Dataset, location: &str, settings: &AnalysisSettings) -> Result<GrowthRecord, FitError> {
    let trace = dataset.blanked(location)?.log_ready(settings.max_invalid_fraction)?;
    debug!(location, points = trace.len(), method = ?settings.method, "fitting sample");
    fit_trace(settings.method, &trace, settings, dataset.smoothing_window())
}

/// Fit an exponential to a user-selected stretch of one sample.
pub fn fit_manual(dataset: &Dataset, location: &str, selection: &Selection) -> Result<GrowthRecord, FitError> {
    let trace = dataset.blanked(location)?.positive();
    let (start, end) = resolve_selection(&trace, selection)?;
    let fit = fit_exponential(&trace.t[start..=end], &trace.y[start..=end], &manual_bounds())?;
    Ok(exponential_record(
        FittingMode::Manual,
        &trace,
        start,
        end,
        &fit,
        dataset.smoothing_window(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_method_order() {
        for (i, m) in AutoFitMethod::ALL.iter().enumerate() {
            assert_eq!(METHODS[i].method, *m);
            assert_eq!(method_spec(*m).method, *m);
        }
    }

    #[test]
    fn tight_variants_carry_offsets() {
        assert_eq!(phase_policy(FittingMode::GompertzTight), GOMPERTZ_TIGHT);
        assert_eq!(phase_policy(FittingMode::LogisticTight).start_offset(), 0.17);
        assert_eq!(phase_policy(FittingMode::Manual), PhasePolicy::Conventional);
    }

    #[test]
    fn record_carries_the_dataset_smoothing_window() {
        let t: Vec<f64> = (0..80).map(|i| i as f64 * 0.25).collect();
        let growing: Vec<Option<f64>> = t
            .iter()
            .map(|&x| Some(0.05 + 0.01 * crate::models::modified_gompertz(x, 2.0, 0.5, 3.0).exp()))
            .collect();
        let rows = vec![
            ("blank 1".to_string(), vec![Some(0.05); t.len()]),
            ("blank 2".to_string(), vec![Some(0.05); t.len()]),
            ("blank 3".to_string(), vec![Some(0.05); t.len()]),
            ("wt_1".to_string(), growing),
        ];
        let raw = Dataset::new(t, rows).unwrap();
        let settings = AnalysisSettings {
            method: AutoFitMethod::EasyLinear,
            smoothing_window: Some(7),
            ..AnalysisSettings::default()
        };

        // The settings value is a request; only the smoothing actually applied is recorded.
        let unsmoothed = fit_sample(&raw, "4", &settings).unwrap();
        assert_eq!(unsmoothed.smoothing_window, None);

        let smoothed = raw.smoothed(3).unwrap();
        let rec = fit_sample(&smoothed, "4", &settings).unwrap();
        assert_eq!(rec.smoothing_window, Some(3));
    }
}
