//! Turn raw fits into growth-parameter records.
//!
//! Everything that comes out of a fit covariance is carried as `Uncertain`, so
//! derived quantities (doubling time, phase bounds, log-phase doublings) get
//! first-order standard deviations that respect parameter correlations.

use std::f64::consts::LN_2;

use nalgebra::DMatrix;

use crate::data::BlankedTrace;
use crate::domain::{FittingMode, GrowthRecord, ModelKind, finite};
use crate::fit::easy_linear::EasyLinearFit;
use crate::fit::exponential::ExponentialFit;
use crate::fit::sigmoid::SigmoidFit;
use crate::math::{Uncertain, rmse};
use crate::models::predict;

/// Where the exponential phase of a sigmoid fit starts and ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhasePolicy {
    /// `l + start * A / mu` to `l + end * A / mu`.
    Tight { start: f64, end: f64 },
    /// `l` to `(A + mu * l) / mu`.
    Conventional,
}

impl PhasePolicy {
    /// Offset of `t0` from the lag parameter, in units of `A / mu`.
    pub fn start_offset(self) -> f64 {
        match self {
            PhasePolicy::Tight { start, .. } => start,
            PhasePolicy::Conventional => 0.0,
        }
    }

    fn bounds(self, a: &Uncertain, mu: &Uncertain, l: &Uncertain) -> (Uncertain, Uncertain) {
        match self {
            PhasePolicy::Tight { start, end } => {
                let scale = a / mu;
                (l + start * &scale, l + end * &scale)
            }
            PhasePolicy::Conventional => (l.clone(), (a + mu * l) / mu),
        }
    }

    fn end_of(self, p: &[f64]) -> f64 {
        let (a, mu, l) = (p[0], p[1], p[2]);
        match self {
            PhasePolicy::Tight { end, .. } => l + end * a / mu,
            PhasePolicy::Conventional => (a + mu * l) / mu,
        }
    }
}

pub fn doubling_time(mu: &Uncertain) -> Uncertain {
    LN_2 / mu
}

fn set_uncertain(value: &mut Option<f64>, std: &mut Option<f64>, u: &Uncertain) {
    *value = finite(u.value());
    *std = value.and_then(|_| finite(u.std_dev()));
}

/// Whole-curve fields that do not depend on the fitted phase.
fn base_record(mode: FittingMode, trace: &BlankedTrace, smoothing_window: Option<usize>) -> GrowthRecord {
    GrowthRecord {
        fitting_mode: Some(mode),
        doublings: trace.doublings(),
        yield_: trace.max_value(),
        smoothing_window,
        ..GrowthRecord::default()
    }
}

/// Record for an exponential fit on positions `start..=end` of `trace`
/// (manual selections and manual-like windows).
pub fn exponential_record(
    mode: FittingMode,
    trace: &BlankedTrace,
    start: usize,
    end: usize,
    fit: &ExponentialFit,
    smoothing_window: Option<usize>,
) -> GrowthRecord {
    let mut rec = base_record(mode, trace, smoothing_window);
    rec.t0 = Some(trace.t[start]);
    rec.t0_std = Some(0.0);
    rec.t0_idx = Some(trace.index[start]);
    rec.t1 = Some(trace.t[end]);
    rec.t1_std = Some(0.0);
    rec.t1_idx = Some(trace.index[end]);

    let params = Uncertain::from_fit(&[fit.n0, fit.mu], fit.covariance.clone());
    let mu = &params[1];
    set_uncertain(&mut rec.mumax, &mut rec.mumax_std, mu);
    if mu.value() > 0.0 {
        set_uncertain(&mut rec.dt, &mut rec.dt_std, &doubling_time(mu));
    }

    rec.doublings_log = finite((trace.y[end] / trace.y[start]).log2());
    rec.doublings_log_std = rec.doublings_log.map(|_| 0.0);
    rec.n0 = finite(fit.n0);
    rec.error = fit.r_squared.and_then(finite);
    rec
}

/// Record for a whole-curve sigmoid fit.
pub fn sigmoid_record(
    mode: FittingMode,
    policy: PhasePolicy,
    fit: &SigmoidFit,
    trace: &BlankedTrace,
    smoothing_window: Option<usize>,
) -> GrowthRecord {
    let mut rec = base_record(mode, trace, smoothing_window);
    let model = fit.model;
    let params = Uncertain::from_fit(&fit.params, fit.covariance.clone());
    let (a, mu, l) = (&params[0], &params[1], &params[2]);

    let (t0, t1) = policy.bounds(a, mu, l);
    set_uncertain(&mut rec.t0, &mut rec.t0_std, &t0);
    set_uncertain(&mut rec.t1, &mut rec.t1_std, &t1);
    set_uncertain(&mut rec.mumax, &mut rec.mumax_std, mu);
    if mu.value() > 0.0 {
        set_uncertain(&mut rec.dt, &mut rec.dt_std, &doubling_time(mu));
    }
    set_uncertain(&mut rec.carrying_capacity, &mut rec.carrying_capacity_std, a);
    if model.has_shape() {
        set_uncertain(&mut rec.v, &mut rec.v_std, &params[3]);
    }

    // log2(exp(model(t1)) / exp(model(l))), with t1 itself a function of the parameters.
    let inputs: Vec<&Uncertain> = params.iter().collect();
    let doublings_log = Uncertain::apply(&inputs, |p| {
        (predict(model, policy.end_of(p), p) - predict(model, p[2], p)) / LN_2
    });
    set_uncertain(&mut rec.doublings_log, &mut rec.doublings_log_std, &doublings_log);

    rec.n0 = finite(fit.n0);
    let predicted: Vec<f64> = trace.t.iter().map(|&t| fit.predict_raw(t)).collect();
    rec.error = rmse(&trace.y, &predicted).and_then(finite);
    rec
}

/// Record for an Easy-Linear window.
pub fn easy_linear_record(fit: &EasyLinearFit, trace: &BlankedTrace, smoothing_window: Option<usize>) -> GrowthRecord {
    let mut rec = base_record(FittingMode::EasyLinear, trace, smoothing_window);
    let (t0, t1) = (trace.t[fit.start], trace.t[fit.end]);
    rec.t0 = Some(t0);
    rec.t0_std = Some(0.0);
    rec.t0_idx = Some(trace.index[fit.start]);
    rec.t1 = Some(t1);
    rec.t1_std = Some(0.0);
    rec.t1_idx = Some(trace.index[fit.end]);

    let line = &fit.line;
    let cov = DMatrix::from_iterator(2, 2, line.covariance.iter().copied());
    let params = Uncertain::from_fit(&[line.slope, line.intercept], cov);
    let (mu, b) = (&params[0], &params[1]);
    set_uncertain(&mut rec.mumax, &mut rec.mumax_std, mu);
    if mu.value() > 0.0 {
        set_uncertain(&mut rec.dt, &mut rec.dt_std, &doubling_time(mu));
    }

    let ratio = (mu * t1 + b).exp() / (mu * t0 + b).exp();
    set_uncertain(&mut rec.doublings_log, &mut rec.doublings_log_std, &ratio.log2());

    rec.n0 = finite(line.intercept.exp());
    rec.error = line.r_squared.and_then(finite);
    rec
}

/// Constant in `l = t0 - c * A / mu` for reconstructing a tight fit's lag parameter.
pub fn lag_from_t0(policy: PhasePolicy, t0: f64, a: f64, mu: f64) -> f64 {
    t0 - policy.start_offset() * a / mu
}

/// Model used to rebuild a sigmoid curve, if any.
pub fn sigmoid_model(mode: FittingMode) -> Option<ModelKind> {
    match mode {
        FittingMode::GompertzTight | FittingMode::GompertzConventional => Some(ModelKind::Gompertz),
        FittingMode::LogisticTight | FittingMode::LogisticConventional => Some(ModelKind::Logistic),
        FittingMode::Richards => Some(ModelKind::Richards),
        FittingMode::Schnute => Some(ModelKind::Schnute),
        FittingMode::Manual | FittingMode::ManualLike | FittingMode::EasyLinear => None,
    }
}
