//! Whole-curve sigmoid fits (Gompertz, Logistic, Richards, Schnute).
//!
//! Each trace is normalised by its smallest positive value, `y_log = ln(y / n0)`,
//! and the model is fitted to `(t, y_log)` by bounded Levenberg–Marquardt.
//! Several starting points are tried (a data-driven guess first, then fixed
//! fallbacks) and the converged fit with the lowest SSE wins.

use nalgebra::DMatrix;
use tracing::trace;

use crate::domain::ModelKind;
use crate::error::FitError;
use crate::math::{Bounds, LmOptions, levenberg_marquardt};
use crate::models::predict;

/// Lower bound on the Richards shape parameter.
pub const RICHARDS_MIN_SHAPE: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct SigmoidFit {
    pub model: ModelKind,
    /// `[A, mu, l]` or `[A, mu, l, v]`.
    pub params: Vec<f64>,
    pub covariance: DMatrix<f64>,
    /// Normalisation constant: the smallest positive input value.
    pub n0: f64,
    pub sse: f64,
}

impl SigmoidFit {
    /// Model prediction on the raw (non-log) scale.
    pub fn predict_raw(&self, t: f64) -> f64 {
        self.n0 * predict(self.model, t, &self.params).exp()
    }
}

pub fn bounds_for(model: ModelKind) -> Bounds {
    let inf = f64::INFINITY;
    match model {
        ModelKind::Gompertz | ModelKind::Logistic => Bounds::new(vec![0.0, 0.0, -inf], vec![inf, inf, inf]),
        ModelKind::Richards => Bounds::new(
            vec![0.0, 0.0, -inf, RICHARDS_MIN_SHAPE],
            vec![inf, inf, inf, inf],
        ),
        ModelKind::Schnute => Bounds::new(vec![0.0, 0.0, -inf, -inf], vec![inf, inf, inf, inf]),
    }
}

/// Starting points, tried in order.
fn initial_guesses(model: ModelKind, t: &[f64], y_log: &[f64]) -> Vec<Vec<f64>> {
    let mut guesses = Vec::new();
    if let Some((a, mu, l)) = tangent_guess(t, y_log) {
        match model {
            ModelKind::Gompertz | ModelKind::Logistic => guesses.push(vec![a, mu, l]),
            ModelKind::Richards => guesses.push(vec![a, mu, l, 0.5]),
            ModelKind::Schnute => guesses.push(vec![a, mu, l, -1.0]),
        }
    }

    let a_max = y_log.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let fallback = match model {
        ModelKind::Gompertz => vec![0.1, 0.5, -5.0],
        ModelKind::Logistic => vec![0.1, 0.1, 1.0],
        ModelKind::Richards => vec![a_max.max(0.1), median(t), 1.0, 0.5],
        ModelKind::Schnute => vec![2.0, 0.5, 3.0, -1.0],
    };
    guesses.push(fallback);
    guesses
}

/// `A` = highest log value, `mu` = steepest secant, `l` = where that tangent crosses zero.
fn tangent_guess(t: &[f64], y_log: &[f64]) -> Option<(f64, f64, f64)> {
    let a = y_log.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let (i, mu) = t
        .windows(2)
        .zip(y_log.windows(2))
        .map(|(tw, yw)| (yw[1] - yw[0]) / (tw[1] - tw[0]))
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })?;
    if !(a > 0.0 && mu > 0.0) {
        return None;
    }
    let l = t[i] - y_log[i] / mu;
    Some((a, mu, l))
}

fn median(values: &[f64]) -> f64 {
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    match v.len() {
        0 => 0.0,
        n if n % 2 == 1 => v[n / 2],
        n => 0.5 * (v[n / 2 - 1] + v[n / 2]),
    }
}

/// Fit `model` to a strictly positive trace.
pub fn fit_sigmoid(model: ModelKind, t: &[f64], y: &[f64]) -> Result<SigmoidFit, FitError> {
    if t.len() != y.len() {
        return Err(FitError::LengthMismatch(t.len(), y.len()));
    }
    let n0 = y
        .iter()
        .copied()
        .filter(|v| *v > 0.0)
        .fold(f64::INFINITY, f64::min);
    if !n0.is_finite() {
        return Err(FitError::NonPositive);
    }

    let mut x = Vec::with_capacity(t.len());
    let mut y_log = Vec::with_capacity(t.len());
    for (&ti, &yi) in t.iter().zip(y) {
        let v = (yi / n0).ln();
        // Richards cannot represent the normalisation point itself.
        if !v.is_finite() || (model == ModelKind::Richards && v == 0.0) {
            continue;
        }
        x.push(ti);
        y_log.push(v);
    }

    let k = model.param_count();
    if x.len() <= k {
        return Err(FitError::InsufficientData {
            needed: k + 1,
            have: x.len(),
        });
    }

    let bounds = bounds_for(model);
    let opts = LmOptions {
        max_iter: 2000,
        ..LmOptions::default()
    };

    let mut best: Option<SigmoidFit> = None;
    let mut last_err = FitError::NoConvergence("no starting point tried".into());
    for p0 in initial_guesses(model, &x, &y_log) {
        match levenberg_marquardt(|xi, p| predict(model, xi, p), &x, &y_log, &p0, &bounds, &opts) {
            Ok(fit) if fit.params.iter().all(|v| v.is_finite()) => {
                trace!(model = model.display_name(), sse = fit.sse, "sigmoid start converged");
                if best.as_ref().is_none_or(|b| fit.sse < b.sse) {
                    best = Some(SigmoidFit {
                        model,
                        params: fit.params,
                        covariance: fit.covariance,
                        n0,
                        sse: fit.sse,
                    });
                }
            }
            Ok(_) => last_err = FitError::NoConvergence("non-finite parameters".into()),
            Err(e) => {
                trace!(model = model.display_name(), error = %e, "sigmoid start failed");
                last_err = e;
            }
        }
    }
    best.ok_or(last_err)
}
