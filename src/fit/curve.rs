//! Rebuild plottable curves from stored growth records.

use crate::data::Sample;
use crate::domain::{CurvePoint, FittedCurve, FittingMode, GrowthRecord};
use crate::fit::derive::{lag_from_t0, sigmoid_model};
use crate::fit::method::phase_policy;
use crate::models::{exponential, predict};

/// Default number of points on an exported curve.
pub const CURVE_POINTS: usize = 200;

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}

/// A function `t -> y` for the fitted curve, plus the time span to draw it over.
fn curve_fn(record: &GrowthRecord, times: &[f64]) -> Option<(Box<dyn Fn(f64) -> f64>, f64, f64)> {
    let mode = record.fitting_mode?;
    let mu = record.mumax?;
    let n0 = record.n0?;
    let t0 = record.t0?;

    match sigmoid_model(mode) {
        None => {
            let t1 = record.t1?;
            Some((Box::new(move |t| exponential(t, n0, mu)), t0, t1))
        }
        Some(model) => {
            let a = record.carrying_capacity?;
            let l = lag_from_t0(phase_policy(mode), t0, a, mu);
            let mut params = vec![a, mu, l];
            if model.has_shape() {
                params.push(record.v?);
            }
            let (first, last) = (*times.first()?, *times.last()?);
            Some((Box::new(move |t| n0 * predict(model, t, &params).exp()), first, last))
        }
    }
}

/// Sample a fitted record on `n_points` evenly spaced times.
///
/// Exponential fits cover their phase only; sigmoid fits cover the whole time axis.
pub fn fitted_curve(sample: &Sample, record: &GrowthRecord, times: &[f64], n_points: usize) -> Option<FittedCurve> {
    let fitting_mode: FittingMode = record.fitting_mode?;
    let (f, start, end) = curve_fn(record, times)?;
    let t = linspace(start, end, n_points);
    let y = t.iter().map(|&x| f(x)).collect();
    let point = |x: Option<f64>| x.map(|t| CurvePoint { t, y: f(t) });

    Some(FittedCurve {
        location: sample.location.clone(),
        sample_name: sample.name.clone(),
        fitting_mode,
        t,
        y,
        phase_start: point(record.t0),
        phase_end: point(record.t1),
    })
}
