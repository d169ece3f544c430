//! Closed-form growth functions.
//!
//! The sigmoid models are the reparameterised forms of Zwietering et al. (1990),
//! written in terms of biologically meaningful parameters and fitted to
//! `ln(N / N0)`:
//!
//! - `A`: asymptote of the log curve (carrying capacity)
//! - `mu`: maximum specific growth rate
//! - `l`: lag parameter
//! - `v`: shape parameter (Richards, Schnute)
//!
//! All functions are total on the reals; out-of-domain parameters (e.g. `v <= 0`
//! for Richards) simply produce non-finite values, which the solver rejects.

use std::f64::consts::E;

use crate::domain::ModelKind;

pub fn linear(x: f64, slope: f64, intercept: f64) -> f64 {
    slope * x + intercept
}

pub fn exponential(t: f64, n0: f64, mu: f64) -> f64 {
    n0 * (mu * t).exp()
}

pub fn modified_gompertz(x: f64, a: f64, mu: f64, l: f64) -> f64 {
    a * (-(mu * E / a * (l - x) + 1.0).exp()).exp()
}

pub fn modified_logistic(x: f64, a: f64, mu: f64, l: f64) -> f64 {
    a / (1.0 + (4.0 * mu / a * (l - x) + 2.0).exp())
}

/// Requires `v > 0`.
pub fn modified_richards(x: f64, a: f64, mu: f64, l: f64, v: f64) -> f64 {
    let inner = 1.0 + v * (1.0 + v).exp() * (mu / a * (1.0 + v) * (1.0 + 1.0 / v) * (l - x)).exp();
    a * inner.powf(-1.0 / v)
}

/// Requires `v != 1`.
pub fn modified_schnute(x: f64, a: f64, mu: f64, l: f64, v: f64) -> f64 {
    let scale = mu * (1.0 - v) / a;
    let base = (1.0 - v * (a * l + 1.0 - v - a * x).exp()) / (1.0 - v);
    scale * base.powf(1.0 / v)
}

/// Evaluate a sigmoid model with parameters `[A, mu, l]` or `[A, mu, l, v]`.
///
/// # Panics
/// Panics if `params` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, x: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::Gompertz => modified_gompertz(x, params[0], params[1], params[2]),
        ModelKind::Logistic => modified_logistic(x, params[0], params[1], params[2]),
        ModelKind::Richards => modified_richards(x, params[0], params[1], params[2], params[3]),
        ModelKind::Schnute => modified_schnute(x, params[0], params[1], params[2], params[3]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gompertz_approaches_asymptote() {
        assert_relative_eq!(modified_gompertz(1e3, 2.0, 0.5, 3.0), 2.0, epsilon = 1e-9);
        assert!(modified_gompertz(0.0, 2.0, 0.5, 3.0) < 1e-6);
    }

    #[test]
    fn gompertz_max_slope_equals_mu() {
        // Inflection of the Gompertz curve sits at l + A / (mu e).
        let (a, mu, l) = (2.0, 0.5, 3.0);
        let xi = l + a / (mu * E);
        let h = 1e-5;
        let slope = (modified_gompertz(xi + h, a, mu, l) - modified_gompertz(xi - h, a, mu, l)) / (2.0 * h);
        assert_relative_eq!(slope, mu, max_relative = 1e-6);
    }

    #[test]
    fn logistic_midpoint_and_slope() {
        let (a, mu, l) = (3.0, 0.6, 2.0);
        let xm = l + a / (2.0 * mu);
        assert_relative_eq!(modified_logistic(xm, a, mu, l), a / 2.0, epsilon = 1e-12);
        let h = 1e-5;
        let slope = (modified_logistic(xm + h, a, mu, l) - modified_logistic(xm - h, a, mu, l)) / (2.0 * h);
        assert_relative_eq!(slope, mu, max_relative = 1e-6);
    }

    #[test]
    fn richards_is_finite_for_positive_shape() {
        for &x in &[0.0, 2.0, 5.0, 20.0] {
            let y = modified_richards(x, 2.0, 0.5, 3.0, 0.5);
            assert!(y.is_finite());
            assert!((0.0..=2.0 + 1e-9).contains(&y));
        }
    }

    #[test]
    fn predict_dispatches_to_model() {
        assert_eq!(
            predict(ModelKind::Logistic, 4.0, &[2.0, 0.5, 3.0]),
            modified_logistic(4.0, 2.0, 0.5, 3.0)
        );
        assert_eq!(
            predict(ModelKind::Schnute, 4.0, &[2.0, 0.5, 3.0, -1.0]),
            modified_schnute(4.0, 2.0, 0.5, 3.0, -1.0)
        );
        assert_eq!(exponential(0.0, 0.05, 1.0), 0.05);
        assert_eq!(linear(2.0, 3.0, 1.0), 7.0);
    }
}
