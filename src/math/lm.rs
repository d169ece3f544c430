//! Bounded Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! Every growth model in this crate has 2–4 parameters and is fitted to a few
//! dozen to a few hundred points, so the solver favours simplicity:
//!
//! - the Jacobian is built by forward differences (one-sided near a bound)
//! - box constraints are enforced by projecting each trial step onto the box
//! - damping follows the classic ×10 / ÷10 schedule with Marquardt scaling
//!
//! On success the parameter covariance is reported the same way a typical
//! `curve_fit` does it without absolute sigmas: `(JᵀJ)⁻¹ · SSR / (n − k)`.
//! Any numerical failure comes back as a `FitError`; nothing here panics on
//! bad data.

use nalgebra::{DMatrix, DVector};

use crate::error::FitError;

/// Box constraints, one `(lower, upper)` pair per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn unbounded(k: usize) -> Self {
        Self {
            lower: vec![f64::NEG_INFINITY; k],
            upper: vec![f64::INFINITY; k],
        }
    }

    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    fn project(&self, p: &mut [f64]) {
        for (j, v) in p.iter_mut().enumerate() {
            *v = v.clamp(self.lower[j], self.upper[j]);
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmOptions {
    pub max_iter: usize,
    /// Relative SSE reduction below which the fit is considered converged.
    pub ftol: f64,
    /// Relative step size below which the fit is considered converged.
    pub xtol: f64,
    /// Gradient magnitude below which the fit is considered converged.
    pub gtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iter: 500,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-14,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LmFit {
    pub params: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub sse: f64,
    pub iterations: usize,
}

impl LmFit {
    /// Standard deviations from the covariance diagonal.
    pub fn std_devs(&self) -> Vec<f64> {
        (0..self.params.len())
            .map(|j| self.covariance[(j, j)].max(0.0).sqrt())
            .collect()
    }
}

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e14;
const LAMBDA_MIN: f64 = 1e-15;

/// Fit `model(x, p)` to `(x, y)` starting from `p0`.
pub fn levenberg_marquardt<F>(
    model: F,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    bounds: &Bounds,
    opts: &LmOptions,
) -> Result<LmFit, FitError>
where
    F: Fn(f64, &[f64]) -> f64,
{
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch(x.len(), y.len()));
    }
    let n = x.len();
    let k = p0.len();
    if bounds.lower.len() != k || bounds.upper.len() != k {
        return Err(FitError::Degenerate("bounds do not match parameter count".into()));
    }
    if n <= k {
        return Err(FitError::InsufficientData { needed: k + 1, have: n });
    }

    let mut p = p0.to_vec();
    bounds.project(&mut p);

    let mut sse = sum_squares(&model, x, y, &p)
        .ok_or_else(|| FitError::NoConvergence("model is not finite at the initial guess".into()))?;
    let mut lambda = LAMBDA_INIT;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < opts.max_iter {
        iterations += 1;

        let jac = jacobian(&model, x, &p, bounds)
            .ok_or_else(|| FitError::NoConvergence("non-finite Jacobian".into()))?;
        let resid = residuals(&model, x, y, &p);
        let jtj = jac.transpose() * &jac;
        let grad = jac.transpose() * &resid;

        if grad.amax() <= opts.gtol * (1.0 + sse) {
            converged = true;
            break;
        }

        // Inner loop: raise damping until a step lowers the SSE.
        let mut accepted = false;
        while lambda <= LAMBDA_MAX {
            let mut damped = jtj.clone();
            for j in 0..k {
                damped[(j, j)] += lambda * jtj[(j, j)].max(1e-12);
            }
            let Some(chol) = damped.cholesky() else {
                lambda *= 10.0;
                continue;
            };
            let delta = chol.solve(&grad);

            let mut trial: Vec<f64> = p.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
            bounds.project(&mut trial);

            match sum_squares(&model, x, y, &trial) {
                Some(trial_sse) if trial_sse < sse => {
                    let step: f64 = p
                        .iter()
                        .zip(&trial)
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum::<f64>()
                        .sqrt();
                    let scale: f64 = p.iter().map(|v| v * v).sum::<f64>().sqrt();
                    let reduction = sse - trial_sse;

                    p = trial;
                    sse = trial_sse;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);
                    accepted = true;

                    if reduction <= opts.ftol * sse.max(f64::MIN_POSITIVE)
                        || step <= opts.xtol * (scale + opts.xtol)
                        || sse == 0.0
                    {
                        converged = true;
                    }
                    break;
                }
                _ => lambda *= 10.0,
            }
        }

        if converged {
            break;
        }
        if !accepted {
            // No descent direction at any damping: we are sitting in a minimum.
            converged = true;
            break;
        }
    }

    if !converged {
        return Err(FitError::NoConvergence(format!(
            "no convergence after {iterations} iterations"
        )));
    }

    let covariance = covariance(&model, x, &p, bounds, sse, n, k)?;
    Ok(LmFit {
        params: p,
        covariance,
        sse,
        iterations,
    })
}

fn residuals<F: Fn(f64, &[f64]) -> f64>(model: &F, x: &[f64], y: &[f64], p: &[f64]) -> DVector<f64> {
    DVector::from_iterator(x.len(), x.iter().zip(y).map(|(&xi, &yi)| yi - model(xi, p)))
}

fn sum_squares<F: Fn(f64, &[f64]) -> f64>(model: &F, x: &[f64], y: &[f64], p: &[f64]) -> Option<f64> {
    let sse: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - model(xi, p);
            r * r
        })
        .sum();
    sse.is_finite().then_some(sse)
}

fn jacobian<F: Fn(f64, &[f64]) -> f64>(
    model: &F,
    x: &[f64],
    p: &[f64],
    bounds: &Bounds,
) -> Option<DMatrix<f64>> {
    let n = x.len();
    let k = p.len();
    let base: Vec<f64> = x.iter().map(|&xi| model(xi, p)).collect();
    let mut jac = DMatrix::<f64>::zeros(n, k);
    let mut shifted = p.to_vec();

    for j in 0..k {
        let mut h = f64::EPSILON.sqrt() * p[j].abs().max(1.0);
        if p[j] + h > bounds.upper[j] {
            h = -h;
        }
        shifted[j] = p[j] + h;
        for i in 0..n {
            let d = (model(x[i], &shifted) - base[i]) / h;
            if !d.is_finite() {
                return None;
            }
            jac[(i, j)] = d;
        }
        shifted[j] = p[j];
    }
    Some(jac)
}

fn covariance<F: Fn(f64, &[f64]) -> f64>(
    model: &F,
    x: &[f64],
    p: &[f64],
    bounds: &Bounds,
    sse: f64,
    n: usize,
    k: usize,
) -> Result<DMatrix<f64>, FitError> {
    let jac = jacobian(model, x, p, bounds).ok_or(FitError::SingularCovariance)?;
    let jtj = jac.transpose() * &jac;
    let inv = jtj.try_inverse().ok_or(FitError::SingularCovariance)?;
    let cov = inv * (sse / (n - k) as f64);

    let diag_ok = (0..k).all(|j| cov[(j, j)].is_finite() && cov[(j, j)] >= 0.0);
    if !diag_ok || cov.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularCovariance);
    }
    Ok(cov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exp_model(t: f64, p: &[f64]) -> f64 {
        p[0] * (p[1] * t).exp()
    }

    #[test]
    fn recovers_exponential_parameters() {
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&t| exp_model(t, &[0.05, 0.4])).collect();
        let fit = levenberg_marquardt(
            exp_model,
            &x,
            &y,
            &[0.1, 0.1],
            &Bounds::new(vec![0.0, 0.0], vec![5.0, f64::INFINITY]),
            &LmOptions::default(),
        )
        .unwrap();
        assert_relative_eq!(fit.params[0], 0.05, max_relative = 1e-6);
        assert_relative_eq!(fit.params[1], 0.4, max_relative = 1e-6);
    }

    #[test]
    fn respects_box_constraints() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&t| exp_model(t, &[1.0, 0.5])).collect();
        let fit = levenberg_marquardt(
            exp_model,
            &x,
            &y,
            &[1.0, 0.1],
            &Bounds::new(vec![0.0, 0.0], vec![5.0, 0.3]),
            &LmOptions::default(),
        );
        if let Ok(fit) = fit {
            assert!(fit.params[1] <= 0.3 + 1e-12);
        }
    }

    #[test]
    fn noisy_fit_reports_positive_std() {
        let x: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let noise = [0.01, -0.02, 0.015, -0.01, 0.0, 0.02, -0.015, 0.01, -0.005, 0.0, 0.01, -0.02, 0.005, 0.0, -0.01];
        let y: Vec<f64> = x
            .iter()
            .zip(noise)
            .map(|(&t, e)| exp_model(t, &[0.2, 0.2]) * (1.0 + e))
            .collect();
        let fit = levenberg_marquardt(
            exp_model,
            &x,
            &y,
            &[0.5, 0.1],
            &Bounds::unbounded(2),
            &LmOptions::default(),
        )
        .unwrap();
        let std = fit.std_devs();
        assert!(std.iter().all(|s| *s > 0.0 && s.is_finite()));
    }

    #[test]
    fn too_few_points_is_an_error() {
        let err = levenberg_marquardt(
            exp_model,
            &[0.0, 1.0],
            &[1.0, 2.0],
            &[1.0, 1.0],
            &Bounds::unbounded(2),
            &LmOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { .. }));
    }

    #[test]
    fn non_finite_start_is_an_error() {
        let err = levenberg_marquardt(
            |t: f64, p: &[f64]| (p[0] * t).ln(),
            &[-1.0, -2.0, -3.0],
            &[1.0, 2.0, 3.0],
            &[1.0],
            &Bounds::unbounded(1),
            &LmOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::NoConvergence(_)));
    }
}
