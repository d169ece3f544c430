//! Exponential fits over a sub-window of a blanked trace.
//!
//! Used by manual selections and by the manual-like detector: the model
//! `n0 * exp(mu * t)` is fitted to the raw (not log-transformed) blanked values so
//! that `mu` and its covariance come from the same least-squares problem that a
//! user would see plotted. R² is computed on the log scale.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::data::BlankedTrace;
use crate::error::FitError;
use crate::math::{Bounds, LmOptions, fit_line, levenberg_marquardt, r_squared};
use crate::models::exponential;

/// Bounds for `[n0, mu]` on a user selection.
pub fn manual_bounds() -> Bounds {
    Bounds::new(vec![0.0, 0.0], vec![5.0, f64::INFINITY])
}

/// Bounds for `[n0, mu]` on a detected manual-like window.
pub fn manual_like_bounds() -> Bounds {
    Bounds::new(vec![0.0, 0.001], vec![5.0, 2.0])
}

#[derive(Debug, Clone)]
pub struct ExponentialFit {
    pub n0: f64,
    pub mu: f64,
    /// Covariance of `(n0, mu)`.
    pub covariance: DMatrix<f64>,
    /// R² of `ln y` against `ln n0 + mu t`.
    pub r_squared: Option<f64>,
}

impl ExponentialFit {
    pub fn mu_std(&self) -> f64 {
        self.covariance[(1, 1)].max(0.0).sqrt()
    }
}

/// Fit `n0 * exp(mu * t)` to strictly positive `(t, y)`.
pub fn fit_exponential(t: &[f64], y: &[f64], bounds: &Bounds) -> Result<ExponentialFit, FitError> {
    if t.len() != y.len() {
        return Err(FitError::LengthMismatch(t.len(), y.len()));
    }
    if t.len() < 3 {
        return Err(FitError::InsufficientData {
            needed: 3,
            have: t.len(),
        });
    }
    if y.iter().any(|v| !(*v > 0.0)) {
        return Err(FitError::NonPositive);
    }

    let ln_y: Vec<f64> = y.iter().map(|v| v.ln()).collect();
    let p0 = match fit_line(t, &ln_y) {
        Ok(line) => vec![
            line.intercept.exp().clamp(bounds.lower[0], bounds.upper[0]),
            line.slope.clamp(bounds.lower[1], bounds.upper[1]),
        ],
        Err(_) => vec![
            y[0].clamp(bounds.lower[0], bounds.upper[0]),
            0.1f64.clamp(bounds.lower[1], bounds.upper[1]),
        ],
    };

    let fit = levenberg_marquardt(
        |x, p| exponential(x, p[0], p[1]),
        t,
        y,
        &p0,
        bounds,
        &LmOptions::default(),
    )?;
    let (n0, mu) = (fit.params[0], fit.params[1]);
    let r2 = if n0 > 0.0 {
        r_squared(t, &ln_y, mu, n0.ln())
    } else {
        None
    };

    Ok(ExponentialFit {
        n0,
        mu,
        covariance: fit.covariance,
        r_squared: r2,
    })
}

/// A user selection of the exponential phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Selection {
    /// Inclusive range of dataset time-axis indices.
    Indices { start: usize, end: usize },
    /// Rectangle drawn on the plot, in time and blanked-value units.
    Rectangle {
        t_min: f64,
        t_max: f64,
        y_min: f64,
        y_max: f64,
    },
}

/// Resolve a selection to inclusive positions `(start, end)` within `trace`.
///
/// For a rectangle the start is the first point at or after `t_min` with a value
/// at least `y_min`; the end is the last point at or before `t_max` with a value
/// at most `y_max`.
pub fn resolve_selection(trace: &BlankedTrace, selection: &Selection) -> Result<(usize, usize), FitError> {
    let (start, end) = match *selection {
        Selection::Indices { start, end } => {
            let s = trace.position_of(start).ok_or_else(|| {
                FitError::InvalidSelection(format!("time index {start} has no valid blanked value"))
            })?;
            let e = trace.position_of(end).ok_or_else(|| {
                FitError::InvalidSelection(format!("time index {end} has no valid blanked value"))
            })?;
            (s, e)
        }
        Selection::Rectangle {
            t_min,
            t_max,
            y_min,
            y_max,
        } => {
            let s = (0..trace.len())
                .find(|&i| trace.t[i] >= t_min && trace.y[i] >= y_min)
                .ok_or_else(|| FitError::InvalidSelection("no point inside the selection".into()))?;
            let e = (0..trace.len())
                .rev()
                .find(|&i| trace.t[i] <= t_max && trace.y[i] <= y_max)
                .ok_or_else(|| FitError::InvalidSelection("no point inside the selection".into()))?;
            (s, e)
        }
    };

    if end <= start {
        return Err(FitError::InvalidSelection(format!(
            "selection end ({end}) must come after its start ({start})"
        )));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn exp_trace() -> BlankedTrace {
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let y = t.iter().map(|&x| 0.02 * (0.4 * x).exp()).collect();
        BlankedTrace {
            index: (0..t.len()).collect(),
            t,
            y,
        }
    }

    #[test]
    fn recovers_noise_free_exponential() {
        let tr = exp_trace();
        let fit = fit_exponential(&tr.t, &tr.y, &manual_bounds()).unwrap();
        assert_relative_eq!(fit.mu, 0.4, max_relative = 1e-6);
        assert_relative_eq!(fit.n0, 0.02, max_relative = 1e-6);
        assert_relative_eq!(fit.r_squared.unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn manual_like_bounds_cap_growth_rate() {
        let t: Vec<f64> = (0..10).map(f64::from).collect();
        let y: Vec<f64> = t.iter().map(|&x| 0.01 * (3.0 * x).exp()).collect();
        let fit = fit_exponential(&t, &y, &manual_like_bounds()).unwrap();
        assert!(fit.mu <= 2.0 + 1e-12);
    }

    #[test]
    fn rejects_short_or_non_positive_windows() {
        assert!(matches!(
            fit_exponential(&[0.0, 1.0], &[0.1, 0.2], &manual_bounds()),
            Err(FitError::InsufficientData { .. })
        ));
        assert_eq!(
            fit_exponential(&[0.0, 1.0, 2.0], &[0.1, -0.2, 0.3], &manual_bounds()).unwrap_err(),
            FitError::NonPositive
        );
    }

    #[test]
    fn rectangle_selection_uses_first_and_last_matching_points() {
        let tr = exp_trace();
        let sel = Selection::Rectangle {
            t_min: 1.0,
            t_max: 6.0,
            y_min: 0.0,
            y_max: 10.0,
        };
        assert_eq!(resolve_selection(&tr, &sel).unwrap(), (2, 12));

        // The y bound moves the start forward past low values.
        let sel = Selection::Rectangle {
            t_min: 0.0,
            t_max: 6.0,
            y_min: 0.03,
            y_max: 10.0,
        };
        let (s, _) = resolve_selection(&tr, &sel).unwrap();
        assert!(tr.y[s] >= 0.03 && tr.y[s - 1] < 0.03);
    }

    #[test]
    fn index_selection_maps_through_dropped_points() {
        let mut tr = exp_trace();
        tr.t.remove(3);
        tr.y.remove(3);
        tr.index.remove(3);
        assert_eq!(
            resolve_selection(&tr, &Selection::Indices { start: 4, end: 10 }).unwrap(),
            (3, 9)
        );
        assert!(resolve_selection(&tr, &Selection::Indices { start: 3, end: 10 }).is_err());
        assert!(resolve_selection(&tr, &Selection::Indices { start: 10, end: 4 }).is_err());
    }
}
