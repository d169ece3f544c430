//! Ordinary least squares for straight-line fits.
//!
//! Line fits show up in three places: the manual-like window search, the
//! Easy-Linear scan and R² scoring of exponential fits. All of them need the
//! slope/intercept covariance as well as the point estimate, so the fit is solved
//! with an explicit design matrix and the parameter covariance is scaled by the
//! residual variance (`σ² (XᵀX)⁻¹`, `σ² = SSR / (n − 2)`).

use nalgebra::{DMatrix, DVector, Matrix2};

use crate::error::FitError;
use crate::math::stats::r_squared;

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Result of fitting `y = slope * x + intercept`.
#[derive(Debug, Clone)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Covariance of `(slope, intercept)`.
    pub covariance: Matrix2<f64>,
    /// Coefficient of determination; `None` when `y` has zero variance.
    pub r_squared: Option<f64>,
}

impl LineFit {
    pub fn slope_std(&self) -> f64 {
        self.covariance[(0, 0)].max(0.0).sqrt()
    }

    pub fn intercept_std(&self) -> f64 {
        self.covariance[(1, 1)].max(0.0).sqrt()
    }
}

/// Fit a straight line to `(x, y)`.
///
/// Needs at least three points so the residual variance has a degree of freedom.
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LineFit, FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch(x.len(), y.len()));
    }
    let n = x.len();
    if n < 3 {
        return Err(FitError::InsufficientData { needed: 3, have: n });
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(FitError::Degenerate("non-finite value in line fit".into()));
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    for (i, &xi) in x.iter().enumerate() {
        design[(i, 0)] = xi;
        design[(i, 1)] = 1.0;
    }
    let obs = DVector::from_column_slice(y);

    let beta = solve_least_squares(&design, &obs)
        .ok_or_else(|| FitError::Degenerate("line fit is ill-conditioned".into()))?;
    let (slope, intercept) = (beta[0], beta[1]);

    let ssr: f64 = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let r = yi - (slope * xi + intercept);
            r * r
        })
        .sum();

    let xtx = design.transpose() * &design;
    let xtx = Matrix2::new(xtx[(0, 0)], xtx[(0, 1)], xtx[(1, 0)], xtx[(1, 1)]);
    let inv = xtx
        .try_inverse()
        .ok_or_else(|| FitError::Degenerate("all x values are identical".into()))?;
    let covariance = inv * (ssr / (n as f64 - 2.0));
    if covariance.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SingularCovariance);
    }

    Ok(LineFit {
        slope,
        intercept,
        covariance,
        r_squared: r_squared(x, y, slope, intercept),
    })
}
