//! Easy-Linear: the steepest fixed-width log-linear window.

use rayon::prelude::*;

use crate::error::FitError;
use crate::math::{LineFit, fit_line};

#[derive(Debug, Clone)]
pub struct EasyLinearFit {
    /// First position of the winning window in the analysed trace.
    pub start: usize,
    /// Last position (inclusive).
    pub end: usize,
    /// Line through `(t, ln y)` over the window.
    pub line: LineFit,
}

/// Fit a line to every window of `width` consecutive points of `ln y` and keep
/// the one with the largest slope. Ties go to the earliest window.
pub fn easy_linear(t: &[f64], y: &[f64], width: usize) -> Result<EasyLinearFit, FitError> {
    if t.len() != y.len() {
        return Err(FitError::LengthMismatch(t.len(), y.len()));
    }
    if y.iter().any(|v| !(*v > 0.0)) {
        return Err(FitError::NonPositive);
    }
    if width < 3 || width > y.len() {
        return Err(FitError::InsufficientData {
            needed: width.max(3),
            have: y.len(),
        });
    }

    let y_log: Vec<f64> = y.iter().map(|v| v.ln()).collect();
    let fits: Vec<(usize, LineFit)> = (0..=y.len() - width)
        .into_par_iter()
        .filter_map(|start| {
            let end = start + width;
            let line = fit_line(&t[start..end], &y_log[start..end]).ok()?;
            line.slope.is_finite().then_some((start, line))
        })
        .collect();

    let mut best: Option<&(usize, LineFit)> = None;
    for candidate in &fits {
        match best {
            Some((_, b)) if b.slope >= candidate.1.slope => {}
            _ => best = Some(candidate),
        }
    }
    let (start, line) = best
        .cloned()
        .ok_or_else(|| FitError::Degenerate("no window could be fitted".into()))?;

    Ok(EasyLinearFit {
        start,
        end: start + width - 1,
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn picks_steepest_window() {
        let t: Vec<f64> = (0..12).map(f64::from).collect();
        // Slope 0.1 until t = 5, then 0.5 until t = 9, then flat.
        let ln_y: Vec<f64> = t
            .iter()
            .map(|&x| {
                if x <= 5.0 {
                    0.1 * x
                } else if x <= 9.0 {
                    0.5 + 0.5 * (x - 5.0)
                } else {
                    2.5
                }
            })
            .collect();
        let y: Vec<f64> = ln_y.iter().map(|v| 0.01 * v.exp()).collect();

        let fit = easy_linear(&t, &y, 5).unwrap();
        assert_eq!((fit.start, fit.end), (5, 9));
        assert_relative_eq!(fit.line.slope, 0.5, epsilon = 1e-9);
        let r2 = fit.line.r_squared.unwrap();
        assert!((0.0..=1.0 + 1e-12).contains(&r2));
    }

    #[test]
    fn window_longer_than_trace_is_rejected() {
        let err = easy_linear(&[0.0, 1.0, 2.0], &[0.1, 0.2, 0.3], 5).unwrap_err();
        assert!(matches!(err, FitError::InsufficientData { needed: 5, have: 3 }));
    }
}
