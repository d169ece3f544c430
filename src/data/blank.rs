//! Blank subtraction and log-domain filtering.
//!
//! A blanked trace keeps the time axis, the blanked values and the index of every
//! point on the dataset time axis together, so later filtering can never shift
//! timestamps against values.

use crate::error::FitError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlankedTrace {
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    /// Position of each point on the dataset time axis.
    pub index: Vec<usize>,
}

impl BlankedTrace {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Keep only points that can be log-transformed.
    pub fn positive(&self) -> BlankedTrace {
        let mut out = BlankedTrace::default();
        for i in 0..self.len() {
            if self.y[i] > 0.0 {
                out.t.push(self.t[i]);
                out.y.push(self.y[i]);
                out.index.push(self.index[i]);
            }
        }
        out
    }

    /// Positive points, provided at most `max_invalid_fraction` of the trace was dropped.
    pub fn log_ready(&self, max_invalid_fraction: f64) -> Result<BlankedTrace, FitError> {
        if self.is_empty() {
            return Err(FitError::InsufficientData { needed: 1, have: 0 });
        }
        let positive = self.positive();
        let invalid = self.len() - positive.len();
        if invalid as f64 > max_invalid_fraction * self.len() as f64 {
            return Err(FitError::TooManyInvalid {
                invalid,
                total: self.len(),
            });
        }
        Ok(positive)
    }

    /// Position in this trace of a dataset time-axis index.
    pub fn position_of(&self, source_idx: usize) -> Option<usize> {
        self.index.binary_search(&source_idx).ok()
    }

    pub fn max_value(&self) -> Option<f64> {
        self.y.iter().copied().fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
    }

    pub fn min_positive(&self) -> Option<f64> {
        self.y
            .iter()
            .copied()
            .filter(|v| *v > 0.0)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.min(v))))
    }

    /// `log2(max / min positive)` over the whole trace.
    pub fn doublings(&self) -> Option<f64> {
        let max = self.max_value()?;
        let min = self.min_positive()?;
        let d = (max / min).log2();
        d.is_finite().then_some(d)
    }
}

/// Position-wise mean over blank traces, ignoring missing values.
pub fn mean_trace(blanks: &[&[Option<f64>]], len: usize) -> Vec<Option<f64>> {
    (0..len)
        .map(|i| {
            let present: Vec<f64> = blanks.iter().filter_map(|b| b.get(i).copied().flatten()).collect();
            (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64)
        })
        .collect()
}

/// Subtract the mean blank trace from `values`, dropping positions missing in either.
///
/// With no blanks the trace is passed through unchanged (gaps still dropped).
pub fn blank_trace(
    times: &[f64],
    values: &[Option<f64>],
    blanks: &[&[Option<f64>]],
) -> Result<BlankedTrace, FitError> {
    if times.len() != values.len() {
        return Err(FitError::LengthMismatch(times.len(), values.len()));
    }
    if let Some(b) = blanks.iter().find(|b| b.len() != times.len()) {
        return Err(FitError::LengthMismatch(times.len(), b.len()));
    }

    let background = if blanks.is_empty() {
        vec![Some(0.0); times.len()]
    } else {
        mean_trace(blanks, times.len())
    };

    let mut out = BlankedTrace::default();
    for (i, (&t, (v, b))) in times.iter().zip(values.iter().zip(&background)).enumerate() {
        if let (Some(v), Some(b)) = (v, b) {
            let y = v - b;
            if y.is_finite() {
                out.t.push(t);
                out.y.push(y);
                out.index.push(i);
            }
        }
    }
    Ok(out)
}
