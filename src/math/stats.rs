//! Small numerical helpers: goodness of fit, summary statistics and the two
//! moving-average filters used by the pipeline.
//!
//! There are two distinct smoothers on purpose:
//!
//! - `rolling_mean` is the dataset-level smoother. It is centered, skips missing
//!   values and shrinks at the edges (a window only needs one present value).
//! - `uniform_filter` is the detector's smoother. It is a centered box filter
//!   over a dense series that extends the edges by half-sample reflection
//!   (`d c b a | a b c d | d c b a`), so every output averages exactly `size`
//!   samples.

/// Coefficient of determination of a straight-line fit.
///
/// Returns `None` when `SS_tot == 0` (constant `y`) or the inputs are unusable.
pub fn r_squared(x: &[f64], y: &[f64], slope: f64, intercept: f64) -> Option<f64> {
    if x.len() != y.len() || y.is_empty() {
        return None;
    }
    let y_mean = mean(y)?;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let r = yi - (slope * xi + intercept);
        ss_res += r * r;
        ss_tot += (yi - y_mean) * (yi - y_mean);
    }
    if ss_tot == 0.0 || !ss_tot.is_finite() {
        return None;
    }
    let r2 = 1.0 - ss_res / ss_tot;
    r2.is_finite().then_some(r2)
}

/// Root-mean-square error between two equal-length sequences.
pub fn rmse(observed: &[f64], predicted: &[f64]) -> Option<f64> {
    if observed.len() != predicted.len() || observed.is_empty() {
        return None;
    }
    let sse: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(o, p)| (p - o) * (p - o))
        .sum();
    let out = (sse / observed.len() as f64).sqrt();
    out.is_finite().then_some(out)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (`ddof = 0`).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Mean and population standard deviation of the available values.
pub fn mean_std_present(values: &[Option<f64>]) -> (Option<f64>, Option<f64>) {
    let present: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
    (mean(&present), population_std(&present))
}

/// First difference `out[i] = values[i + 1] - values[i]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Centered rolling mean that ignores missing values.
///
/// For even windows the extra sample sits on the left, so position `i` averages
/// `[i - size/2, i + (size - 1)/2]`. Edge windows are truncated rather than padded.
pub fn rolling_mean(values: &[Option<f64>], size: usize) -> Vec<Option<f64>> {
    let size = size.max(1);
    let n = values.len();
    let left = size / 2;
    let right = (size - 1) / 2;

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(left);
            let hi = (i + right).min(n.saturating_sub(1));
            let (sum, count) = values[lo..=hi]
                .iter()
                .flatten()
                .filter(|v| v.is_finite())
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// Centered box filter with half-sample reflection at the edges.
pub fn uniform_filter(values: &[f64], size: usize) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let size = size.max(1);
    let left = (size / 2) as isize;

    (0..n as isize)
        .map(|i| {
            let start = i - left;
            let sum: f64 = (start..start + size as isize)
                .map(|j| values[reflect_index(j, n)])
                .sum();
            sum / size as f64
        })
        .collect()
}

/// Map an out-of-range index onto `0..n` by half-sample symmetric reflection.
fn reflect_index(mut j: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    j = j.rem_euclid(period);
    if j >= n {
        j = period - 1 - j;
    }
    j as usize
}
