//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to TSV/JSON
//! - handed to a presentation layer as-is

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DatasetError;

/// Sample name marking a well that is excluded from all analysis.
pub const SKIP_MARKER: &str = "-";

/// Automatic fitting methods that can be dispatched over a whole dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AutoFitMethod {
    /// Weighted search for the most linear stretch of the log trace.
    ManualLike,
    GompertzTight,
    GompertzConventional,
    LogisticTight,
    LogisticConventional,
    Richards,
    Schnute,
    /// Fixed-width scan for the steepest log-linear window.
    EasyLinear,
}

impl AutoFitMethod {
    pub const ALL: [AutoFitMethod; 8] = [
        AutoFitMethod::ManualLike,
        AutoFitMethod::GompertzTight,
        AutoFitMethod::GompertzConventional,
        AutoFitMethod::LogisticTight,
        AutoFitMethod::LogisticConventional,
        AutoFitMethod::Richards,
        AutoFitMethod::Schnute,
        AutoFitMethod::EasyLinear,
    ];
}

/// How a growth record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FittingMode {
    Manual,
    ManualLike,
    GompertzTight,
    GompertzConventional,
    LogisticTight,
    LogisticConventional,
    Richards,
    Schnute,
    EasyLinear,
}

impl From<AutoFitMethod> for FittingMode {
    fn from(value: AutoFitMethod) -> Self {
        match value {
            AutoFitMethod::ManualLike => FittingMode::ManualLike,
            AutoFitMethod::GompertzTight => FittingMode::GompertzTight,
            AutoFitMethod::GompertzConventional => FittingMode::GompertzConventional,
            AutoFitMethod::LogisticTight => FittingMode::LogisticTight,
            AutoFitMethod::LogisticConventional => FittingMode::LogisticConventional,
            AutoFitMethod::Richards => FittingMode::Richards,
            AutoFitMethod::Schnute => FittingMode::Schnute,
            AutoFitMethod::EasyLinear => FittingMode::EasyLinear,
        }
    }
}

impl FittingMode {
    pub fn display_name(self) -> &'static str {
        match self {
            FittingMode::Manual => "Manual",
            FittingMode::ManualLike => "Manual-like",
            FittingMode::GompertzTight => "Gompertz - tight",
            FittingMode::GompertzConventional => "Gompertz - conventional",
            FittingMode::LogisticTight => "Logistic - tight",
            FittingMode::LogisticConventional => "Logistic - conventional",
            FittingMode::Richards => "Richards",
            FittingMode::Schnute => "Schnute",
            FittingMode::EasyLinear => "Easy Linear",
        }
    }

    /// Which goodness-of-fit measure lands in `GrowthRecord::error`.
    pub fn error_measure(self) -> ErrorMeasure {
        match self {
            FittingMode::Manual | FittingMode::ManualLike | FittingMode::EasyLinear => {
                ErrorMeasure::RSquared
            }
            _ => ErrorMeasure::Rmse,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorMeasure {
    RSquared,
    Rmse,
}

impl ErrorMeasure {
    pub fn label(self) -> &'static str {
        match self {
            ErrorMeasure::RSquared => "R2",
            ErrorMeasure::Rmse => "RMSE",
        }
    }
}

/// Whole-curve sigmoid model families (all fitted on `ln(y / n0)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Gompertz,
    Logistic,
    Richards,
    Schnute,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Gompertz => "Gompertz",
            ModelKind::Logistic => "Logistic",
            ModelKind::Richards => "Richards",
            ModelKind::Schnute => "Schnute",
        }
    }

    /// Number of fitted parameters: `A, mu, l` plus the shape `v` where present.
    pub fn param_count(self) -> usize {
        match self {
            ModelKind::Gompertz | ModelKind::Logistic => 3,
            ModelKind::Richards | ModelKind::Schnute => 4,
        }
    }

    pub fn has_shape(self) -> bool {
        self.param_count() == 4
    }
}

/// Growth parameters for one sample location.
///
/// Every numeric field is `None` until a fit sets it; a failed fit never writes
/// `NaN` here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthRecord {
    pub fitting_mode: Option<FittingMode>,

    /// Start of the exponential phase.
    pub t0: Option<f64>,
    pub t0_std: Option<f64>,
    /// Index into the dataset's time axis (manual and manual-like fits only).
    pub t0_idx: Option<usize>,

    /// End of the exponential phase.
    pub t1: Option<f64>,
    pub t1_std: Option<f64>,
    pub t1_idx: Option<usize>,

    pub mumax: Option<f64>,
    pub mumax_std: Option<f64>,

    /// Doubling time, `ln 2 / mumax`.
    pub dt: Option<f64>,
    pub dt_std: Option<f64>,

    /// `log2(max / min positive)` over the whole blanked curve.
    pub doublings: Option<f64>,
    /// `log2` ratio of the phase endpoints.
    pub doublings_log: Option<f64>,
    pub doublings_log_std: Option<f64>,

    pub carrying_capacity: Option<f64>,
    pub carrying_capacity_std: Option<f64>,
    pub n0: Option<f64>,
    pub v: Option<f64>,
    pub v_std: Option<f64>,

    /// Maximum blanked measurement.
    #[serde(rename = "yield")]
    pub yield_: Option<f64>,

    /// R² for index-style fits, RMSE for whole-curve fits.
    pub error: Option<f64>,

    pub excluded_flag: bool,
    pub smoothing_window: Option<usize>,
}

impl GrowthRecord {
    pub fn is_fitted(&self) -> bool {
        self.fitting_mode.is_some()
    }

    /// Replace every fitted field with `fit`, keeping the user's exclusion flag.
    pub fn overwrite_with(&mut self, fit: GrowthRecord) {
        let excluded = self.excluded_flag;
        *self = fit;
        self.excluded_flag = excluded;
    }
}

/// Drop non-finite numbers so they are stored as "not available".
pub fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Tunables for the manual-like exponential-phase detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualLikeParams {
    /// Moving-average window for the log trace and its derivative.
    pub ws: usize,
    /// Fraction of the maximum smoothed slope that still counts as exponential.
    pub slope_range: f64,
    /// Weight of R² relative to the explained log range.
    pub weight: f64,
    pub min_window_length: usize,
}

impl Default for ManualLikeParams {
    fn default() -> Self {
        Self {
            ws: 10,
            slope_range: 0.6,
            weight: 25.0,
            min_window_length: 3,
        }
    }
}

/// Everything a batch run needs to know besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub method: AutoFitMethod,
    pub manual_like: ManualLikeParams,
    /// Window width (points) for Easy-Linear.
    pub easy_linear_window: usize,
    /// Moving-average window applied to the raw data before blanking.
    pub smoothing_window: Option<usize>,
    /// Largest fraction of blanked points that may be dropped by log filtering.
    pub max_invalid_fraction: f64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            method: AutoFitMethod::GompertzTight,
            manual_like: ManualLikeParams::default(),
            easy_linear_window: 5,
            smoothing_window: None,
            max_invalid_fraction: 0.1,
        }
    }
}

impl AnalysisSettings {
    pub fn validate(&self) -> Result<(), DatasetError> {
        let ml = &self.manual_like;
        if ml.ws == 0 {
            return Err(DatasetError::InvalidSetting(
                "window size needs to be an integer > 0".into(),
            ));
        }
        if !(ml.slope_range > 0.0 && ml.slope_range < 1.0) {
            return Err(DatasetError::InvalidSetting(
                "slope range needs to be a value between 0 and 1".into(),
            ));
        }
        if !(ml.weight.is_finite() && ml.weight > 0.0) {
            return Err(DatasetError::InvalidSetting("weight needs to be a positive value".into()));
        }
        if ml.min_window_length < 3 {
            return Err(DatasetError::InvalidSetting(
                "minimum window length needs to be at least 3".into(),
            ));
        }
        if self.easy_linear_window < 3 {
            return Err(DatasetError::InvalidSetting(
                "Easy-Linear window needs to span at least 3 points".into(),
            ));
        }
        if self.smoothing_window == Some(0) {
            return Err(DatasetError::InvalidSetting(
                "smoothing window size needs to be an integer > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_invalid_fraction) {
            return Err(DatasetError::InvalidSetting(
                "max invalid fraction needs to be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// A point on the plot, e.g. a phase-boundary marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub t: f64,
    pub y: f64,
}

/// Model-evaluated curve for plotting one sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCurve {
    pub location: String,
    pub sample_name: String,
    pub fitting_mode: FittingMode,
    pub t: Vec<f64>,
    pub y: Vec<f64>,
    pub phase_start: Option<CurvePoint>,
    pub phase_end: Option<CurvePoint>,
}

/// A saved set of fitted curves (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub settings: AnalysisSettings,
    pub curves: Vec<FittedCurve>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(AnalysisSettings::default().validate().is_ok());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut s = AnalysisSettings::default();
        s.manual_like.slope_range = 1.0;
        assert!(s.validate().is_err());

        let mut s = AnalysisSettings::default();
        s.manual_like.ws = 0;
        assert!(s.validate().is_err());

        let mut s = AnalysisSettings::default();
        s.smoothing_window = Some(0);
        assert!(s.validate().is_err());
    }

    #[test]
    fn overwrite_keeps_exclusion() {
        let mut record = GrowthRecord {
            excluded_flag: true,
            ..Default::default()
        };
        record.overwrite_with(GrowthRecord {
            mumax: Some(0.4),
            fitting_mode: Some(FittingMode::Manual),
            ..Default::default()
        });
        assert!(record.excluded_flag);
        assert_eq!(record.mumax, Some(0.4));
    }

    #[test]
    fn error_measure_follows_fitting_mode() {
        assert_eq!(FittingMode::EasyLinear.error_measure(), ErrorMeasure::RSquared);
        assert_eq!(FittingMode::Richards.error_measure(), ErrorMeasure::Rmse);
        for m in AutoFitMethod::ALL {
            let mode: FittingMode = m.into();
            assert!(!mode.display_name().is_empty());
        }
    }
}
