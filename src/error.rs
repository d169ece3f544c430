//! Error types.
//!
//! - `AppError` is the boundary error printed by the binary (message + exit code).
//! - `FitError` is a per-sample "no fit" reason. The fitting core never panics on
//!   bad data; it returns one of these and the caller decides whether to skip.
//! - `DatasetError` covers input validation and data-integrity problems that are
//!   rejected before any fitting starts.

use thiserror::Error;

/// Exit code for invalid input, configuration or data-integrity problems.
pub const EXIT_INPUT: u8 = 2;
/// Exit code when nothing is left to analyse.
pub const EXIT_EMPTY: u8 = 3;
/// Exit code for internal or numerical failures.
pub const EXIT_INTERNAL: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(EXIT_INTERNAL, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a sample (or a single window) could not be fitted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("not enough data points: need {needed}, have {have}")]
    InsufficientData { needed: usize, have: usize },
    #[error("too many invalid points after log filtering: {invalid} of {total}")]
    TooManyInvalid { invalid: usize, total: usize },
    #[error("non-positive values cannot be log-transformed")]
    NonPositive,
    #[error("no exponential phase candidate region found")]
    NoCandidateRegion,
    #[error("candidate region of length {length} is shorter than the minimum window {min}")]
    WindowTooShort { length: usize, min: usize },
    #[error("degenerate window: {0}")]
    Degenerate(String),
    #[error("solver did not converge: {0}")]
    NoConvergence(String),
    #[error("covariance matrix is singular or non-finite")]
    SingularCovariance,
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("length mismatch: {0} timestamps vs {1} values")]
    LengthMismatch(usize, usize),
}

impl FitError {
    /// Programming-invariant violations abort a batch; everything else only skips a sample.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FitError::LengthMismatch(..))
    }
}

/// Input validation and data-integrity failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    #[error("duplicate sample name '{0}': sample names need to be unique (append a replicate number, e.g. 'test 5')")]
    DuplicateName(String),
    #[error("unknown sample '{0}'")]
    UnknownSample(String),
    #[error("invalid blank reference '{0}': blanks need to be existing, non-skipped samples")]
    InvalidBlank(String),
    #[error("sample '{sample}' has {got} values but the dataset has {expected} timestamps")]
    RaggedRow {
        sample: String,
        expected: usize,
        got: usize,
    },
    #[error("timestamps must be finite and strictly increasing")]
    InvalidTimestamps,
    #[error("dataset contains no samples")]
    Empty,
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

impl From<DatasetError> for AppError {
    fn from(err: DatasetError) -> Self {
        match err {
            DatasetError::Empty => AppError::new(EXIT_EMPTY, err.to_string()),
            _ => AppError::input(err.to_string()),
        }
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::internal(format!("Fit failed: {err}"))
    }
}
