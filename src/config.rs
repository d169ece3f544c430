//! Settings file support.
//!
//! A TOML file may provide any subset of the analysis settings plus a default
//! blank list. Missing fields fall back to the built-in defaults; command-line
//! flags are applied on top by the caller.
//!
//! ```toml
//! method = "manual-like"
//! easy_linear_window = 7
//! smoothing_window = 5
//! default_blanks = ["blank 1", "blank 2"]
//!
//! [manual_like]
//! ws = 8
//! weight = 30.0
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::AnalysisSettings;
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub analysis: AnalysisSettings,
    /// Blank references (names or locations) applied to every sample.
    pub default_blanks: Option<Vec<String>>,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        toml::from_str(text).map_err(|e| AppError::input(format!("Invalid settings file: {e}")))
    }

    /// Load `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .map_err(|e| AppError::input(format!("Failed to read settings '{}': {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        debug!(path = %path.display(), "loaded settings file");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AutoFitMethod;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = Config::from_toml(
            r#"
            method = "easy-linear"
            default_blanks = ["A1", "A2"]

            [manual_like]
            weight = 30.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.method, AutoFitMethod::EasyLinear);
        assert_eq!(cfg.analysis.manual_like.weight, 30.0);
        assert_eq!(cfg.analysis.manual_like.ws, 10);
        assert_eq!(cfg.analysis.easy_linear_window, 5);
        assert_eq!(cfg.default_blanks.as_deref(), Some(&["A1".to_string(), "A2".to_string()][..]));
    }

    #[test]
    fn bad_values_are_input_errors() {
        let err = Config::from_toml("method = \"cubic\"").unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "smoothing_window = 4").unwrap();
        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.analysis.smoothing_window, Some(4));
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
