//! Analyzer configuration.
//!
//! Loaded from YAML; every field has a default so an absent or partial file
//! is valid. Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::logging::costlens_home;

/// Default minimum span of log data, in days, before recommendations are
/// considered well supported.
pub const DEFAULT_MIN_DAYS: u32 = 14;

/// Configuration for a costlens analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Root directory holding one subdirectory per agent
    pub sessions_root: PathBuf,

    /// Name of the per-agent directory containing session logs
    pub sessions_dir: String,

    /// Extension (without dot) of session log files
    pub log_extension: String,

    /// Minimum days of data before the freshness warning is suppressed
    pub min_days: u32,

    /// Where to write the Analysis JSON (None prints it to stdout)
    pub output: Option<PathBuf>,

    /// Parse session files concurrently
    pub parallel: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let output = costlens_home().ok().map(|dir| dir.join("analysis.json"));

        Self {
            sessions_root: home.join(".openclaw").join("agents"),
            sessions_dir: "sessions".to_string(),
            log_extension: "jsonl".to_string(),
            min_days: DEFAULT_MIN_DAYS,
            output,
            parallel: true,
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::config_not_found_with_source(path, e)
            } else {
                CoreError::io("reading config", path, e)
            }
        })?;

        let config: Self =
            serde_yaml::from_str(&contents).map_err(|e| CoreError::ConfigInvalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is missing.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path) {
            Err(CoreError::ConfigNotFound { path, .. }) => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Check field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.min_days == 0 {
            return Err(CoreError::validation("min_days must be at least 1"));
        }
        if self.sessions_dir.trim().is_empty() {
            return Err(CoreError::validation("sessions_dir must not be empty"));
        }
        if self.log_extension.trim().is_empty() {
            return Err(CoreError::validation("log_extension must not be empty"));
        }
        Ok(())
    }

    /// Set the sessions root directory.
    pub fn with_sessions_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sessions_root = root.into();
        self
    }

    /// Set the minimum number of days.
    pub fn with_min_days(mut self, min_days: u32) -> Self {
        self.min_days = min_days;
        self
    }

    /// Set the output path.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Enable or disable concurrent parsing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}
