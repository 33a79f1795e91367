//! Error types for the analysis pipeline.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Analysis pipeline errors.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Directory listing or file access failed for a reason other than absence
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A session file could not be read to the end
    #[error("failed to parse {path}: {message}")]
    FileParse {
        /// Session file path
        path: PathBuf,
        /// Human-readable cause
        message: String,
    },

    /// JSON (de)serialization of an analysis artifact
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background parse task panicked or was cancelled
    #[error("parse task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl AnalysisError {
    /// Create an IO error for a path.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns true if this error aborts the whole run.
    ///
    /// Per-file parse failures are downgraded to warnings by the parser.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::FileParse { .. })
    }

    /// Create a user-friendly message for this error.
    pub fn friendly_message(&self) -> String {
        match self {
            AnalysisError::Io { path, source } => match source.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    format!("Permission denied reading {}. Check file permissions.", path.display())
                }
                _ => format!("File system error at {}: {}", path.display(), source),
            },
            _ => format!("Error: {}", self),
        }
    }
}

/// Result type for analysis operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
