//! Logging infrastructure for costlens.
//!
//! Structured logging through the `tracing` ecosystem:
//!
//! - JSON lines written to a daily-rolled file under `~/.costlens/logs/`
//! - Compact human-readable output on stderr
//! - `RUST_LOG` overrides the default `costlens=info` filter
//!
//! ## Example
//!
//! ```no_run
//! use costlens_core::logging;
//!
//! let _guard = logging::init_logging(None, false).expect("logging init");
//!
//! tracing::info!("analysis started");
//! tracing::debug!(file = "agents/main/sessions/a.jsonl", "parsing");
//! ```

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::error::{CoreError, Result};

/// Name of the rolling log file inside the log directory.
pub const LOG_FILE_NAME: &str = "costlens.log";

/// Guard that must be held to ensure log flushing on shutdown.
///
/// Dropping it flushes pending file log entries.
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the costlens logging system.
///
/// Sets up JSON file logging in `log_dir` (defaults to `~/.costlens/logs/`)
/// and compact console logging on stderr. `verbose` raises the default level
/// from INFO to DEBUG.
///
/// The returned [`LogGuard`] must be held for the lifetime of the process.
pub fn init_logging(log_dir: Option<PathBuf>, verbose: bool) -> Result<LogGuard> {
    let log_dir = match log_dir {
        Some(dir) => dir,
        None => default_log_dir()?,
    };

    std::fs::create_dir_all(&log_dir).map_err(|e| CoreError::DirectoryCreation {
        path: log_dir.clone(),
        source: e,
    })?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("costlens={default_level}")));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .json()
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_span_list(true);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| CoreError::internal(format!("failed to install subscriber: {e}")))?;

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: Some(file_guard),
    })
}

/// Initialize minimal console-only logging for tests.
///
/// Safe to call from many tests; only the first call installs a subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// Base directory for costlens state: `~/.costlens/`.
pub fn costlens_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| CoreError::Internal {
        message: "HOME environment variable not set".into(),
    })?;

    Ok(PathBuf::from(home).join(".costlens"))
}

/// Get the default log directory path: `~/.costlens/logs/`.
pub fn default_log_dir() -> Result<PathBuf> {
    Ok(costlens_home()?.join("logs"))
}
