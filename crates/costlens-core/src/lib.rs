//! # costlens-core
//!
//! Shared ambient concerns for costlens crates.
//!
//! This crate provides:
//! - [`CoreError`] - Errors raised while loading configuration or setting up logging
//! - [`logging`] - Tracing setup and log directory helpers
//! - [`config`] - YAML-backed [`AnalyzerConfig`]
//!
//! ## Example
//!
//! ```no_run
//! use costlens_core::{AnalyzerConfig, logging};
//!
//! fn main() -> costlens_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!     let config = AnalyzerConfig::load_or_default("costlens.yaml")?;
//!     tracing::info!(root = %config.sessions_root.display(), "configured");
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;

pub use config::{AnalyzerConfig, DEFAULT_MIN_DAYS};
pub use error::{CoreError, Result};
pub use logging::{LogGuard, init_logging};
