//! # costlens-analysis
//!
//! Usage analysis for AI coding-agent session logs.
//!
//! The pipeline has four stages, each a pure function of its input:
//! - [`LogParser`] - Stream session logs into [`Task`] records
//! - [`Classifier`] - Assign each task a [`Category`] by keyword matching
//! - [`aggregate`] - Roll tasks up into an [`Analysis`]
//! - [`recommend`] - Enrich an analysis with savings recommendations
//!
//! ## Session Log Format
//!
//! One JSON record per line under `<root>/<agent>/sessions/*.jsonl`:
//!
//! ```text
//! {"type":"message","message":{"role":"user","content":"fix the failing test"}}
//! {"type":"message","message":{"role":"assistant","model":"claude-sonnet-4-5",
//!   "content":[{"type":"text","text":"..."}],
//!   "usage":{"input":1200,"output":300,"cacheRead":8000,"cacheWrite":0,"cost":{"total":0.012}},
//!   "timestamp":1767225600000}}
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use costlens_analysis::{ParseOptions, pipeline};
//!
//! fn main() -> anyhow::Result<()> {
//!     let output = pipeline::run("/home/me/.openclaw/agents", &ParseOptions::default())?;
//!     for warning in &output.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     println!("{}", output.analysis.to_json_pretty()?);
//!     Ok(())
//! }
//! ```

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod recommender;

// Re-export main types
pub use aggregator::aggregate;
pub use classifier::{Classifier, classify_task, classify_tasks};
pub use error::{AnalysisError, Result};
pub use models::{Analysis, Category, Period, Task, TokenUsage};
pub use parser::{LogParser, LogRecord, ParseOptions, ParseOutput, decode_line};
pub use pipeline::{PipelineOutput, analyze};
pub use recommender::recommend;
