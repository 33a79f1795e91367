//! End-to-end entry points chaining parser, classifier, aggregator, and
//! recommender.

use crate::aggregator::aggregate;
use crate::classifier::classify_tasks;
use crate::error::Result;
use crate::models::{Analysis, Task};
use crate::parser::{LogParser, ParseOptions, ParseOutput};
use std::path::{Path, PathBuf};

/// Analysis plus the parse diagnostics that produced it.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub analysis: Analysis,
    pub files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

/// Aggregate and recommend over an already-classified batch.
pub fn analyze(tasks: &[Task]) -> Analysis {
    crate::recommender::recommend(&aggregate(tasks))
}

fn finish(parsed: ParseOutput) -> PipelineOutput {
    let classified = classify_tasks(&parsed.tasks);
    PipelineOutput {
        analysis: analyze(&classified),
        files: parsed.files,
        warnings: parsed.warnings,
    }
}

/// Run the full pipeline over a sessions root.
pub fn run<P: AsRef<Path>>(root: P, options: &ParseOptions) -> Result<PipelineOutput> {
    let parsed = LogParser::with_options(options.clone()).parse_root(root)?;
    Ok(finish(parsed))
}

/// Run the full pipeline, parsing session files concurrently.
pub async fn run_concurrent<P: AsRef<Path>>(
    root: P,
    options: &ParseOptions,
) -> Result<PipelineOutput> {
    let parsed = LogParser::with_options(options.clone())
        .parse_root_concurrent(root)
        .await?;
    Ok(finish(parsed))
}
