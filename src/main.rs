//! costlens - usage analysis for AI coding-agent session logs
//!
//! ## Usage
//!
//! ```bash
//! # Analyse ~/.openclaw/agents and write ~/.costlens/analysis.json
//! costlens
//!
//! # Custom sessions root and output file, verbose logging
//! costlens --root /srv/agents --output analysis.json -v
//!
//! # Load settings from a YAML file
//! costlens --config costlens.yaml
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use costlens_analysis::{Analysis, AnalysisError, ParseOptions, PipelineOutput, pipeline};
use costlens_core::{AnalyzerConfig, CoreError, LogGuard, init_logging};
use tracing::{error, info, warn};

/// Analyse session logs and recommend cost optimizations
#[derive(Parser, Debug)]
#[command(name = "costlens")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sessions root (one subdirectory per agent)
    #[arg(long)]
    root: Option<PathBuf>,

    /// Minimum days of data before the freshness warning is suppressed
    #[arg(long)]
    min_days: Option<u32>,

    /// Where to write the analysis JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Parse session files one at a time
    #[arg(long)]
    sequential: bool,

    /// Directory for log files (defaults to ~/.costlens/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("costlens failed: {:#}", e);
            report(&e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Exit status for a bad configuration file or flag value.
const EXIT_CONFIG: u8 = 2;

fn exit_code(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<CoreError>() {
        Some(core) if core.is_config_error() => EXIT_CONFIG,
        _ => 1,
    }
}

/// Print an error with whatever guidance the library error carries.
fn report(e: &anyhow::Error) {
    if let Some(analysis) = e.downcast_ref::<AnalysisError>() {
        eprintln!("Error: {}", analysis.friendly_message());
        return;
    }

    eprintln!("Error: {:#}", e);
    if let Some(hint) = e.downcast_ref::<CoreError>().and_then(CoreError::guidance) {
        eprintln!("Hint: {hint}");
    }
}

/// Set up logging based on CLI arguments.
fn setup_logging(cli: &Cli) -> costlens_core::Result<LogGuard> {
    init_logging(cli.log_dir.clone(), cli.verbose > 0)
}

/// Load the config file (if any) and apply CLI overrides.
fn load_config(cli: &Cli) -> anyhow::Result<AnalyzerConfig> {
    let mut config = match &cli.config {
        Some(path) => AnalyzerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    if let Some(root) = &cli.root {
        config = config.with_sessions_root(root);
    }
    if let Some(min_days) = cli.min_days {
        config = config.with_min_days(min_days);
    }
    if let Some(output) = &cli.output {
        config = config.with_output(output);
    }
    if cli.sequential {
        config = config.with_parallel(false);
    }

    config.validate()?;
    Ok(config)
}

fn parse_options(config: &AnalyzerConfig) -> ParseOptions {
    ParseOptions {
        sessions_dir: config.sessions_dir.clone(),
        log_extension: config.log_extension.clone(),
        min_days: config.min_days,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let options = parse_options(&config);
    let root = &config.sessions_root;

    info!(root = %root.display(), parallel = config.parallel, "starting analysis");

    let PipelineOutput {
        analysis,
        files,
        warnings,
    } = if config.parallel {
        pipeline::run_concurrent(root, &options).await
    } else {
        pipeline::run(root, &options)
    }
    .with_context(|| format!("analysing {}", root.display()))?;

    for warning in &warnings {
        warn!("{warning}");
        eprintln!("warning: {warning}");
    }

    emit(
        &analysis,
        files.len(),
        config.output.as_deref(),
        &mut std::io::stdout().lock(),
        &mut std::io::stderr().lock(),
    )
}

/// Write the analysis JSON and a short summary.
///
/// The summary goes to stderr whenever the JSON itself is written to stdout.
fn emit(
    analysis: &Analysis,
    files: usize,
    output: Option<&Path>,
    stdout: &mut impl Write,
    stderr: &mut impl Write,
) -> anyhow::Result<()> {
    let json = analysis.to_json_pretty()?;

    let summary_out: &mut dyn Write = match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(path, &json).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), files, "wrote analysis");
            stdout
        }
        None => {
            writeln!(stdout, "{json}")?;
            stderr
        }
    };

    writeln!(
        summary_out,
        "Analysed {} tasks from {} files: ${:.2} total, ${:.2}/month projected",
        analysis.summary.total_tasks,
        files,
        analysis.summary.total_cost,
        analysis.summary.current_monthly_cost
    )?;
    if let Some(savings) = analysis.summary.potential_savings {
        writeln!(summary_out, "Potential savings: ${savings:.2}/month")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use costlens_analysis::{Task, analyze};
    use costlens_core::DEFAULT_MIN_DAYS;
    use tempfile::tempdir;

    fn sample() -> Analysis {
        analyze(&[
            Task::new("claude-sonnet-4-5", 0.5).with_timestamp(1_767_225_600_000),
            Task::new("claude-sonnet-4-5", 0.25).with_timestamp(1_767_229_200_000),
        ])
    }

    #[test]
    fn test_stdout_json_is_not_mixed_with_summary() {
        let analysis = sample();
        let (mut out, mut err) = (Vec::new(), Vec::new());

        emit(&analysis, 1, None, &mut out, &mut err).unwrap();

        let json = String::from_utf8(out).unwrap();
        assert_eq!(Analysis::from_json_str(&json).unwrap(), analysis);
        let summary = String::from_utf8(err).unwrap();
        assert!(summary.starts_with("Analysed 2 tasks from 1 files"));
    }

    #[test]
    fn test_output_file_keeps_summary_on_stdout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("analysis.json");
        let analysis = sample();
        let (mut out, mut err) = (Vec::new(), Vec::new());

        emit(&analysis, 1, Some(path.as_path()), &mut out, &mut err).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Analysis::from_json_str(&written).unwrap(), analysis);
        assert!(String::from_utf8(out).unwrap().starts_with("Analysed"));
        assert!(err.is_empty());
    }

    #[test]
    fn test_exit_code_for_config_errors() {
        let invalid = AnalyzerConfig::default().with_min_days(0).validate().unwrap_err();
        assert_eq!(exit_code(&anyhow::Error::from(invalid)), EXIT_CONFIG);

        let missing = AnalyzerConfig::load("/nonexistent/costlens.yaml")
            .with_context(|| "loading config")
            .unwrap_err();
        assert_eq!(exit_code(&missing), EXIT_CONFIG);

        let fatal = AnalysisError::io(
            "/srv/agents",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(exit_code(&anyhow::Error::from(fatal)), 1);
    }

    #[test]
    fn test_parse_options_follow_config() {
        let config = AnalyzerConfig::default();
        let options = parse_options(&config.clone().with_min_days(3));
        assert_eq!(options.min_days, 3);
        assert_eq!(options.sessions_dir, config.sessions_dir);
        assert_eq!(parse_options(&config).min_days, DEFAULT_MIN_DAYS);
    }
}
