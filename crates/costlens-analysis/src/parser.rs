//! Session log parser.
//!
//! Session logs are append-only JSON lines stored as
//! `<root>/<agent>/<sessions_dir>/*.<log_extension>`. Each assistant message
//! carrying a usage payload becomes one [`Task`], paired with the user message
//! that immediately preceded it in the same file.
//!
//! Lines that are blank, not UTF-8, not JSON, not `"message"` records, or
//! assistant messages without usage are skipped silently. A file that cannot be read to
//! the end is dropped and reported as a warning; only a failure to list a
//! directory that exists aborts the run.

use crate::error::{AnalysisError, Result};
use crate::models::{Period, Task, TokenUsage};
use chrono::DateTime;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

/// Discovery convention and freshness threshold for a parse run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Per-agent directory holding session logs
    pub sessions_dir: String,
    /// Session log extension, without the dot
    pub log_extension: String,
    /// Spans shorter than this many days produce a freshness warning
    pub min_days: u32,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            sessions_dir: "sessions".to_string(),
            log_extension: "jsonl".to_string(),
            min_days: 14,
        }
    }
}

impl ParseOptions {
    /// Set the minimum number of days.
    pub fn with_min_days(mut self, min_days: u32) -> Self {
        self.min_days = min_days;
        self
    }
}

/// Result of parsing a sessions root.
#[derive(Debug, Clone, Default)]
pub struct ParseOutput {
    /// All tasks, sorted by timestamp (missing timestamps first)
    pub tasks: Vec<Task>,
    /// Session files that were discovered, in discovery order
    pub files: Vec<PathBuf>,
    /// Human-readable warnings; partial success is normal
    pub warnings: Vec<String>,
    /// Span of the timestamped tasks
    pub period: Option<Period>,
}

/// One decoded log line that matters to the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// Flattened text of a user message
    UserPrompt(String),
    /// An assistant turn with usage (source file not yet set)
    Assistant(Task),
}

/// Flatten message content to plain text.
///
/// Strings pass through; block arrays contribute only their `"text"` blocks,
/// joined by newlines. Anything else is empty.
pub fn flatten_content(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn token_count(usage: &Value, key: &str) -> u64 {
    usage.get(key).and_then(Value::as_u64).unwrap_or(0)
}

/// Epoch milliseconds from the message, falling back to the record.
fn extract_timestamp(record: &Value, message: &Value) -> Option<i64> {
    if let Some(ts) = message.get("timestamp").and_then(Value::as_i64) {
        return Some(ts);
    }

    match record.get("timestamp") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

/// Decode one log line. `None` means the line is irrelevant and skipped.
pub fn decode_line(line: &str) -> Option<LogRecord> {
    let record: Value = serde_json::from_str(line).ok()?;

    if record.get("type").and_then(Value::as_str) != Some("message") {
        return None;
    }

    let message = record.get("message")?;
    match message.get("role").and_then(Value::as_str)? {
        "user" => Some(LogRecord::UserPrompt(flatten_content(message.get("content")))),
        "assistant" => {
            let usage = message.get("usage").filter(|u| u.is_object())?;

            let model = message
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or("unknown");

            let cost = usage
                .get("cost")
                .and_then(|c| c.get("total"))
                .and_then(Value::as_f64)
                .filter(|c| c.is_finite() && *c >= 0.0)
                .unwrap_or(0.0);

            let mut task = Task::new(model, cost)
                .with_content(flatten_content(message.get("content")))
                .with_usage(TokenUsage {
                    input: token_count(usage, "input"),
                    output: token_count(usage, "output"),
                    cache_read: token_count(usage, "cacheRead"),
                    cache_write: token_count(usage, "cacheWrite"),
                });
            task.timestamp = extract_timestamp(&record, message);

            Some(LogRecord::Assistant(task))
        }
        _ => None,
    }
}

/// Parser for session log trees.
#[derive(Debug, Clone, Default)]
pub struct LogParser {
    options: ParseOptions,
}

impl LogParser {
    /// Create a parser with the default layout (`sessions/*.jsonl`, 14 days).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a parser with custom options.
    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Options in use.
    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Find session files under `root`, sorted by path.
    ///
    /// A missing root or a missing per-agent sessions directory yields no
    /// files; any other listing failure is an error.
    pub fn discover<P: AsRef<Path>>(&self, root: P) -> Result<Vec<PathBuf>> {
        let root = root.as_ref();
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(root = %root.display(), "sessions root does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(AnalysisError::io(root, e)),
        };

        let mut files = Vec::new();
        for entry in entries {
            let agent_dir = entry.map_err(|e| AnalysisError::io(root, e))?.path();
            if !agent_dir.is_dir() {
                continue;
            }

            let sessions = agent_dir.join(&self.options.sessions_dir);
            let session_entries = match std::fs::read_dir(&sessions) {
                Ok(entries) => entries,
                Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                    trace!(agent = %agent_dir.display(), "agent has no sessions directory");
                    continue;
                }
                Err(e) => return Err(AnalysisError::io(&sessions, e)),
            };

            for file in session_entries {
                let path = file.map_err(|e| AnalysisError::io(&sessions, e))?.path();
                if path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == self.options.log_extension.as_str())
                {
                    files.push(path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Parse a single session file, streaming it line by line.
    pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Task>> {
        let path = path.as_ref();
        let file_error = |e: std::io::Error| AnalysisError::FileParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut reader = BufReader::new(File::open(path).map_err(file_error)?);

        let mut tasks = Vec::new();
        let mut pending_prompt: Option<String> = None;
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).map_err(file_error)? == 0 {
                break;
            }
            line_no += 1;

            // Undecodable bytes make the line irrelevant, not the file.
            let Ok(line) = std::str::from_utf8(&buf) else {
                trace!(line = line_no, "skipping non-UTF-8 line");
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }

            match decode_line(line) {
                Some(LogRecord::UserPrompt(prompt)) => pending_prompt = Some(prompt),
                Some(LogRecord::Assistant(mut task)) => {
                    task.user_prompt = pending_prompt.take();
                    task.source_file = path.to_path_buf();
                    tasks.push(task);
                }
                None => trace!(line = line_no, "skipping line"),
            }
        }

        debug!(file = %path.display(), count = tasks.len(), "parsed session file");
        Ok(tasks)
    }

    /// Parse every session file under `root`, one file at a time.
    pub fn parse_root<P: AsRef<Path>>(&self, root: P) -> Result<ParseOutput> {
        let root = root.as_ref();
        let files = self.discover(root)?;
        let results = files.iter().map(|f| self.parse_file(f)).collect();
        self.assemble(root, files, results)
    }

    /// Parse every session file under `root` on blocking worker threads.
    ///
    /// Produces the same output as [`LogParser::parse_root`].
    pub async fn parse_root_concurrent<P: AsRef<Path>>(&self, root: P) -> Result<ParseOutput> {
        let root = root.as_ref().to_path_buf();

        let files = {
            let parser = self.clone();
            let root = root.clone();
            tokio::task::spawn_blocking(move || parser.discover(&root)).await??
        };

        let mut set = JoinSet::new();
        for (index, path) in files.iter().cloned().enumerate() {
            let parser = self.clone();
            set.spawn_blocking(move || (index, parser.parse_file(&path)));
        }

        let mut slots: Vec<Option<Result<Vec<Task>>>> = files.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (index, result) = joined?;
            slots[index] = Some(result);
        }

        let results = slots.into_iter().flatten().collect();
        self.assemble(&root, files, results)
    }

    /// Merge per-file results (in file order), sort, and compute warnings.
    ///
    /// Non-fatal per-file errors become warnings; fatal ones abort.
    fn assemble(
        &self,
        root: &Path,
        files: Vec<PathBuf>,
        results: Vec<Result<Vec<Task>>>,
    ) -> Result<ParseOutput> {
        let mut warnings = Vec::new();
        let mut tasks = Vec::new();

        if files.is_empty() {
            warnings.push(format!("No session files found under {}", root.display()));
        }

        for result in results {
            match result {
                Ok(file_tasks) => tasks.extend(file_tasks),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Failed to parse session file");
                    warnings.push(e.to_string());
                }
            }
        }

        tasks.sort_by_key(|t| t.timestamp.unwrap_or(0));

        let period = Period::from_tasks(&tasks);
        if let Some(period) = &period
            && period.days < self.options.min_days
        {
            warnings.push(format!(
                "Only {} day(s) of data found; at least {} recommended for reliable recommendations",
                period.days, self.options.min_days
            ));
        }

        info!(
            files = files.len(),
            tasks = tasks.len(),
            warnings = warnings.len(),
            "parsed sessions"
        );

        Ok(ParseOutput {
            tasks,
            files,
            warnings,
            period,
        })
    }
}
