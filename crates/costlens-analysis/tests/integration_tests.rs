//! Integration tests for costlens-analysis with session log trees on disk.

use costlens_analysis::models::RecommendationKind;
use costlens_analysis::{
    AnalysisError, Category, LogParser, ParseOptions, aggregate, pipeline, recommend,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const JAN_1_2026: i64 = 1_767_225_600_000;
const HOUR: i64 = 3_600_000;
const DAY: i64 = 24 * HOUR;

fn user_line(text: &str) -> String {
    json!({"type": "message", "message": {"role": "user", "content": text}}).to_string()
}

fn assistant_line(model: &str, text: &str, cost: f64, timestamp: i64) -> String {
    json!({
        "type": "message",
        "message": {
            "role": "assistant",
            "model": model,
            "content": [{"type": "text", "text": text}],
            "usage": {"input": 1000, "output": 200, "cacheRead": 0, "cacheWrite": 0, "cost": {"total": cost}},
            "timestamp": timestamp
        }
    })
    .to_string()
}

fn write_session(root: &Path, agent: &str, name: &str, lines: &[String]) -> PathBuf {
    let dir = root.join(agent).join("sessions");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();
    path
}

/// Seven days of two opus coding turns and five sonnet writing turns per day.
fn write_week(root: &Path) {
    for day in 0..7 {
        let base = JAN_1_2026 + day * DAY;
        let mut lines = Vec::new();
        for turn in 0..2 {
            lines.push(user_line("Refactor this function and fix the bug"));
            lines.push(assistant_line(
                "claude-opus-4-5",
                "Done.",
                0.80,
                base + (9 + turn) * HOUR,
            ));
        }
        for turn in 0..5 {
            lines.push(user_line("Draft an email to the team"));
            lines.push(assistant_line(
                "claude-sonnet-4-5",
                "Here you go.",
                0.38,
                base + (11 + turn) * HOUR,
            ));
        }
        write_session(root, "main", &format!("day-{day}.jsonl"), &lines);
    }
}

#[test]
fn test_discovery_follows_layout() {
    let dir = tempdir().unwrap();
    let root = dir.path();

    let kept = write_session(root, "alpha", "a.jsonl", &[]);
    write_session(root, "alpha", "notes.txt", &[]);
    std::fs::create_dir_all(root.join("beta")).unwrap();
    std::fs::write(root.join("stray.jsonl"), "").unwrap();

    let files = LogParser::new().discover(root).unwrap();
    assert_eq!(files, vec![kept]);
}

#[test]
fn test_missing_root_is_a_warning() {
    let dir = tempdir().unwrap();
    let output = LogParser::new()
        .parse_root(dir.path().join("does-not-exist"))
        .unwrap();

    assert!(output.tasks.is_empty());
    assert!(output.files.is_empty());
    assert!(output.period.is_none());
    assert_eq!(output.warnings.len(), 1);
    assert!(output.warnings[0].starts_with("No session files found"));
}

#[test]
fn test_prompt_pairs_with_first_following_turn_only() {
    let dir = tempdir().unwrap();
    let lines = vec![
        assistant_line("m", "unprompted", 0.1, JAN_1_2026),
        user_line("first question"),
        String::new(),
        "{ not json".to_string(),
        json!({"type": "session", "id": "s1"}).to_string(),
        assistant_line("m", "answer one", 0.1, JAN_1_2026 + 1),
        assistant_line("m", "follow-up", 0.1, JAN_1_2026 + 2),
        user_line("second question"),
        assistant_line("m", "answer two", 0.1, JAN_1_2026 + 3),
    ];
    write_session(dir.path(), "main", "s.jsonl", &lines);

    let output = LogParser::new().parse_root(dir.path()).unwrap();
    let prompts: Vec<Option<&str>> = output
        .tasks
        .iter()
        .map(|t| t.user_prompt.as_deref())
        .collect();

    assert_eq!(
        prompts,
        vec![None, Some("first question"), None, Some("second question")]
    );
    assert!(output.tasks.iter().all(|t| t.source_file.ends_with("s.jsonl")));
}

#[test]
fn test_merge_sorts_by_timestamp_with_missing_first() {
    let dir = tempdir().unwrap();
    write_session(
        dir.path(),
        "a",
        "late.jsonl",
        &[assistant_line("late", "", 0.0, JAN_1_2026 + DAY)],
    );
    write_session(
        dir.path(),
        "b",
        "early.jsonl",
        &[
            assistant_line("early", "", 0.0, JAN_1_2026),
            json!({"type": "message", "message": {"role": "assistant", "model": "untimed", "usage": {"input": 1}}})
                .to_string(),
        ],
    );

    let output = LogParser::new().parse_root(dir.path()).unwrap();
    let models: Vec<&str> = output.tasks.iter().map(|t| t.model.as_str()).collect();
    assert_eq!(models, vec!["untimed", "early", "late"]);
}

#[test]
fn test_non_utf8_line_is_skipped_silently() {
    let dir = tempdir().unwrap();
    let session = dir.path().join("main").join("sessions");
    std::fs::create_dir_all(&session).unwrap();

    let mut bytes = assistant_line("m", "before", 0.5, JAN_1_2026).into_bytes();
    bytes.extend_from_slice(b"\n{\"type\":\"note\",\"text\":\"caf\xe9\"}\n\xff\xfe\xfd\n");
    bytes.extend_from_slice(assistant_line("m", "after", 0.5, JAN_1_2026 + 1).as_bytes());
    std::fs::write(session.join("a.jsonl"), bytes).unwrap();

    let output = LogParser::with_options(ParseOptions::default().with_min_days(1))
        .parse_root(dir.path())
        .unwrap();
    let contents: Vec<&str> = output.tasks.iter().map(|t| t.content.as_str()).collect();
    assert_eq!(contents, vec!["before", "after"]);
    assert!(output.warnings.is_empty());
}

#[test]
fn test_root_that_is_a_file_is_fatal() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("agents");
    std::fs::write(&root, "not a directory").unwrap();

    let err = LogParser::new().parse_root(&root).unwrap_err();
    assert!(matches!(err, AnalysisError::Io { .. }));
    assert!(err.is_fatal());

    let err = pipeline::run(&root, &ParseOptions::default()).unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_short_span_warning() {
    let dir = tempdir().unwrap();
    write_session(
        dir.path(),
        "main",
        "s.jsonl",
        &[
            assistant_line("m", "", 0.1, JAN_1_2026),
            assistant_line("m", "", 0.1, JAN_1_2026 + 2 * DAY + HOUR),
        ],
    );

    let output = LogParser::new().parse_root(dir.path()).unwrap();
    assert_eq!(output.period.as_ref().unwrap().days, 3);
    assert_eq!(output.warnings.len(), 1);
    assert!(output.warnings[0].contains("Only 3 day(s)"));

    let relaxed = LogParser::with_options(ParseOptions::default().with_min_days(3))
        .parse_root(dir.path())
        .unwrap();
    assert!(relaxed.warnings.is_empty());
}

#[tokio::test]
async fn test_concurrent_parse_matches_sequential() {
    costlens_core::logging::init_test_logging();

    let dir = tempdir().unwrap();
    write_week(dir.path());
    write_session(
        dir.path(),
        "second",
        "s.jsonl",
        &[assistant_line("claude-haiku-4-5", "", 0.01, JAN_1_2026 + 9 * HOUR)],
    );

    let parser = LogParser::new();
    let sequential = parser.parse_root(dir.path()).unwrap();
    let concurrent = parser.parse_root_concurrent(dir.path()).await.unwrap();

    assert_eq!(sequential.tasks, concurrent.tasks);
    assert_eq!(sequential.files, concurrent.files);
    assert_eq!(sequential.warnings, concurrent.warnings);
    assert_eq!(sequential.period, concurrent.period);
}

#[test]
fn test_week_end_to_end() {
    let dir = tempdir().unwrap();
    write_week(dir.path());

    let output = pipeline::run(dir.path(), &ParseOptions::default().with_min_days(7)).unwrap();
    assert!(output.warnings.is_empty());
    assert_eq!(output.files.len(), 7);

    let analysis = &output.analysis;
    assert_eq!(analysis.period.as_ref().unwrap().days, 7);
    assert_eq!(analysis.summary.total_cost, 24.5);
    assert_eq!(analysis.summary.total_tasks, 49);
    assert_eq!(analysis.summary.current_monthly_cost, 105.0);
    assert_eq!(analysis.models["claude-opus-4-5"].cost, 11.2);
    assert_eq!(analysis.models["claude-sonnet-4-5"].cost, 13.3);
    assert_eq!(analysis.models["claude-opus-4-5"].avg_cost_per_task, 0.8);

    assert_eq!(analysis.categories[&Category::Code].count, 14);
    assert_eq!(analysis.categories[&Category::Write].count, 35);
    assert_eq!(analysis.temporal.hourly["09"], 7);
    assert_eq!(analysis.temporal.daily.values().sum::<u64>(), 49);

    // one model per category: nothing to switch
    assert!(
        analysis
            .categories
            .values()
            .all(|c| c.recommendation().is_none())
    );
    let cards = analysis.recommendations.as_ref().unwrap();
    assert!(cards.iter().any(|c| c.kind == RecommendationKind::BudgetControl));
    assert!(analysis.caching.recommendation.is_some());
}

#[test]
fn test_analysis_is_pure_and_round_trips() {
    let dir = tempdir().unwrap();
    write_week(dir.path());
    let parsed = LogParser::new().parse_root(dir.path()).unwrap();
    let tasks = costlens_analysis::classify_tasks(&parsed.tasks);

    let first = aggregate(&tasks);
    let second = aggregate(&tasks);
    assert_eq!(
        first.to_json_pretty().unwrap(),
        second.to_json_pretty().unwrap()
    );

    let snapshot = first.clone();
    let enriched = recommend(&first);
    assert_eq!(first, snapshot);

    let json = enriched.to_json_pretty().unwrap();
    let restored = costlens_analysis::Analysis::from_json_str(&json).unwrap();
    assert_eq!(restored, enriched);
}

#[test]
fn test_empty_sessions_yield_empty_analysis() {
    let dir = tempdir().unwrap();
    write_session(
        dir.path(),
        "main",
        "s.jsonl",
        &[user_line("hello"), json!({"type": "model_change"}).to_string()],
    );

    let output = pipeline::run(dir.path(), &ParseOptions::default()).unwrap();
    assert_eq!(output.analysis, costlens_analysis::Analysis::empty());
    assert!(output.warnings.is_empty());
}
