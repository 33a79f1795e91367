//! Keyword classifier for tasks.
//!
//! Each scored category owns a vocabulary. Keywords are compiled once into
//! case-insensitive, word-bounded patterns, so "api" matches "API usage" but
//! not "rapid". A category's score is its total number of non-overlapping
//! matches over the prompt and response text. The strictly highest score wins;
//! ties and all-zero scores fall to `other`.

use crate::models::{Category, Task};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::trace;

const CODE_KEYWORDS: &[&str] = &[
    "code",
    "function",
    "method",
    "class",
    "bug",
    "fix",
    "refactor",
    "implement",
    "compile",
    "compiler",
    "debug",
    "stack trace",
    "exception",
    "unit test",
    "test",
    "tests",
    "api",
    "endpoint",
    "script",
    "module",
    "syntax",
    "variable",
    "regex",
    "pull request",
    "commit",
    "rust",
    "python",
    "javascript",
    "typescript",
    "sql",
];

const WRITE_KEYWORDS: &[&str] = &[
    "write",
    "draft",
    "rewrite",
    "essay",
    "article",
    "blog",
    "blog post",
    "email",
    "letter",
    "paragraph",
    "story",
    "summary",
    "summarize",
    "proofread",
    "copy",
    "tone",
    "outline",
    "headline",
    "newsletter",
    "announcement",
    "readme",
    "documentation",
];

const RESEARCH_KEYWORDS: &[&str] = &[
    "research",
    "investigate",
    "compare",
    "comparison",
    "analyze",
    "analysis",
    "explain",
    "what is",
    "how does",
    "why does",
    "difference between",
    "pros and cons",
    "alternatives",
    "benchmark",
    "paper",
    "study",
    "sources",
    "overview",
    "evaluate",
    "look up",
];

const CONFIG_KEYWORDS: &[&str] = &[
    "config",
    "configure",
    "configuration",
    "setup",
    "set up",
    "install",
    "settings",
    "environment variable",
    "env",
    "yaml",
    "toml",
    "json",
    "dockerfile",
    "docker",
    "nginx",
    "systemd",
    "cron",
    "permissions",
    "dependency",
    "dependencies",
    "path",
    "plugin",
];

/// Static vocabulary for each scored category.
pub fn keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Code => CODE_KEYWORDS,
        Category::Write => WRITE_KEYWORDS,
        Category::Research => RESEARCH_KEYWORDS,
        Category::Config => CONFIG_KEYWORDS,
        Category::Other => &[],
    }
}

fn compile_keyword(keyword: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(keyword))).ok()
}

/// Precompiled keyword patterns, built once.
#[derive(Debug, Clone)]
pub struct Classifier {
    patterns: Vec<(Category, Vec<Regex>)>,
}

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::new);

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    /// Compile the built-in vocabulary.
    pub fn new() -> Self {
        let patterns = Category::SCORED
            .iter()
            .map(|&category| {
                let compiled = keywords(category)
                    .iter()
                    .filter_map(|k| compile_keyword(k))
                    .collect();
                (category, compiled)
            })
            .collect();

        Self { patterns }
    }

    /// Shared instance of the built-in vocabulary.
    pub fn shared() -> &'static Classifier {
        &DEFAULT_CLASSIFIER
    }

    /// Match counts for every scored category.
    pub fn scores(&self, text: &str) -> BTreeMap<Category, u32> {
        self.patterns
            .iter()
            .map(|(category, patterns)| {
                let hits: usize = patterns.iter().map(|p| p.find_iter(text).count()).sum();
                (*category, u32::try_from(hits).unwrap_or(u32::MAX))
            })
            .collect()
    }

    /// Winning category for a set of scores.
    pub fn pick(scores: &BTreeMap<Category, u32>) -> Category {
        let mut best = (Category::Other, 0);
        for category in Category::SCORED {
            let score = scores.get(&category).copied().unwrap_or(0);
            if score > best.1 {
                best = (category, score);
            } else if score == best.1 && score > 0 {
                // A tie at the top is ambiguous.
                best.0 = Category::Other;
            }
        }
        best.0
    }

    /// Classify a single task, returning an annotated copy.
    pub fn classify(&self, task: &Task) -> Task {
        let text = format!(
            "{} {}",
            task.user_prompt.as_deref().unwrap_or(""),
            task.content
        );
        let scores = self.scores(&text);
        let category = Self::pick(&scores);
        trace!(%category, ?scores, "classified task");

        let mut classified = task.clone();
        classified.category = Some(category);
        classified.category_scores = scores;
        classified
    }

    /// Classify a batch without mutating it.
    pub fn classify_tasks(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().map(|t| self.classify(t)).collect()
    }
}

/// Classify a single task with the built-in vocabulary.
pub fn classify_task(task: &Task) -> Task {
    Classifier::shared().classify(task)
}

/// Classify a batch with the built-in vocabulary.
pub fn classify_tasks(tasks: &[Task]) -> Vec<Task> {
    Classifier::shared().classify_tasks(tasks)
}
