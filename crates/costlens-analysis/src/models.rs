//! Data models shared by every pipeline stage.
//!
//! [`Task`] is produced by the parser and annotated by the classifier;
//! [`Analysis`] is produced by the aggregator and enriched by the recommender.
//! All mappings are ordered so an Analysis serializes identically every time.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// Milliseconds in one day.
pub const MS_PER_DAY: i64 = 86_400_000;

/// Days used for monthly extrapolation.
pub const DAYS_PER_MONTH: f64 = 30.0;

/// Round a value to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round a money value to 4 decimal places.
pub fn round4(value: f64) -> f64 {
    round_to(value, 4)
}

/// Token counts reported for a single assistant turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenUsage {
    /// Fresh (uncached) input tokens
    pub input: u64,
    /// Output tokens
    pub output: u64,
    /// Input tokens served from the prompt cache
    pub cache_read: u64,
    /// Input tokens written to the prompt cache
    pub cache_write: u64,
}

/// Work type assigned to a task by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Programming: writing, fixing, or reviewing code
    Code,
    /// Prose: documents, emails, articles
    Write,
    /// Investigation, comparison, explanation
    Research,
    /// Environment, tooling, and settings changes
    Config,
    /// Catch-all when no category wins outright
    Other,
}

impl Category {
    /// Categories that carry a keyword vocabulary, in scoring order.
    pub const SCORED: [Category; 4] = [
        Category::Code,
        Category::Write,
        Category::Research,
        Category::Config,
    ];

    /// Lowercase name used in JSON and user-facing text.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Write => "write",
            Self::Research => "research",
            Self::Config => "config",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized assistant turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Model that produced the response ("unknown" if absent)
    pub model: String,

    /// Plain-text rendering of the assistant response
    pub content: String,

    /// The user message immediately preceding this turn, if any
    pub user_prompt: Option<String>,

    /// Token usage
    pub usage: TokenUsage,

    /// Cost reported by the provider for this turn, in USD
    pub cost: f64,

    /// Epoch milliseconds
    pub timestamp: Option<i64>,

    /// File the turn was read from
    pub source_file: PathBuf,

    /// Assigned by the classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    /// Per-category keyword match counts, for diagnostics
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub category_scores: BTreeMap<Category, u32>,
}

impl Task {
    /// Create a task with a model and cost; everything else empty.
    pub fn new(model: impl Into<String>, cost: f64) -> Self {
        Self {
            model: model.into(),
            content: String::new(),
            user_prompt: None,
            usage: TokenUsage::default(),
            cost,
            timestamp: None,
            source_file: PathBuf::new(),
            category: None,
            category_scores: BTreeMap::new(),
        }
    }

    /// Set token usage.
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set the timestamp (epoch milliseconds).
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Set the response text.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the preceding user prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = Some(prompt.into());
        self
    }

    /// Set the category directly.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Set the source file.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_file = path.into();
        self
    }

    /// Category used for grouping; unclassified tasks count as `other`.
    pub fn effective_category(&self) -> Category {
        self.category.unwrap_or(Category::Other)
    }

    /// Timestamp as a UTC datetime, when present and in range.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(DateTime::from_timestamp_millis)
    }
}

fn serialize_iso_millis<S: Serializer>(
    value: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Time span covered by a task batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    /// Earliest task timestamp
    #[serde(serialize_with = "serialize_iso_millis")]
    pub start: DateTime<Utc>,

    /// Latest task timestamp
    #[serde(serialize_with = "serialize_iso_millis")]
    pub end: DateTime<Utc>,

    /// Whole days spanned, never less than 1
    pub days: u32,

    /// Number of tasks in the batch
    pub total_tasks: usize,
}

impl Period {
    /// Compute the period of a task batch. `None` if no task has a timestamp.
    pub fn from_tasks(tasks: &[Task]) -> Option<Self> {
        let mut stamps = tasks
            .iter()
            .filter(|t| t.datetime().is_some())
            .filter_map(|t| t.timestamp);
        let first = stamps.next()?;
        let (min, max) = stamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));

        let span = max - min;
        let days = ((span + MS_PER_DAY - 1) / MS_PER_DAY).max(1);

        Some(Self {
            start: DateTime::from_timestamp_millis(min)?,
            end: DateTime::from_timestamp_millis(max)?,
            days: u32::try_from(days).unwrap_or(u32::MAX),
            total_tasks: tasks.len(),
        })
    }
}

/// Input/output token pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    /// Input tokens
    pub input: u64,
    /// Output tokens
    pub output: u64,
}

/// Per-model rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStats {
    pub count: u64,
    pub tokens: TokenTotals,
    pub cost: f64,
    pub avg_cost_per_task: f64,
}

/// Suggestion to move a category's work from one model to a cheaper one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSwitch {
    /// Most expensive model currently used in the category
    pub current_model: String,

    /// Cheaper model with enough usage to trust
    pub switch_to: String,

    /// Savings over the analysed period, in USD
    pub potential_savings: f64,

    /// Statistical support in [0, 0.99]
    pub confidence: f64,

    /// Average cost per task of the current model
    pub current_avg_cost: f64,

    /// Average cost per task of the suggested model
    pub optimal_avg_cost: f64,
}

/// Per-model statistics inside a category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelBreakdown {
    pub count: u64,
    pub total_cost: f64,
    pub avg_cost: f64,
    pub avg_tokens: TokenTotals,
    /// Not derivable from session logs yet; always null
    pub success_rate: Option<f64>,
    pub recommendation: Option<ModelSwitch>,
}

/// Per-category rollup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub count: u64,
    pub model_breakdown: BTreeMap<String, ModelBreakdown>,
}

impl CategoryStats {
    /// The model-switch recommendation for this category, if any.
    pub fn recommendation(&self) -> Option<&ModelSwitch> {
        self.model_breakdown
            .values()
            .find_map(|b| b.recommendation.as_ref())
    }
}

/// Skill usage. No skill data is derivable from session logs, so this is
/// always empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillUsage {
    pub used: BTreeMap<String, u64>,
    pub unused: Vec<String>,
}

/// Detected hourly usage shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePatterns {
    /// Hourly coefficient of variation exceeds the burst threshold
    pub burst_usage: bool,
    /// `"HH-HH"` ranges with above-average activity
    pub peak_hours: Vec<String>,
    /// `"HH-HH"` ranges with no activity
    pub quiet_hours: Vec<String>,
}

/// Hour-of-day and weekday histograms (UTC).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Temporal {
    /// `"00"`..`"23"` to task count (hours with no tasks are omitted)
    pub hourly: BTreeMap<String, u64>,
    /// `"Mon"`..`"Sun"` to task count
    pub daily: BTreeMap<String, u64>,
    pub patterns: UsagePatterns,
}

/// Caching policy outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// Bursty traffic: keep the cache warm with long retention and a heartbeat
    LongRetention,
    /// Hit rate is low: reuse context for longer
    ExtendContextReuse,
    /// Hit rate is high: nothing to change
    KeepCurrent,
    /// Hit rate is middling: defaults are fine
    Default,
}

/// Caching-policy suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePolicy {
    pub strategy: CacheStrategy,
    /// Heartbeat interval that keeps a long-retention cache warm
    pub heartbeat_minutes: Option<u32>,
    pub message: String,
}

/// Prompt-cache economics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caching {
    /// cacheRead / (input + cacheRead)
    pub hit_rate: f64,
    /// Mean cache-read tokens per task
    pub avg_cache_read: f64,
    /// Cache-read tokens across the batch
    #[serde(default)]
    pub total_cache_read: u64,
    /// Estimated USD already saved by cache reads
    pub estimated_cache_savings: f64,
    pub recommendation: Option<CachePolicy>,
}

/// Qualitative confidence behind the recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    Conservative,
    Likely,
    Optimistic,
}

impl ConfidenceLabel {
    /// Label for an average confidence; `None` (nothing to average) is
    /// conservative.
    pub fn from_average(average: Option<f64>) -> Self {
        match average {
            Some(avg) if avg >= 0.7 => Self::Optimistic,
            Some(avg) if avg >= 0.4 => Self::Likely,
            _ => Self::Conservative,
        }
    }
}

/// Overall cost summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_cost: f64,
    pub total_tasks: u64,
    pub avg_cost_per_task: f64,
    pub current_monthly_cost: f64,

    /// Projected monthly savings (set by the recommender)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_savings: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_monthly_cost: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_percentage: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceLabel>,
}

/// Kind of user-facing recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    ModelSwitch,
    CacheOptimization,
    BudgetControl,
    AgentCreation,
}

/// A ranked, user-facing suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    /// Monthly projection, or a qualitative phrase
    pub impact: String,
    pub details: Vec<String>,
    /// Numeric monthly projection behind `impact`, used for ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_savings: Option<f64>,
}

/// Complete aggregated (and optionally recommended) snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub period: Option<Period>,
    pub models: BTreeMap<String, ModelStats>,
    pub categories: BTreeMap<Category, CategoryStats>,
    pub skills: SkillUsage,
    pub temporal: Temporal,
    pub caching: Caching,
    pub summary: Summary,

    /// Present only after the recommender has run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
}

impl Analysis {
    /// The canonical zero-valued analysis for an empty batch.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Days used for extrapolation: the period's days, or 1 without a period.
    pub fn period_days(&self) -> u32 {
        self.period.as_ref().map_or(1, |p| p.days.max(1))
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
