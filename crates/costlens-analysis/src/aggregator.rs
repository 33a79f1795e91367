//! Statistics aggregation over a classified task batch.
//!
//! [`aggregate`] is a pure function from tasks to an [`Analysis`]: period,
//! per-model and per-category rollups, hour/weekday histograms with burst
//! detection, cache economics, and a cost summary with a naive monthly
//! extrapolation. Money is summed at full precision and rounded to 4 decimals
//! once per aggregate.

use crate::models::{
    Analysis, Caching, Category, CategoryStats, DAYS_PER_MONTH, ModelBreakdown, ModelStats,
    Period, SkillUsage, Summary, Task, Temporal, TokenTotals, UsagePatterns, round4, round_to,
};
use chrono::{Datelike, Timelike};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Coefficient of variation above which hourly usage counts as bursty.
pub const BURST_CV_THRESHOLD: f64 = 1.5;

/// Cached input tokens are billed at this fraction of a fresh token.
pub const CACHE_READ_PRICE_RATIO: f64 = 0.1;

/// Share of a fresh token's price a cache read saves.
pub const CACHE_DISCOUNT: f64 = 0.9;

#[derive(Default)]
struct ModelAccumulator {
    count: u64,
    input: u64,
    output: u64,
    cost: f64,
}

impl ModelAccumulator {
    fn add(&mut self, task: &Task) {
        self.count += 1;
        self.input += task.usage.input;
        self.output += task.usage.output;
        self.cost += task.cost;
    }

    fn avg_cost(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.cost / self.count as f64
        }
    }
}

fn model_stats(tasks: &[Task]) -> BTreeMap<String, ModelStats> {
    let mut acc: BTreeMap<&str, ModelAccumulator> = BTreeMap::new();
    for task in tasks {
        acc.entry(task.model.as_str()).or_default().add(task);
    }

    acc.into_iter()
        .map(|(model, a)| {
            let stats = ModelStats {
                count: a.count,
                tokens: TokenTotals {
                    input: a.input,
                    output: a.output,
                },
                cost: round4(a.cost),
                avg_cost_per_task: round4(a.avg_cost()),
            };
            (model.to_string(), stats)
        })
        .collect()
}

fn category_stats(tasks: &[Task]) -> BTreeMap<Category, CategoryStats> {
    let mut acc: BTreeMap<Category, BTreeMap<&str, ModelAccumulator>> = BTreeMap::new();
    for task in tasks {
        acc.entry(task.effective_category())
            .or_default()
            .entry(task.model.as_str())
            .or_default()
            .add(task);
    }

    acc.into_iter()
        .map(|(category, models)| {
            let count = models.values().map(|m| m.count).sum();
            let model_breakdown = models
                .into_iter()
                .map(|(model, a)| {
                    let n = a.count.max(1) as f64;
                    let breakdown = ModelBreakdown {
                        count: a.count,
                        total_cost: round4(a.cost),
                        avg_cost: round4(a.avg_cost()),
                        avg_tokens: TokenTotals {
                            input: (a.input as f64 / n).round() as u64,
                            output: (a.output as f64 / n).round() as u64,
                        },
                        success_rate: None,
                        recommendation: None,
                    };
                    (model.to_string(), breakdown)
                })
                .collect();

            (
                category,
                CategoryStats {
                    count,
                    model_breakdown,
                },
            )
        })
        .collect()
}

/// Render a half-open hour range; the end hour 24 is written as `00`.
fn hour_range(start: usize, end: usize) -> String {
    format!("{:02}-{:02}", start, end % 24)
}

/// Maximal runs of hours satisfying `pred`, as `"HH-HH"` strings.
fn hour_ranges(counts: &[u64; 24], pred: impl Fn(u64) -> bool) -> Vec<String> {
    let mut ranges = Vec::new();
    let mut run_start = None;

    for (hour, &count) in counts.iter().enumerate() {
        match (pred(count), run_start) {
            (true, None) => run_start = Some(hour),
            (false, Some(start)) => {
                ranges.push(hour_range(start, hour));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        ranges.push(hour_range(start, counts.len()));
    }

    ranges
}

/// Detect burst usage, peak hours, and quiet hours from dense hourly counts.
pub fn detect_patterns(counts: &[u64; 24]) -> UsagePatterns {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return UsagePatterns::default();
    }

    let n = counts.len() as f64;
    let mean = total as f64 / n;
    let variance = counts
        .iter()
        .map(|&c| (c as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let cv = variance.sqrt() / mean;

    UsagePatterns {
        burst_usage: mean > 0.0 && cv > BURST_CV_THRESHOLD,
        peak_hours: hour_ranges(counts, |c| c as f64 > mean),
        quiet_hours: hour_ranges(counts, |c| c == 0),
    }
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn temporal(tasks: &[Task]) -> Temporal {
    let mut dense = [0u64; 24];
    let mut daily = BTreeMap::new();

    for dt in tasks.iter().filter_map(Task::datetime) {
        dense[dt.hour() as usize] += 1;
        let weekday = WEEKDAYS[dt.weekday().num_days_from_monday() as usize];
        *daily.entry(weekday.to_string()).or_insert(0) += 1;
    }

    let hourly = dense
        .iter()
        .enumerate()
        .filter(|(_, c)| **c > 0)
        .map(|(hour, &c)| (format!("{hour:02}"), c))
        .collect();

    Temporal {
        hourly,
        daily,
        patterns: detect_patterns(&dense),
    }
}

/// Estimate USD already saved by cache reads.
///
/// With both fresh and cached input, the effective full price per token is
/// inferred from the total cost, counting each cached token as a tenth of a
/// fresh one. With only cached input, the whole cost was paid at the
/// discounted rate, so the saving is nine times the cost.
pub fn estimate_cache_savings(total_input: u64, total_cache_read: u64, total_cost: f64) -> f64 {
    if total_cache_read == 0 {
        return 0.0;
    }

    let cache_read = total_cache_read as f64;
    if total_input > 0 {
        let full_price_tokens = total_input as f64 + cache_read * CACHE_READ_PRICE_RATIO;
        let price_per_token = total_cost / full_price_tokens;
        round4(cache_read * price_per_token * CACHE_DISCOUNT)
    } else if total_cost > 0.0 {
        let full_price = total_cost / CACHE_READ_PRICE_RATIO;
        round4(full_price - total_cost)
    } else {
        0.0
    }
}

fn caching(tasks: &[Task], total_cost: f64) -> Caching {
    let input: u64 = tasks.iter().map(|t| t.usage.input).sum();
    let cache_read: u64 = tasks.iter().map(|t| t.usage.cache_read).sum();

    let denominator = input + cache_read;
    let hit_rate = if denominator == 0 {
        0.0
    } else {
        round4(cache_read as f64 / denominator as f64)
    };
    let avg_cache_read = if tasks.is_empty() {
        0.0
    } else {
        round_to(cache_read as f64 / tasks.len() as f64, 2)
    };

    Caching {
        hit_rate,
        avg_cache_read,
        total_cache_read: cache_read,
        estimated_cache_savings: estimate_cache_savings(input, cache_read, total_cost),
        recommendation: None,
    }
}

/// Extrapolate a period total to 30 days.
pub fn monthly(amount: f64, days: u32) -> f64 {
    amount / f64::from(days.max(1)) * DAYS_PER_MONTH
}

/// Aggregate a task batch into an [`Analysis`].
///
/// An empty batch yields [`Analysis::empty`].
pub fn aggregate(tasks: &[Task]) -> Analysis {
    if tasks.is_empty() {
        debug!("no tasks to aggregate");
        return Analysis::empty();
    }

    let period = Period::from_tasks(tasks);
    let days = period.as_ref().map_or(1, |p| p.days);

    let total_cost: f64 = tasks.iter().map(|t| t.cost).sum();
    let total_tasks = tasks.len() as u64;

    let summary = Summary {
        total_cost: round4(total_cost),
        total_tasks,
        avg_cost_per_task: round4(total_cost / total_tasks as f64),
        current_monthly_cost: round4(monthly(total_cost, days)),
        ..Summary::default()
    };

    let analysis = Analysis {
        period,
        models: model_stats(tasks),
        categories: category_stats(tasks),
        skills: SkillUsage::default(),
        temporal: temporal(tasks),
        caching: caching(tasks, total_cost),
        summary,
        recommendations: None,
    };

    info!(
        tasks = total_tasks,
        models = analysis.models.len(),
        total_cost = analysis.summary.total_cost,
        days,
        "aggregated tasks"
    );

    analysis
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenUsage;

    const JAN_1_2026: i64 = 1_767_225_600_000; // a Thursday, 00:00 UTC
    const HOUR: i64 = 3_600_000;

    fn usage(input: u64, output: u64, cache_read: u64) -> TokenUsage {
        TokenUsage {
            input,
            output,
            cache_read,
            cache_write: 0,
        }
    }

    #[test]
    fn test_empty_input() {
        let analysis = aggregate(&[]);
        assert!(analysis.period.is_none());
        assert!(analysis.models.is_empty());
        assert!(analysis.categories.is_empty());
        assert_eq!(analysis.summary.total_tasks, 0);
        assert_eq!(analysis.summary.total_cost, 0.0);
        assert_eq!(analysis.caching.hit_rate, 0.0);
        assert_eq!(analysis, Analysis::empty());
    }

    #[test]
    fn test_rounding_applies_to_aggregate() {
        let tasks: Vec<Task> = [0.0, 0.0, 0.0001, 0.0002, 0.5, 0.333333, 0.666667]
            .iter()
            .map(|&c| Task::new("m", c))
            .collect();

        let analysis = aggregate(&tasks);
        assert_eq!(analysis.summary.total_cost, 1.5003);
        assert_eq!(analysis.summary.avg_cost_per_task, 0.2143);
        assert_eq!(analysis.models["m"].cost, 1.5003);
        assert_eq!(analysis.models["m"].avg_cost_per_task, 0.2143);
    }

    #[test]
    fn test_monthly_cost_single_day_floor() {
        let tasks = vec![
            Task::new("m", 0.5).with_timestamp(JAN_1_2026),
            Task::new("m", 0.25).with_timestamp(JAN_1_2026 + 1_000),
            Task::new("m", 0.25).with_timestamp(JAN_1_2026 + 2_000),
        ];

        let analysis = aggregate(&tasks);
        let period = analysis.period.as_ref().unwrap();
        assert_eq!(period.days, 1);
        assert_eq!(analysis.summary.total_cost, 1.0);
        assert_eq!(analysis.summary.current_monthly_cost, 30.0);
    }

    #[test]
    fn test_no_period_extrapolates_as_one_day() {
        let analysis = aggregate(&[Task::new("m", 0.2)]);
        assert!(analysis.period.is_none());
        assert_eq!(analysis.summary.current_monthly_cost, 6.0);
    }

    #[test]
    fn test_cache_savings_all_cached() {
        let tasks = vec![
            Task::new("m", 0.002).with_usage(usage(0, 10, 50_000)),
            Task::new("m", 0.002).with_usage(usage(0, 10, 50_000)),
        ];

        let analysis = aggregate(&tasks);
        assert_eq!(analysis.caching.hit_rate, 1.0);
        assert_eq!(analysis.caching.estimated_cache_savings, 0.036);
        assert_eq!(analysis.caching.avg_cache_read, 50_000.0);
        assert_eq!(analysis.caching.total_cache_read, 100_000);
    }

    #[test]
    fn test_cache_savings_mixed_input() {
        // 10_000 fresh + 90_000 cached at a tenth = 19_000 full-price tokens
        let savings = estimate_cache_savings(10_000, 90_000, 0.19);
        // price 0.00001/token, 90_000 * 0.00001 * 0.9
        assert!((savings - 0.81).abs() < 1e-9);
    }

    #[test]
    fn test_cache_savings_without_cache_reads() {
        assert_eq!(estimate_cache_savings(5_000, 0, 3.0), 0.0);
        assert_eq!(estimate_cache_savings(0, 0, 3.0), 0.0);
        assert_eq!(estimate_cache_savings(0, 1_000, 0.0), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let tasks = vec![Task::new("m", 0.1).with_usage(usage(3_000, 0, 1_000))];
        let analysis = aggregate(&tasks);
        assert_eq!(analysis.caching.hit_rate, 0.25);
    }

    #[test]
    fn test_category_breakdown() {
        let tasks = vec![
            Task::new("opus", 0.9)
                .with_category(Category::Code)
                .with_usage(usage(100, 11, 0)),
            Task::new("opus", 0.6)
                .with_category(Category::Code)
                .with_usage(usage(200, 10, 0)),
            Task::new("sonnet", 0.2).with_category(Category::Code),
            Task::new("sonnet", 0.1),
        ];

        let analysis = aggregate(&tasks);
        let code = &analysis.categories[&Category::Code];
        assert_eq!(code.count, 3);

        let opus = &code.model_breakdown["opus"];
        assert_eq!(opus.count, 2);
        assert_eq!(opus.total_cost, 1.5);
        assert_eq!(opus.avg_cost, 0.75);
        assert_eq!(opus.avg_tokens, TokenTotals { input: 150, output: 11 });
        assert!(opus.success_rate.is_none());
        assert!(opus.recommendation.is_none());

        // unclassified tasks land in `other`
        assert_eq!(analysis.categories[&Category::Other].count, 1);
    }

    #[test]
    fn test_temporal_histograms() {
        let tasks = vec![
            Task::new("m", 0.0).with_timestamp(JAN_1_2026 + 9 * HOUR),
            Task::new("m", 0.0).with_timestamp(JAN_1_2026 + 9 * HOUR + 60_000),
            Task::new("m", 0.0).with_timestamp(JAN_1_2026 + 24 * HOUR + 14 * HOUR),
            Task::new("m", 0.0),
        ];

        let analysis = aggregate(&tasks);
        assert_eq!(analysis.temporal.hourly.len(), 2);
        assert_eq!(analysis.temporal.hourly["09"], 2);
        assert_eq!(analysis.temporal.hourly["14"], 1);
        assert_eq!(analysis.temporal.daily["Thu"], 2);
        assert_eq!(analysis.temporal.daily["Fri"], 1);
        assert_eq!(analysis.summary.total_tasks, 4);
    }

    #[test]
    fn test_detect_patterns_single_hour() {
        let mut counts = [0u64; 24];
        counts[10] = 5;

        let patterns = detect_patterns(&counts);
        assert!(patterns.burst_usage);
        assert_eq!(patterns.peak_hours, vec!["10-11"]);
        assert_eq!(patterns.quiet_hours, vec!["00-10", "11-00"]);
    }

    #[test]
    fn test_detect_patterns_flat_usage() {
        let counts = [2u64; 24];
        let patterns = detect_patterns(&counts);
        assert!(!patterns.burst_usage);
        assert!(patterns.peak_hours.is_empty());
        assert!(patterns.quiet_hours.is_empty());
    }

    #[test]
    fn test_detect_patterns_no_data() {
        assert_eq!(detect_patterns(&[0u64; 24]), UsagePatterns::default());
    }

    #[test]
    fn test_detect_patterns_trailing_run() {
        let mut counts = [1u64; 24];
        counts[22] = 10;
        counts[23] = 10;
        counts[0] = 0;

        let patterns = detect_patterns(&counts);
        assert_eq!(patterns.peak_hours, vec!["22-00"]);
        assert_eq!(patterns.quiet_hours, vec!["00-01"]);
        assert!(!patterns.burst_usage);
    }

    #[test]
    fn test_aggregate_is_deterministic() {
        let tasks = vec![
            Task::new("b", 0.3).with_timestamp(JAN_1_2026 + HOUR),
            Task::new("a", 0.1).with_timestamp(JAN_1_2026),
        ];
        let first = serde_json::to_string(&aggregate(&tasks)).unwrap();
        let second = serde_json::to_string(&aggregate(&tasks)).unwrap();
        assert_eq!(first, second);
    }
}
