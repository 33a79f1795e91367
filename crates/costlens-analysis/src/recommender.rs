//! Recommendation engine.
//!
//! [`recommend`] takes an aggregated [`Analysis`] and returns an enriched
//! copy: per-category model switches, a caching policy, summary savings with a
//! confidence label, and a ranked list of user-facing recommendations.
//!
//! ## Model switches
//!
//! A category qualifies with at least two models and three tasks. The most
//! expensive model by average cost is the current one; the replacement is the
//! cheapest model with enough usage to trust (`max(5, 20% of the category)`
//! tasks, or at least 2 as a weaker fallback). Savings are the average-cost gap
//! times the current model's task count; non-positive savings are dropped.

use crate::aggregator::{CACHE_DISCOUNT, CACHE_READ_PRICE_RATIO, monthly};
use crate::models::{
    Analysis, CachePolicy, CacheStrategy, Category, CategoryStats, ConfidenceLabel,
    ModelBreakdown, ModelSwitch, Recommendation, RecommendationKind, round4, round_to,
};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Minimum distinct models in a category before a switch is considered.
pub const MIN_MODELS: usize = 2;

/// Minimum tasks in a category before a switch is considered.
pub const MIN_CATEGORY_TASKS: u64 = 3;

/// Absolute floor of the strong-evidence usage threshold.
pub const STRONG_EVIDENCE_MIN: u64 = 5;

/// Share of a category's tasks that counts as strong evidence.
pub const STRONG_EVIDENCE_SHARE: f64 = 0.2;

/// Usage count accepted as weak evidence.
pub const WEAK_EVIDENCE_MIN: u64 = 2;

/// Task count at which switch confidence saturates.
pub const CONFIDENCE_SATURATION: f64 = 30.0;

/// Switch confidence never reaches certainty.
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Heartbeat that keeps a long-retention cache warm.
pub const HEARTBEAT_MINUTES: u32 = 55;

/// Hit rate below which caching is flagged as low.
pub const LOW_HIT_RATE: f64 = 0.3;

/// Hit rate at or above which caching is considered healthy.
pub const HIGH_HIT_RATE: f64 = 0.6;

/// Hit rate below which a cache optimization card is shown.
pub const CACHE_CARD_HIT_RATE: f64 = 0.5;

/// Daily cap as a multiple of the even daily share.
pub const DAILY_CAP_FACTOR: f64 = 1.2;

/// Weekly alert threshold as a share of a week at the daily cap.
pub const WEEKLY_ALERT_SHARE: f64 = 0.75;

/// Share of the budget at which work pauses automatically.
pub const AUTO_PAUSE_SHARE: f64 = 0.95;

/// Task count that justifies a dedicated agent for a category.
pub const AGENT_CREATION_THRESHOLD: u64 = 50;

type ModelEntry<'a> = (&'a String, &'a ModelBreakdown);

fn by_avg_cost_desc(a: &ModelEntry<'_>, b: &ModelEntry<'_>) -> Ordering {
    b.1.avg_cost
        .partial_cmp(&a.1.avg_cost)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(b.0))
}

fn by_avg_cost_asc(a: &ModelEntry<'_>, b: &ModelEntry<'_>) -> Ordering {
    a.1.avg_cost
        .partial_cmp(&b.1.avg_cost)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(b.0))
}

/// Compute the model switch for one category, if it is worth making.
pub fn model_switch(stats: &CategoryStats) -> Option<ModelSwitch> {
    if stats.model_breakdown.len() < MIN_MODELS || stats.count < MIN_CATEGORY_TASKS {
        return None;
    }

    let mut ranked: Vec<ModelEntry<'_>> = stats.model_breakdown.iter().collect();
    ranked.sort_by(by_avg_cost_desc);

    let (current_model, current) = ranked[0];

    let strong = STRONG_EVIDENCE_MIN
        .max((stats.count as f64 * STRONG_EVIDENCE_SHARE).ceil() as u64);
    let (optimal_model, optimal) = ranked
        .iter()
        .rev()
        .find(|(_, b)| b.count >= strong)
        .or_else(|| ranked.iter().rev().find(|(_, b)| b.count >= WEAK_EVIDENCE_MIN))
        .copied()?;

    if optimal_model == current_model {
        return None;
    }

    let potential_savings =
        round4((current.avg_cost - optimal.avg_cost) * current.count as f64);
    if potential_savings <= 0.0 {
        return None;
    }

    let confidence = round_to(
        (optimal.count as f64 / CONFIDENCE_SATURATION).min(MAX_CONFIDENCE),
        2,
    );

    Some(ModelSwitch {
        current_model: current_model.clone(),
        switch_to: optimal_model.clone(),
        potential_savings,
        confidence,
        current_avg_cost: current.avg_cost,
        optimal_avg_cost: optimal.avg_cost,
    })
}

/// Choose a caching policy from the burst flag and hit rate.
pub fn cache_policy(burst_usage: bool, hit_rate: f64) -> CachePolicy {
    if burst_usage {
        CachePolicy {
            strategy: CacheStrategy::LongRetention,
            heartbeat_minutes: Some(HEARTBEAT_MINUTES),
            message: format!(
                "Usage is bursty: enable long cache retention with a {HEARTBEAT_MINUTES}-minute heartbeat to keep context warm between bursts"
            ),
        }
    } else if hit_rate < LOW_HIT_RATE {
        CachePolicy {
            strategy: CacheStrategy::ExtendContextReuse,
            heartbeat_minutes: None,
            message: format!(
                "Cache hit rate is low ({:.0}%): reuse context for longer to benefit from cached prompts",
                hit_rate * 100.0
            ),
        }
    } else if hit_rate >= HIGH_HIT_RATE {
        CachePolicy {
            strategy: CacheStrategy::KeepCurrent,
            heartbeat_minutes: None,
            message: format!(
                "Cache hit rate is healthy ({:.0}%): current approach is working",
                hit_rate * 100.0
            ),
        }
    } else {
        CachePolicy {
            strategy: CacheStrategy::Default,
            heartbeat_minutes: None,
            message: "Default cache configuration is adequate".to_string(),
        }
    }
}

fn dollars_per_month(amount: f64) -> String {
    format!("${amount:.2}/month")
}

fn switch_card(category: Category, switch: &ModelSwitch, days: u32) -> Recommendation {
    let monthly_savings = round4(monthly(switch.potential_savings, days));
    Recommendation {
        kind: RecommendationKind::ModelSwitch,
        title: format!(
            "Use {} instead of {} for {} tasks",
            switch.switch_to, switch.current_model, category
        ),
        description: format!(
            "{} tasks cost ${:.4} on average with {} versus ${:.4} with {}.",
            category,
            switch.current_avg_cost,
            switch.current_model,
            switch.optimal_avg_cost,
            switch.switch_to
        ),
        impact: format!("Save ~{}", dollars_per_month(monthly_savings)),
        details: vec![
            format!("Savings over the analysed period: ${:.4}", switch.potential_savings),
            format!("Confidence: {:.0}%", switch.confidence * 100.0),
        ],
        monthly_savings: Some(monthly_savings),
    }
}

/// Fresh and cached input token totals behind the caching figures.
fn input_totals(analysis: &Analysis) -> (f64, f64) {
    let fresh: u64 = analysis.models.values().map(|m| m.tokens.input).sum();
    (fresh as f64, analysis.caching.total_cache_read as f64)
}

/// Hit rate from raw token totals; the reported `hitRate` is rounded.
fn exact_hit_rate(analysis: &Analysis) -> f64 {
    let (fresh, cached) = input_totals(analysis);
    if fresh + cached > 0.0 {
        cached / (fresh + cached)
    } else {
        0.0
    }
}

fn cache_card(analysis: &Analysis, hit_rate: f64, days: u32) -> Recommendation {
    // Price the tokens that would move to the cache at the target hit rate,
    // using the same full-price-equivalent estimate as the cache savings.
    let (fresh, cached) = input_totals(analysis);
    let full_price_tokens = fresh + cached * CACHE_READ_PRICE_RATIO;
    let gain = if full_price_tokens > 0.0 {
        let price_per_token = analysis.summary.total_cost / full_price_tokens;
        let shifted = (CACHE_CARD_HIT_RATE - hit_rate).max(0.0) * (fresh + cached);
        shifted * price_per_token * CACHE_DISCOUNT
    } else {
        0.0
    };
    let monthly_savings = round4(monthly(gain, days));

    Recommendation {
        kind: RecommendationKind::CacheOptimization,
        title: "Improve prompt cache reuse".to_string(),
        description: format!(
            "Only {:.0}% of input tokens were served from cache. Keeping stable system prompts and context at the start of requests raises the hit rate.",
            hit_rate * 100.0
        ),
        impact: format!("Save ~{}", dollars_per_month(monthly_savings)),
        details: vec![
            format!("Current hit rate: {:.1}%", hit_rate * 100.0),
            format!("Target hit rate: {:.0}%", CACHE_CARD_HIT_RATE * 100.0),
            format!(
                "Estimated savings from cache so far: ${:.4}",
                analysis.caching.estimated_cache_savings
            ),
        ],
        monthly_savings: Some(monthly_savings),
    }
}

fn budget_card(monthly_cost: f64) -> Recommendation {
    let daily_share = monthly_cost / 30.0;
    let daily_cap = daily_share * DAILY_CAP_FACTOR;
    let weekly_alert = daily_cap * 7.0 * WEEKLY_ALERT_SHARE;

    Recommendation {
        kind: RecommendationKind::BudgetControl,
        title: "Set spending limits".to_string(),
        description: format!(
            "Cap daily spend at ${daily_cap:.2}, alert at ${weekly_alert:.2} per week, and pause automatically at {:.0}% of budget.",
            AUTO_PAUSE_SHARE * 100.0
        ),
        impact: "Prevent overruns".to_string(),
        details: vec![
            format!("Current monthly cost: ${monthly_cost:.2}"),
            format!("Daily cap: ${daily_cap:.2}"),
            format!("Weekly alert: ${weekly_alert:.2}"),
        ],
        monthly_savings: None,
    }
}

fn agent_card(category: Category, stats: &CategoryStats, days: u32) -> Option<Recommendation> {
    let (cheapest_model, cheapest) = stats
        .model_breakdown
        .iter()
        .min_by(by_avg_cost_asc)?;

    let gain: f64 = stats
        .model_breakdown
        .values()
        .map(|b| (b.avg_cost - cheapest.avg_cost).max(0.0) * b.count as f64)
        .sum();
    let monthly_savings = round4(monthly(gain, days));

    Some(Recommendation {
        kind: RecommendationKind::AgentCreation,
        title: format!("Create a dedicated {category} agent"),
        description: format!(
            "{} {} tasks were handled in this period. A specialized agent running {} can take them over.",
            stats.count, category, cheapest_model
        ),
        impact: format!("Save ~{}", dollars_per_month(monthly_savings)),
        details: vec![
            format!("Suggested model: {cheapest_model}"),
            format!("Average cost per task: ${:.4}", cheapest.avg_cost),
        ],
        monthly_savings: Some(monthly_savings),
    })
}

/// Enrich an analysis with recommendations. The input is never modified.
///
/// An analysis without a period or without tasks is returned unchanged.
pub fn recommend(analysis: &Analysis) -> Analysis {
    let mut out = analysis.clone();
    if out.period.is_none() || out.summary.total_tasks == 0 {
        debug!("nothing to recommend");
        return out;
    }

    let days = out.period_days();
    let mut cards = Vec::new();
    let mut total_savings = 0.0;
    let mut confidences = Vec::new();

    for (category, stats) in out.categories.iter_mut() {
        let Some(switch) = model_switch(stats) else {
            continue;
        };

        total_savings += switch.potential_savings;
        confidences.push(switch.confidence);
        cards.push(switch_card(*category, &switch, days));

        if let Some(entry) = stats.model_breakdown.get_mut(&switch.current_model) {
            entry.recommendation = Some(switch);
        }
    }

    let hit_rate = exact_hit_rate(&out);
    out.caching.recommendation = Some(cache_policy(out.temporal.patterns.burst_usage, hit_rate));

    let current_monthly = out.summary.current_monthly_cost;
    let monthly_savings = monthly(total_savings, days);
    let average_confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };

    out.summary.potential_savings = Some(round4(monthly_savings));
    out.summary.optimized_monthly_cost = Some(round4(current_monthly - monthly_savings));
    out.summary.savings_percentage = Some(if current_monthly > 0.0 {
        round_to(monthly_savings / current_monthly * 100.0, 1)
    } else {
        0.0
    });
    out.summary.confidence = Some(ConfidenceLabel::from_average(average_confidence));

    if hit_rate < CACHE_CARD_HIT_RATE {
        cards.push(cache_card(&out, hit_rate, days));
    }
    if current_monthly > 0.0 {
        cards.push(budget_card(current_monthly));
    }
    for (category, stats) in &out.categories {
        if *category != Category::Other && stats.count >= AGENT_CREATION_THRESHOLD {
            cards.extend(agent_card(*category, stats, days));
        }
    }

    // Highest projected savings first; qualitative cards last.
    cards.sort_by(|a, b| match (a.monthly_savings, b.monthly_savings) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    info!(
        recommendations = cards.len(),
        potential_savings = out.summary.potential_savings,
        "generated recommendations"
    );

    out.recommendations = Some(cards);
    out
}
