//! Review Synthesizer — merges the per-chunk `ReviewResponse`s produced by
//! the Multi-turn Executor into one (spec.md §4.9).
//!
//! Grounded in `selvage/src/multiturn/review_synthesizer.py`: issues are
//! concatenated with no dedup, the score is copied from the first chunk
//! (an Open Question resolved in SPEC_FULL.md §9 — shipped as-is, flagged
//! below), recommendations are deduped order-preservingly, and summary
//! synthesis prefers an LLM call with a fixed fallback ladder.

use std::collections::HashSet;

use serde_json::json;

use crate::cost_estimator::{self, OpenAiUsage, Usage};
use crate::gateway::ReviewGateway;
use crate::types::{EstimatedCost, ReviewIssue, ReviewResponse, ReviewResult};

/// Ported verbatim from `ReviewSynthesizer`'s class-level constants.
pub struct SynthesisConfig {
    pub max_tokens: u32,
    pub temperature: f64,
    pub max_retries: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self { max_tokens: 5_000, temperature: 0.1, max_retries: 2 }
    }
}

/// The exact fallback string used when no chunk produced a usable summary,
/// carried byte-for-byte from `review_synthesizer.py`.
const FALLBACK_SUMMARY: &str = "리뷰 결과를 합성할 수 없습니다.";

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are synthesizing several partial code review summaries, each covering a \
     different chunk of the same change, into one coherent overall summary. \
     Respond with JSON matching the given schema.";

const RECOMMENDATIONS_SYSTEM_PROMPT: &str =
    "You are consolidating a list of code review recommendations that may contain \
     near-duplicates into a concise, non-redundant list. Preserve the meaning of \
     every distinct recommendation. Respond with JSON matching the given schema.";

/// Merges `chunk_results` — the successful outcome of every chunk the
/// Multi-turn Executor ran — into a single `ReviewResult::Success`. Always
/// succeeds: LLM-driven synthesis failures fall back to deterministic
/// merging rather than propagating an error (spec.md §4.9 step 4).
pub async fn synthesize(
    chunk_results: &[(ReviewResponse, EstimatedCost)],
    gateway: &dyn ReviewGateway,
    config: &SynthesisConfig,
) -> ReviewResult {
    if chunk_results.is_empty() {
        return ReviewResult::Success {
            review_response: ReviewResponse {
                issues: Vec::new(),
                summary: FALLBACK_SUMMARY.to_string(),
                score: None,
                recommendations: Vec::new(),
            },
            estimated_cost: EstimatedCost::zero(gateway.model_name(), 0, 0),
        };
    }

    let issues: Vec<ReviewIssue> = chunk_results.iter().flat_map(|(r, _)| r.issues.clone()).collect();
    let score = chunk_results[0].0.score;

    let summaries: Vec<String> = chunk_results.iter().map(|(r, _)| r.summary.clone()).collect();
    let all_recommendations: Vec<String> =
        chunk_results.iter().flat_map(|(r, _)| r.recommendations.clone()).collect();

    let (summary, summary_cost) = synthesize_summary(&summaries, gateway, config).await;
    let (recommendations, rec_cost) = dedup_recommendations(&all_recommendations, gateway, config).await;

    let mut total_cost = chunk_results
        .iter()
        .fold(EstimatedCost::zero(gateway.model_name(), 0, 0), |acc, (_, c)| acc.add(c));
    if let Some(c) = summary_cost {
        total_cost = total_cost.add(&c);
    }
    if let Some(c) = rec_cost {
        total_cost = total_cost.add(&c);
    }

    ReviewResult::Success {
        review_response: ReviewResponse { issues, summary, score, recommendations },
        estimated_cost: total_cost,
    }
}

async fn synthesize_summary(
    summaries: &[String],
    gateway: &dyn ReviewGateway,
    config: &SynthesisConfig,
) -> (String, Option<EstimatedCost>) {
    if summaries.is_empty() {
        return (FALLBACK_SUMMARY.to_string(), None);
    }

    let joined = summaries
        .iter()
        .enumerate()
        .map(|(i, s)| format!("Chunk {}: {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n\n");
    let schema = json!({
        "type": "object",
        "properties": {"summary": {"type": "string"}},
        "required": ["summary"],
    });

    for attempt in 0..config.max_retries {
        match gateway.complete_json(SUMMARY_SYSTEM_PROMPT, &joined, "summary_synthesis_result", schema.clone()).await
        {
            Ok((value, input_tokens, output_tokens)) => {
                if let Some(summary) = value.get("summary").and_then(|v| v.as_str()) {
                    let cost = cost_estimator::estimate(
                        gateway.model_name(),
                        Usage::OpenAi(OpenAiUsage { prompt_tokens: input_tokens, completion_tokens: output_tokens }),
                    );
                    return (summary.to_string(), Some(cost));
                }
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "summary synthesis call failed");
            }
        }
    }

    tracing::warn!("summary synthesis exhausted retries, falling back to deterministic merge");
    (fallback_summary(summaries), None)
}

/// Fallback ladder once LLM synthesis is unavailable: 1 summary is returned
/// as-is, many summaries fall back to the longest (a simple, deterministic
/// proxy for "most informative").
fn fallback_summary(summaries: &[String]) -> String {
    match summaries.len() {
        0 => FALLBACK_SUMMARY.to_string(),
        1 => summaries[0].clone(),
        _ => summaries.iter().max_by_key(|s| s.chars().count()).cloned().unwrap_or_default(),
    }
}

async fn dedup_recommendations(
    recommendations: &[String],
    gateway: &dyn ReviewGateway,
    config: &SynthesisConfig,
) -> (Vec<String>, Option<EstimatedCost>) {
    let deduped = order_preserving_dedup(recommendations);
    if deduped.len() <= 1 {
        return (deduped, None);
    }

    let joined = deduped
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {}", i + 1, r))
        .collect::<Vec<_>>()
        .join("\n");
    let schema = json!({
        "type": "object",
        "properties": {
            "recommendations": {"type": "array", "items": {"type": "string"}},
        },
        "required": ["recommendations"],
    });

    for attempt in 0..config.max_retries {
        match gateway
            .complete_json(RECOMMENDATIONS_SYSTEM_PROMPT, &joined, "recommendation_consolidation_result", schema.clone())
            .await
        {
            Ok((value, input_tokens, output_tokens)) => {
                if let Some(items) = value.get("recommendations").and_then(|v| v.as_array()) {
                    let merged: Vec<String> =
                        items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
                    if !merged.is_empty() {
                        let cost = cost_estimator::estimate(
                            gateway.model_name(),
                            Usage::OpenAi(OpenAiUsage {
                                prompt_tokens: input_tokens,
                                completion_tokens: output_tokens,
                            }),
                        );
                        return (merged, Some(cost));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "recommendation consolidation call failed");
            }
        }
    }

    (deduped, None)
}

/// Order-preserving dedup, equivalent to Python's `dict.fromkeys(...)`.
fn order_preserving_dedup(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_preserving_dedup_keeps_first_occurrence_order() {
        let items = vec!["a".to_string(), "b".to_string(), "a".to_string(), "c".to_string()];
        assert_eq!(order_preserving_dedup(&items), vec!["a", "b", "c"]);
    }

    #[test]
    fn fallback_summary_returns_single_summary_as_is() {
        let summaries = vec!["only one".to_string()];
        assert_eq!(fallback_summary(&summaries), "only one");
    }

    #[test]
    fn fallback_summary_picks_longest_among_many() {
        let summaries = vec!["short".to_string(), "a much longer summary here".to_string(), "mid length".to_string()];
        assert_eq!(fallback_summary(&summaries), "a much longer summary here");
    }

    #[test]
    fn fallback_summary_empty_uses_fixed_string() {
        assert_eq!(fallback_summary(&[]), FALLBACK_SUMMARY);
    }
}
