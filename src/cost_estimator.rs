//! Cost Estimator — converts provider-specific usage records into a
//! normalized `EstimatedCost` (spec.md §4.2).
//!
//! Grounded in `selvage/src/utils/token/cost_estimator.py`'s
//! per-provider static methods and the teacher's
//! `cost.rs::cost_cents_from_usage` "never throw, log+zero on unknown model"
//! behavior — adapted from integer nanodollars/cents to the spec's
//! float-dollar `EstimatedCost` fields.

use crate::catalog::{self, CatalogError};
use crate::types::{round6, EstimatedCost};

/// Usage as reported by the OpenAI chat completions API.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Usage as reported by the Anthropic messages API.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Usage as reported by the Google Gemini API.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleUsage {
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
}

/// Normalized usage plus an optional OpenRouter-supplied pre-computed cost.
#[derive(Debug, Clone, Copy)]
pub enum Usage {
    OpenAi(OpenAiUsage),
    Anthropic(AnthropicUsage),
    Google(GoogleUsage),
    /// OpenRouter returns OpenAI-shaped usage and may supply `cost` directly;
    /// when present — including a verbatim `0.0` — it is used as-is and
    /// per-token costs are zeroed; only its *absence* falls back to catalog
    /// pricing (spec.md §4.2, grounded in `openrouter/gateway.py`'s cost
    /// handling).
    OpenRouterPrecomputed { usage: OpenAiUsage, cost_usd: Option<f64> },
}

fn token_counts(usage: &Usage) -> (u64, u64) {
    match usage {
        Usage::OpenAi(u) => (u.prompt_tokens, u.completion_tokens),
        Usage::Anthropic(u) => (u.input_tokens, u.output_tokens),
        Usage::Google(u) => (u.prompt_token_count, u.candidates_token_count),
        Usage::OpenRouterPrecomputed { usage, .. } => {
            (usage.prompt_tokens, usage.completion_tokens)
        }
    }
}

/// `estimate(model, usage) -> EstimatedCost`. Never throws: an unknown model
/// yields a zero-cost record (with the original token counts preserved) and a
/// logged warning, matching selvage's `CostEstimator` catching
/// `UnsupportedModelError`.
pub fn estimate(model: &str, usage: Usage) -> EstimatedCost {
    let (input_tokens, output_tokens) = token_counts(&usage);

    if let Usage::OpenRouterPrecomputed { cost_usd: Some(cost_usd), .. } = usage {
        return EstimatedCost {
            model: model.to_string(),
            input_tokens,
            output_tokens,
            input_cost_usd: 0.0,
            output_cost_usd: 0.0,
            total_cost_usd: round6(cost_usd),
        };
    }

    match catalog::pricing(model) {
        Ok(pricing) => {
            let input_cost_usd = round6(input_tokens as f64 * pricing.input_per_million / 1_000_000.0);
            let output_cost_usd =
                round6(output_tokens as f64 * pricing.output_per_million / 1_000_000.0);
            EstimatedCost {
                model: model.to_string(),
                input_tokens,
                output_tokens,
                input_cost_usd,
                output_cost_usd,
                total_cost_usd: round6(input_cost_usd + output_cost_usd),
            }
        }
        Err(CatalogError::UnsupportedModel(_)) => {
            tracing::warn!(model, "no pricing found for model; returning zero cost");
            EstimatedCost::zero(model, input_tokens, output_tokens)
        }
    }
}
