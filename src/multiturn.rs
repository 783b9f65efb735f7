//! Multi-turn Executor — runs an oversized review across several chunked
//! gateway calls and hands the successful ones to the Review Synthesizer
//! (spec.md §4.8).
//!
//! Grounded in `selvage/src/multiturn/multi_turn_review_executor.py`'s
//! sequential-by-default executor and the teacher's `tokio::task::JoinSet` +
//! `tokio::sync::Semaphore` bounded-concurrency idiom (seen in
//! `agents/orchestrator.rs`) for the optional parallel strategy.

use futures::stream::{self, StreamExt};

use crate::gateway::ReviewGateway;
use crate::prompt_splitter::{self, TokenCounter};
use crate::synthesizer::{self, SynthesisConfig};
use crate::types::{EstimatedCost, ReviewPrompt, ReviewResponse, ReviewResult, UserPrompt};

/// How chunk calls are scheduled. Sequential is the default (matches the
/// original's conservative rate-limit posture); Parallel trades provider
/// rate-limit risk for wall-clock time, bounded by a semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    Sequential,
    /// Bounded concurrency; `usize` is the number of concurrent in-flight
    /// gateway calls (spec.md default: 3).
    Parallel(usize),
}

impl Default for ExecutionStrategy {
    fn default() -> Self {
        ExecutionStrategy::Sequential
    }
}

/// Runs the full multi-turn flow: split `user_prompts` into chunks sized for
/// `gateway`'s model context limit, execute each chunk's review, and
/// synthesize the successful outcomes into one `ReviewResult`.
///
/// Empty `user_prompts` short-circuits to an empty success without touching
/// the gateway (spec.md §4.8 step 1). Any chunk failing with a non-context
/// error short-circuits the whole run, returning that failure unchanged
/// (spec.md §4.8 step 4) — a context-limit failure on an individual chunk is
/// treated as an irrecoverable error the same way, since re-splitting an
/// already-split chunk is out of scope here.
pub async fn execute(
    system_prompt: &str,
    user_prompts: &[UserPrompt],
    gateway: &dyn ReviewGateway,
    overlap: usize,
    counter: &dyn TokenCounter,
    strategy: ExecutionStrategy,
) -> ReviewResult {
    if user_prompts.is_empty() {
        return ReviewResult::Success {
            review_response: ReviewResponse {
                issues: Vec::new(),
                summary: String::new(),
                score: None,
                recommendations: Vec::new(),
            },
            estimated_cost: EstimatedCost::zero(gateway.model_name(), 0, 0),
        };
    }

    let chunks = prompt_splitter::split_user_prompts(
        user_prompts,
        gateway.model_info().context_limit,
        overlap,
        counter,
    );

    let prompts: Vec<ReviewPrompt> = chunks
        .into_iter()
        .map(|chunk| ReviewPrompt { system_prompt: system_prompt.to_string(), user_prompts: chunk })
        .collect();

    let results = match strategy {
        ExecutionStrategy::Sequential => run_sequential(&prompts, gateway).await,
        ExecutionStrategy::Parallel(max_parallel) => run_parallel(prompts, gateway, max_parallel).await,
    };

    let mut successes: Vec<(ReviewResponse, EstimatedCost)> = Vec::with_capacity(results.len());
    for result in results {
        match result {
            ReviewResult::Success { review_response, estimated_cost } => {
                successes.push((review_response, estimated_cost));
            }
            failure @ ReviewResult::Error { .. } => {
                tracing::warn!("multi-turn chunk failed; short-circuiting");
                return failure;
            }
        }
    }

    synthesizer::synthesize(&successes, gateway, &SynthesisConfig::default()).await
}

async fn run_sequential(prompts: &[ReviewPrompt], gateway: &dyn ReviewGateway) -> Vec<ReviewResult> {
    let mut results = Vec::with_capacity(prompts.len());
    for (index, prompt) in prompts.iter().enumerate() {
        tracing::info!(chunk = index, total = prompts.len(), "running multi-turn chunk");
        results.push(gateway.review_code(prompt).await);
    }
    results
}

/// Bounded-parallel execution: up to `max_parallel` chunk calls are in
/// flight at once, order is preserved in the returned `Vec` regardless of
/// completion order (spec.md §4.8's alternative strategy).
async fn run_parallel(
    prompts: Vec<ReviewPrompt>,
    gateway: &dyn ReviewGateway,
    max_parallel: usize,
) -> Vec<ReviewResult> {
    stream::iter(prompts.iter())
        .map(|prompt| gateway.review_code(prompt))
        .buffered(max_parallel.max(1))
        .collect()
        .await
}
