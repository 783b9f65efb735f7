//! Orchestrator — the thin glue tying cache, gateway factory, and multi-turn
//! execution into one entry point (SPEC_FULL.md §2 supplement, grounded in
//! the call sites implied by `cli.py` around `cache_manager.py` and
//! `multi_turn_review_executor.py`).
//!
//! Diff acquisition and prompt construction from a raw diff are out of scope
//! (spec.md §1 "Out of scope": git/diff acquisition); callers hand in an
//! already-built `ReviewPrompt` alongside the `ReviewRequest` used purely as
//! the cache key handle.

use crate::cache::Cache;
use crate::gateway::factory::GatewayFactory;
use crate::gateway::openai::to_error_result;
use crate::multiturn::{self, ExecutionStrategy};
use crate::prompt_splitter::ApproxTokenCounter;
use crate::types::{EstimatedCost, ReviewRequest, ReviewResult};

/// `review(request, prompt) -> ReviewResult`: cache lookup, gateway dispatch,
/// context-limit fallback to multi-turn, cache write-through on success
/// (SPEC_FULL.md §2).
pub async fn review(
    request: &ReviewRequest,
    prompt: &crate::types::ReviewPrompt,
    factory: &GatewayFactory,
    cache: Option<&Cache>,
    strategy: ExecutionStrategy,
) -> ReviewResult {
    if let Some(cache) = cache {
        if let Some((review_response, estimated_cost)) = cache.get(request) {
            tracing::debug!(model = %request.model, "cache hit");
            return ReviewResult::Success {
                review_response,
                estimated_cost: estimated_cost
                    .unwrap_or_else(|| EstimatedCost::zero(&request.model, 0, 0)),
            };
        }
    }

    let gateway = match factory.create(&request.model) {
        Ok(gateway) => gateway,
        // A factory failure happens before any gateway is chosen, so the
        // nominal provider is whatever the catalog resolves the model to
        // (unresolvable only for a genuinely unknown model name).
        Err(e) => {
            let provider = crate::catalog::provider(&request.model).unwrap_or(crate::types::Provider::OpenRouter);
            return to_error_result(provider, e);
        }
    };

    let mut result = gateway.review_code(prompt).await;

    if let ReviewResult::Error { error } = &result {
        if error.error_type == crate::types::ErrorType::ContextLimitExceeded {
            tracing::info!(model = %request.model, "context limit exceeded, falling back to multi-turn");
            result = multiturn::execute(
                &prompt.system_prompt,
                &prompt.user_prompts,
                gateway.as_ref(),
                0,
                &ApproxTokenCounter,
                strategy,
            )
            .await;
        }
    }

    if let (Some(cache), ReviewResult::Success { review_response, estimated_cost }) = (cache, &result) {
        if let Err(e) = cache.put(request, review_response, Some(estimated_cost), None) {
            tracing::warn!(error = %e, "failed to write cache entry");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::factory::ApiKeys;
    use crate::types::{FileContextInfo, Provider, ReviewPrompt, UserPrompt};

    fn sample_request() -> ReviewRequest {
        ReviewRequest {
            diff_content: "+x = 1\n".to_string(),
            model: "unknown-model".to_string(),
            use_full_context: true,
            file_paths: vec![],
        }
    }

    fn sample_prompt() -> ReviewPrompt {
        ReviewPrompt {
            system_prompt: "review this".to_string(),
            user_prompts: vec![UserPrompt {
                file_name: "a.py".to_string(),
                language: "python".to_string(),
                file_context: FileContextInfo::FullContext { content: "x = 1".to_string() },
                hunks: vec![],
            }],
        }
    }

    #[tokio::test]
    async fn unsupported_model_is_an_error_with_no_cache_write() {
        let factory = GatewayFactory::new(ApiKeys::default());
        let request = sample_request();
        let result =
            review(&request, &sample_prompt(), &factory, None, ExecutionStrategy::Sequential).await;
        match result {
            ReviewResult::Error { error } => {
                assert_eq!(error.error_type, crate::types::ErrorType::UnsupportedModel);
            }
            ReviewResult::Success { .. } => panic!("expected error"),
        }
    }

    #[tokio::test]
    async fn missing_api_key_surfaces_as_authentication_error() {
        let factory = GatewayFactory::new(ApiKeys::default());
        let mut request = sample_request();
        request.model = "gpt-4o".to_string();
        let result =
            review(&request, &sample_prompt(), &factory, None, ExecutionStrategy::Sequential).await;
        match result {
            ReviewResult::Error { error } => {
                assert_eq!(error.error_type, crate::types::ErrorType::AuthenticationError);
                assert_eq!(error.provider, Provider::OpenAi);
            }
            ReviewResult::Success { .. } => panic!("expected error"),
        }
    }
}
