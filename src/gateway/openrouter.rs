//! OpenRouter gateway — the production HTTP-client variant (spec.md §4.5
//! step 6, §9 Open Question: the superseded `instructor`-based variant is
//! deliberately not ported).
//!
//! Grounded in `selvage/src/llm_gateway/openrouter/gateway.py` and the
//! teacher's `llm/openrouter.rs` (retry-loop shape, reqwest client reuse,
//! `tracing::warn!`/`error!` logging around attempts).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::cost_estimator::{self, OpenAiUsage, Usage};
use crate::error::GatewayError;
use crate::gateway::openai::{classify_reqwest_error, to_error_result};
use crate::gateway::{backoff_delay, render_user_messages, ReviewGateway};
use crate::json_extractor;
use crate::schema::review_response_json_schema;
use crate::types::{ModelInfo, Provider, ReviewPrompt, ReviewResponse, ReviewResult};

const ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
/// 2 retries (3 attempts total), per spec.md §4.5 — the only gateway with a
/// wider retry budget, matching `openrouter/gateway.py`'s
/// `stop_after_attempt(3)`.
const MAX_ATTEMPTS: u32 = 3;

pub struct OpenRouterGateway {
    client: reqwest::Client,
    api_key: String,
    model_info: ModelInfo,
    openrouter_name: String,
}

impl OpenRouterGateway {
    pub fn new(model_info: ModelInfo, api_key: String) -> Result<Self, GatewayError> {
        let openrouter_name = model_info
            .openrouter_name
            .clone()
            .ok_or_else(|| GatewayError::UnsupportedModel(model_info.full_name.clone()))?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("reqwest client builds"),
            api_key,
            model_info,
            openrouter_name,
        })
    }

    fn is_claude_model(&self) -> bool {
        self.openrouter_name.starts_with("anthropic/claude")
    }

    async fn call_once(
        &self,
        prompt: &ReviewPrompt,
    ) -> Result<(ReviewResponse, OpenAiUsage, Option<f64>), GatewayError> {
        let mut messages = vec![json!({"role": "system", "content": prompt.system_prompt})];
        for content in render_user_messages(prompt) {
            messages.push(json!({"role": "user", "content": content}));
        }

        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(self.openrouter_name));
        body.insert("messages".to_string(), json!(messages));
        body.insert(
            "response_format".to_string(),
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "structured_review_response",
                    "strict": true,
                    "schema": review_response_json_schema(),
                }
            }),
        );
        body.insert("usage".to_string(), json!({"include": true}));

        for (k, v) in &self.model_info.params {
            if k == "thinking" {
                // translate Anthropic's thinking-budget param into OpenRouter's
                // `reasoning.max_tokens`, Claude models only.
                if self.is_claude_model() {
                    if let Some(budget) = v.get("budget_tokens") {
                        body.insert("reasoning".to_string(), json!({"max_tokens": budget}));
                    }
                }
                continue;
            }
            body.insert(k.clone(), v.clone());
        }

        let response = self
            .client
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(GatewayError::Authentication(text));
        }
        if !status.is_success() {
            if GatewayError::looks_like_context_limit(&text) {
                return Err(GatewayError::ContextLimitExceeded { actual_tokens: None, max_tokens: None });
            }
            return Err(GatewayError::Response(format!("HTTP {status}: {text}")));
        }

        let parsed: OpenRouterChatResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed OpenRouter response: {e}")))?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| GatewayError::Response("no choices in OpenRouter response".to_string()))?;
        let content = choice
            .message
            .content
            .as_deref()
            .ok_or_else(|| GatewayError::Response("no content in OpenRouter message".to_string()))?;

        let review: ReviewResponse = json_extractor::extract(content)?;
        let usage = parsed.usage.unwrap_or_default();
        Ok((
            review,
            OpenAiUsage { prompt_tokens: usage.prompt_tokens, completion_tokens: usage.completion_tokens },
            usage.cost,
        ))
    }
}

#[async_trait]
impl ReviewGateway for OpenRouterGateway {
    async fn review_code(&self, prompt: &ReviewPrompt) -> ReviewResult {
        let mut last_err: Option<GatewayError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.call_once(prompt).await {
                Ok((review, usage, cost_usd)) => {
                    let cost = cost_estimator::estimate(
                        &self.model_info.full_name,
                        Usage::OpenRouterPrecomputed { usage, cost_usd },
                    );
                    return ReviewResult::Success { review_response: review, estimated_cost: cost };
                }
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 == MAX_ATTEMPTS {
                        return to_error_result(Provider::OpenRouter, e);
                    }
                    tracing::warn!(attempt, error = %e, "retrying OpenRouter gateway call");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    last_err = Some(e);
                }
            }
        }
        tracing::error!("OpenRouter retries exhausted");
        to_error_result(Provider::OpenRouter, last_err.expect("loop runs at least once"))
    }

    fn model_name(&self) -> &str {
        &self.model_info.full_name
    }

    fn provider(&self) -> Provider {
        Provider::OpenRouter
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    async fn complete_json(
        &self,
        system_prompt: &str,
        user_content: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<(serde_json::Value, u64, u64), GatewayError> {
        let body = json!({
            "model": self.openrouter_name,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": schema_name, "strict": true, "schema": schema}
            },
            "usage": {"include": true},
        });

        let response = self
            .client
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;
        if !status.is_success() {
            return Err(GatewayError::Response(format!("HTTP {status}: {text}")));
        }
        let parsed: OpenRouterChatResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed OpenRouter response: {e}")))?;
        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| GatewayError::Response("no choices in OpenRouter response".to_string()))?;
        let content = choice
            .message
            .content
            .as_deref()
            .ok_or_else(|| GatewayError::Response("no content in OpenRouter message".to_string()))?;
        let value = json_extractor::extract(content)?;
        let usage = parsed.usage.unwrap_or_default();
        Ok((value, usage.prompt_tokens, usage.completion_tokens))
    }
}

#[derive(Debug, Deserialize)]
struct OpenRouterChatResponse {
    choices: Vec<OpenRouterChoice>,
    #[serde(default)]
    usage: Option<OpenRouterUsageWire>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    message: OpenRouterMessage,
}

#[derive(Debug, Deserialize)]
struct OpenRouterMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenRouterUsageWire {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    cost: Option<f64>,
}
