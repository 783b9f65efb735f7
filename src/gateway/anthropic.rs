//! Anthropic gateway (spec.md §4.5 steps 1,2,3,5,7,8).
//!
//! Grounded in `selvage/src/llm_gateway/claude_gateway.py`: the
//! thinking-mode branch separates the system message, uses `max_tokens =
//! 48000`, and bypasses the schema helper in favor of free-form text run
//! through the JSON Extractor; the non-thinking branch uses `max_tokens =
//! 8192` with a schema-constrained tool call, then `params.update(model
//! ["params"])` merges per-model overrides on top.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::cost_estimator::{self, AnthropicUsage, Usage};
use crate::error::GatewayError;
use crate::gateway::openai::{classify_reqwest_error, to_error_result};
use crate::gateway::{backoff_delay, render_user_messages, ReviewGateway};
use crate::json_extractor;
use crate::schema::review_response_json_schema;
use crate::types::{ModelInfo, Provider, ReviewPrompt, ReviewResponse, ReviewResult};

const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ATTEMPTS: u32 = 2;
const THINKING_MAX_TOKENS: u64 = 48_000;
const DEFAULT_MAX_TOKENS: u64 = 8_192;
const TOOL_NAME: &str = "structured_review_response";

pub struct AnthropicGateway {
    client: reqwest::Client,
    api_key: String,
    model_info: ModelInfo,
}

impl AnthropicGateway {
    pub fn new(model_info: ModelInfo, api_key: String) -> Result<Self, GatewayError> {
        if model_info.provider != Provider::Anthropic {
            return Err(GatewayError::InvalidModelProvider {
                model: model_info.full_name.clone(),
                expected: "anthropic".to_string(),
            });
        }
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("reqwest client builds"),
            api_key,
            model_info,
        })
    }

    async fn call_once(&self, prompt: &ReviewPrompt) -> Result<(ReviewResponse, AnthropicUsage), GatewayError> {
        let messages: Vec<_> = render_user_messages(prompt)
            .into_iter()
            .map(|content| json!({"role": "user", "content": content}))
            .collect();

        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(self.model_info.full_name));
        body.insert("system".to_string(), json!(prompt.system_prompt));
        body.insert("messages".to_string(), json!(messages));

        if self.model_info.thinking_mode {
            body.insert("max_tokens".to_string(), json!(THINKING_MAX_TOKENS));
        } else {
            body.insert("max_tokens".to_string(), json!(DEFAULT_MAX_TOKENS));
            body.insert(
                "tools".to_string(),
                json!([{
                    "name": TOOL_NAME,
                    "input_schema": review_response_json_schema(),
                }]),
            );
            body.insert("tool_choice".to_string(), json!({"type": "tool", "name": TOOL_NAME}));
        }
        for (k, v) in &self.model_info.params {
            body.insert(k.clone(), v.clone());
        }

        let response = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let parsed: AnthropicMessageResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed Anthropic response: {e}")))?;

        let raw_json = extract_raw_json(&parsed)?;
        let review: ReviewResponse = json_extractor::extract(&raw_json)?;
        let usage = parsed.usage.unwrap_or_default();
        Ok((
            review,
            AnthropicUsage { input_tokens: usage.input_tokens, output_tokens: usage.output_tokens },
        ))
    }
}

/// Thinking-mode models return free-form text; non-thinking models return a
/// `tool_use` content block whose `input` is already a JSON object.
fn extract_raw_json(response: &AnthropicMessageResponse) -> Result<String, GatewayError> {
    for block in &response.content {
        if let Some(input) = &block.input {
            return Ok(input.to_string());
        }
        if let Some(text) = &block.text {
            return Ok(text.clone());
        }
    }
    Err(GatewayError::Response("no usable content block in Anthropic response".to_string()))
}

#[async_trait]
impl ReviewGateway for AnthropicGateway {
    async fn review_code(&self, prompt: &ReviewPrompt) -> ReviewResult {
        let mut last_err: Option<GatewayError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.call_once(prompt).await {
                Ok((review, usage)) => {
                    let cost =
                        cost_estimator::estimate(&self.model_info.full_name, Usage::Anthropic(usage));
                    return ReviewResult::Success { review_response: review, estimated_cost: cost };
                }
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 == MAX_ATTEMPTS {
                        return to_error_result(Provider::Anthropic, e);
                    }
                    tracing::warn!(attempt, error = %e, "retrying Anthropic gateway call");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    last_err = Some(e);
                }
            }
        }
        to_error_result(Provider::Anthropic, last_err.expect("loop runs at least once"))
    }

    fn model_name(&self) -> &str {
        &self.model_info.full_name
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
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
            "model": self.model_info.full_name,
            "system": system_prompt,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "messages": [{"role": "user", "content": user_content}],
            "tools": [{"name": schema_name, "input_schema": schema}],
            "tool_choice": {"type": "tool", "name": schema_name},
        });

        let response = self
            .client
            .post(ENDPOINT)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;
        if !status.is_success() {
            return Err(GatewayError::Response(format!("HTTP {status}: {text}")));
        }
        let parsed: AnthropicMessageResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed Anthropic response: {e}")))?;
        let raw_json = extract_raw_json(&parsed)?;
        let value = json_extractor::extract(&raw_json)?;
        let usage = parsed.usage.unwrap_or_default();
        Ok((value, usage.input_tokens, usage.output_tokens))
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageResponse {
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsageWire>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsageWire {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pricing;
    use std::collections::HashSet;

    fn sample_model(thinking: bool) -> ModelInfo {
        ModelInfo {
            full_name: "claude-sonnet-4.5".to_string(),
            aliases: HashSet::new(),
            provider: Provider::Anthropic,
            params: BTreeMap::new(),
            thinking_mode: thinking,
            pricing: Pricing { input_per_million: 3.0, output_per_million: 15.0, description: "x".into() },
            context_limit: 200_000,
            openrouter_name: Some("anthropic/claude-sonnet-4.5".to_string()),
        }
    }

    #[test]
    fn rejects_non_anthropic_model() {
        let mut model = sample_model(false);
        model.provider = Provider::OpenAi;
        assert!(AnthropicGateway::new(model, "key".into()).is_err());
    }

    #[test]
    fn extracts_tool_use_input_before_falling_back_to_text() {
        let response = AnthropicMessageResponse {
            content: vec![AnthropicContentBlock {
                text: Some("ignored".to_string()),
                input: Some(json!({"summary": "ok", "issues": [], "recommendations": []})),
            }],
            usage: None,
        };
        let raw = extract_raw_json(&response).unwrap();
        assert!(raw.contains("\"summary\""));
    }
}
