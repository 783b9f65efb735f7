//! OpenAI gateway (spec.md §4.5 steps 1-3,7,8).
//!
//! Grounded in `selvage/src/llm_gateway/openai_gateway.py` (params =
//! `{model, messages}` + `model["params"]` merge; schema attached via a
//! structured-output helper at the base-gateway level) and the teacher's
//! `llm/openrouter.rs` for the retry-loop/reqwest-client shape.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cost_estimator::{self, OpenAiUsage, Usage};
use crate::error::GatewayError;
use crate::gateway::{backoff_delay, render_user_messages, ReviewGateway};
use crate::json_extractor;
use crate::schema::review_response_json_schema;
use crate::types::{ErrorResponse, ModelInfo, Provider, ReviewPrompt, ReviewResponse, ReviewResult};

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// 1 retry (2 attempts total), per spec.md §4.5.
const MAX_ATTEMPTS: u32 = 2;

pub struct OpenAiGateway {
    client: reqwest::Client,
    api_key: String,
    model_info: ModelInfo,
}

impl OpenAiGateway {
    pub fn new(model_info: ModelInfo, api_key: String) -> Result<Self, GatewayError> {
        if model_info.provider != Provider::OpenAi {
            return Err(GatewayError::InvalidModelProvider {
                model: model_info.full_name.clone(),
                expected: "openai".to_string(),
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

    async fn call_once(&self, prompt: &ReviewPrompt) -> Result<(ReviewResponse, OpenAiUsage), GatewayError> {
        let mut messages = vec![json!({"role": "system", "content": prompt.system_prompt})];
        for content in render_user_messages(prompt) {
            messages.push(json!({"role": "user", "content": content}));
        }

        let mut body = serde_json::Map::new();
        body.insert("model".to_string(), json!(self.model_info.full_name));
        body.insert("messages".to_string(), json!(messages));
        body.insert(
            "response_format".to_string(),
            json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "structured_review_response",
                    "schema": review_response_json_schema(),
                    "strict": true
                }
            }),
        );
        for (k, v) in &self.model_info.params {
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

        let parsed: OpenAiChatResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed OpenAI response: {e}")))?;

        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| GatewayError::Response("no choices in OpenAI response".to_string()))?;

        let review: ReviewResponse = json_extractor::extract(&choice.message.content)?;
        let usage = parsed.usage.unwrap_or_default();
        Ok((review, OpenAiUsage { prompt_tokens: usage.prompt_tokens, completion_tokens: usage.completion_tokens }))
    }
}

#[async_trait]
impl ReviewGateway for OpenAiGateway {
    async fn review_code(&self, prompt: &ReviewPrompt) -> ReviewResult {
        let mut last_err: Option<GatewayError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.call_once(prompt).await {
                Ok((review, usage)) => {
                    let cost = cost_estimator::estimate(&self.model_info.full_name, Usage::OpenAi(usage));
                    return ReviewResult::Success { review_response: review, estimated_cost: cost };
                }
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 == MAX_ATTEMPTS {
                        return to_error_result(Provider::OpenAi, e);
                    }
                    tracing::warn!(attempt, error = %e, "retrying OpenAI gateway call");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    last_err = Some(e);
                }
            }
        }
        to_error_result(Provider::OpenAi, last_err.expect("loop runs at least once"))
    }

    fn model_name(&self) -> &str {
        &self.model_info.full_name
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
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
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content},
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {"name": schema_name, "schema": schema, "strict": true}
            }
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
        let parsed: OpenAiChatResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed OpenAI response: {e}")))?;
        let choice = parsed
            .choices
            .first()
            .ok_or_else(|| GatewayError::Response("no choices in OpenAI response".to_string()))?;
        let value = json_extractor::extract(&choice.message.content)?;
        let usage = parsed.usage.unwrap_or_default();
        Ok((value, usage.prompt_tokens, usage.completion_tokens))
    }
}

pub(crate) fn to_error_result(provider: Provider, err: GatewayError) -> ReviewResult {
    let mut raw_error = BTreeMap::new();
    if let GatewayError::ContextLimitExceeded { actual_tokens, max_tokens } = &err {
        if let Some(t) = actual_tokens {
            raw_error.insert("actual_tokens".to_string(), json!(t));
        }
        if let Some(t) = max_tokens {
            raw_error.insert("max_tokens".to_string(), json!(t));
        }
    }
    ReviewResult::Error {
        error: ErrorResponse {
            provider,
            error_type: err.error_type(),
            error_message: err.to_string(),
            raw_error,
        },
    }
}

pub(crate) fn classify_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::Connection(e.to_string())
    } else {
        GatewayError::Connection(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsageWire>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct OpenAiUsageWire {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Pricing, Provider};
    use std::collections::HashSet;

    fn sample_model(provider: Provider) -> ModelInfo {
        ModelInfo {
            full_name: "gpt-4o".to_string(),
            aliases: HashSet::new(),
            provider,
            params: BTreeMap::new(),
            thinking_mode: false,
            pricing: Pricing { input_per_million: 2.5, output_per_million: 10.0, description: "x".into() },
            context_limit: 128_000,
            openrouter_name: Some("openai/gpt-4o".to_string()),
        }
    }

    #[test]
    fn rejects_model_from_another_provider() {
        let model = sample_model(Provider::Anthropic);
        let err = OpenAiGateway::new(model, "key".to_string()).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidModelProvider { .. }));
    }

    #[test]
    fn accepts_matching_provider() {
        let model = sample_model(Provider::OpenAi);
        assert!(OpenAiGateway::new(model, "key".to_string()).is_ok());
    }
}
