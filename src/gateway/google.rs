//! Google Gemini gateway (spec.md §4.5 steps 1,2,4,7,8).
//!
//! Grounded in `selvage/src/llm_gateway/google_gateway.py`: system prompt and
//! user contents are separated, `response_mime_type = "application/json"` and
//! `response_schema` are attached directly (Gemini's native structured-output
//! support, used instead of the JSON Extractor), temperature defaults to 0.0
//! unless overridden by `model["params"]`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::cost_estimator::{self, GoogleUsage, Usage};
use crate::error::GatewayError;
use crate::gateway::openai::{classify_reqwest_error, to_error_result};
use crate::gateway::{backoff_delay, render_user_messages, ReviewGateway};
use crate::json_extractor;
use crate::schema::review_response_json_schema;
use crate::types::{ModelInfo, Provider, ReviewPrompt, ReviewResponse, ReviewResult};

const MAX_ATTEMPTS: u32 = 2;

pub struct GoogleGateway {
    client: reqwest::Client,
    api_key: String,
    model_info: ModelInfo,
}

impl GoogleGateway {
    pub fn new(model_info: ModelInfo, api_key: String) -> Result<Self, GatewayError> {
        if model_info.provider != Provider::Google {
            return Err(GatewayError::InvalidModelProvider {
                model: model_info.full_name.clone(),
                expected: "google".to_string(),
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

    fn endpoint(&self) -> String {
        format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model_info.full_name
        )
    }

    async fn call_once(&self, prompt: &ReviewPrompt) -> Result<(ReviewResponse, GoogleUsage), GatewayError> {
        let contents: Vec<_> = render_user_messages(prompt)
            .into_iter()
            .map(|content| json!({"role": "user", "parts": [{"text": content}]}))
            .collect();

        let temperature = self
            .model_info
            .params
            .get("temperature")
            .cloned()
            .unwrap_or_else(|| json!(0.0));

        let mut generation_config = serde_json::Map::new();
        generation_config.insert("temperature".to_string(), temperature);
        generation_config.insert("response_mime_type".to_string(), json!("application/json"));
        generation_config.insert("response_schema".to_string(), review_response_json_schema());

        let body = json!({
            "system_instruction": {"parts": [{"text": prompt.system_prompt}]},
            "contents": contents,
            "generation_config": generation_config,
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
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

        let parsed: GoogleGenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed Gemini response: {e}")))?;

        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| GatewayError::Response("no candidates in Gemini response".to_string()))?;
        let part = candidate
            .content
            .parts
            .first()
            .ok_or_else(|| GatewayError::Response("no parts in Gemini candidate".to_string()))?;

        let review: ReviewResponse = json_extractor::extract(&part.text)?;
        let usage = parsed.usage_metadata.unwrap_or_default();
        Ok((
            review,
            GoogleUsage {
                prompt_token_count: usage.prompt_token_count,
                candidates_token_count: usage.candidates_token_count,
            },
        ))
    }
}

#[async_trait]
impl ReviewGateway for GoogleGateway {
    async fn review_code(&self, prompt: &ReviewPrompt) -> ReviewResult {
        let mut last_err: Option<GatewayError> = None;
        for attempt in 0..MAX_ATTEMPTS {
            match self.call_once(prompt).await {
                Ok((review, usage)) => {
                    let cost = cost_estimator::estimate(&self.model_info.full_name, Usage::Google(usage));
                    return ReviewResult::Success { review_response: review, estimated_cost: cost };
                }
                Err(e) => {
                    if !e.is_retryable() || attempt + 1 == MAX_ATTEMPTS {
                        return to_error_result(Provider::Google, e);
                    }
                    tracing::warn!(attempt, error = %e, "retrying Google gateway call");
                    tokio::time::sleep(backoff_delay(attempt)).await;
                    last_err = Some(e);
                }
            }
        }
        to_error_result(Provider::Google, last_err.expect("loop runs at least once"))
    }

    fn model_name(&self) -> &str {
        &self.model_info.full_name
    }

    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    async fn complete_json(
        &self,
        system_prompt: &str,
        user_content: &str,
        _schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<(serde_json::Value, u64, u64), GatewayError> {
        let body = json!({
            "system_instruction": {"parts": [{"text": system_prompt}]},
            "contents": [{"role": "user", "parts": [{"text": user_content}]}],
            "generation_config": {
                "temperature": 0.0,
                "response_mime_type": "application/json",
                "response_schema": schema,
            }
        });

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_reqwest_error)?;
        if !status.is_success() {
            return Err(GatewayError::Response(format!("HTTP {status}: {text}")));
        }
        let parsed: GoogleGenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::Response(format!("malformed Gemini response: {e}")))?;
        let candidate = parsed
            .candidates
            .first()
            .ok_or_else(|| GatewayError::Response("no candidates in Gemini response".to_string()))?;
        let part = candidate
            .content
            .parts
            .first()
            .ok_or_else(|| GatewayError::Response("no parts in Gemini candidate".to_string()))?;
        let value = json_extractor::extract(&part.text)?;
        let usage = parsed.usage_metadata.unwrap_or_default();
        Ok((value, usage.prompt_token_count, usage.candidates_token_count))
    }
}

#[derive(Debug, Deserialize)]
struct GoogleGenerateContentResponse {
    candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    usage_metadata: Option<GoogleUsageWire>,
}

#[derive(Debug, Deserialize)]
struct GoogleCandidate {
    content: GoogleContent,
}

#[derive(Debug, Deserialize)]
struct GoogleContent {
    parts: Vec<GooglePart>,
}

#[derive(Debug, Deserialize)]
struct GooglePart {
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleUsageWire {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}
