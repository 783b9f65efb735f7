//! Core data model shared across the gateway, cache, context extractor and
//! multi-turn subsystems.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Provider a model is natively hosted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    OpenRouter,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::OpenRouter => "openrouter",
        };
        write!(f, "{s}")
    }
}

/// Per-million-token pricing plus catalog metadata for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub description: String,
}

/// Identity of a model, as resolved from the Model Catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub full_name: String,
    pub aliases: HashSet<String>,
    pub provider: Provider,
    /// Free-form params merged verbatim into the provider request.
    pub params: BTreeMap<String, serde_json::Value>,
    pub thinking_mode: bool,
    pub pricing: Pricing,
    pub context_limit: u64,
    /// Required to route this model through OpenRouter.
    pub openrouter_name: Option<String>,
}

/// A 1-based, inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: u32,
}

impl LineRange {
    pub fn new(start_line: u32, end_line: u32) -> Result<Self, LineRangeError> {
        if start_line < 1 || start_line > end_line {
            return Err(LineRangeError::Invalid { start_line, end_line });
        }
        Ok(Self { start_line, end_line })
    }

    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start_line <= other.end_line && self.end_line >= other.start_line
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LineRangeError {
    #[error("invalid line range: start_line={start_line} end_line={end_line}")]
    Invalid { start_line: u32, end_line: u32 },
}

/// A diff fragment for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hunk {
    pub header: String,
    pub before_code: String,
    pub after_code: String,
    pub original_range: LineRange,
    pub modified_range: LineRange,
    pub change_line: LineRange,
}

/// A single extracted syntactic fragment, returned by the Context Extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBlock {
    pub start_line: u32,
    pub end_line: u32,
    pub text: String,
    /// True when this block was truncated to a declaration's first line.
    pub declaration_only: bool,
}

/// Either the whole file, or a minimal ordered set of extracted blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum FileContextInfo {
    FullContext { content: String },
    ContextBlocks { blocks: Vec<ContextBlock> },
}

/// One file's worth of prompt material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPrompt {
    pub file_name: String,
    pub language: String,
    pub file_context: FileContextInfo,
    pub hunks: Vec<Hunk>,
}

/// The complete prompt handed to a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPrompt {
    pub system_prompt: String,
    pub user_prompts: Vec<UserPrompt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewIssue {
    #[serde(rename = "type")]
    pub issue_type: String,
    pub line_number: Option<u32>,
    pub file: Option<String>,
    pub description: String,
    pub suggestion: Option<String>,
    pub severity: Severity,
    pub target_code: Option<String>,
    pub suggested_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub issues: Vec<ReviewIssue>,
    pub summary: String,
    pub score: Option<f64>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatedCost {
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
}

impl EstimatedCost {
    pub fn zero(model: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            model: model.into(),
            input_tokens,
            output_tokens,
            input_cost_usd: 0.0,
            output_cost_usd: 0.0,
            total_cost_usd: 0.0,
        }
    }

    /// Sums two costs across the same model; used when accumulating multi-turn
    /// chunk costs and the synthesis call's cost (spec.md §4.9, §8 invariant 7).
    pub fn add(&self, other: &EstimatedCost) -> EstimatedCost {
        EstimatedCost {
            model: self.model.clone(),
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            input_cost_usd: round6(self.input_cost_usd + other.input_cost_usd),
            output_cost_usd: round6(self.output_cost_usd + other.output_cost_usd),
            total_cost_usd: round6(self.total_cost_usd + other.total_cost_usd),
        }
    }
}

pub fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// The closed set of error_type tags (spec.md §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ApiError,
    ContextLimitExceeded,
    AuthenticationError,
    InvalidModelProvider,
    UnsupportedModel,
    UnsupportedProvider,
    ResponseError,
    ConnectionError,
    TimeoutError,
    JsonParsingError,
}

impl ErrorType {
    /// Transport/structural errors retried inside the gateway (spec.md §7).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorType::ApiError
                | ErrorType::ResponseError
                | ErrorType::ConnectionError
                | ErrorType::TimeoutError
                | ErrorType::JsonParsingError
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub provider: Provider,
    pub error_type: ErrorType,
    pub error_message: String,
    pub raw_error: BTreeMap<String, serde_json::Value>,
}

/// Sum type returned by every gateway's `review_code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ReviewResult {
    Success {
        review_response: ReviewResponse,
        estimated_cost: EstimatedCost,
    },
    Error {
        error: ErrorResponse,
    },
}

impl ReviewResult {
    pub fn error(provider: Provider, error_type: ErrorType, message: impl Into<String>) -> Self {
        ReviewResult::Error {
            error: ErrorResponse {
                provider,
                error_type,
                error_message: message.into(),
                raw_error: BTreeMap::new(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ReviewResult::Success { .. })
    }
}

/// Extracted from an `ErrorResponse.raw_error` map on a context-limit error
/// (selvage's `TokenInfo.from_error_response`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenInfo {
    pub actual_tokens: Option<u64>,
    pub max_tokens: Option<u64>,
}

impl TokenInfo {
    pub fn from_error_response(error: &ErrorResponse) -> Self {
        let actual_tokens = error
            .raw_error
            .get("actual_tokens")
            .and_then(|v| v.as_u64());
        let max_tokens = error.raw_error.get("max_tokens").and_then(|v| v.as_u64());
        Self { actual_tokens, max_tokens }
    }
}

/// The cache's request handle (selvage's `ReviewRequest`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub diff_content: String,
    pub model: String,
    pub use_full_context: bool,
    #[serde(default)]
    pub file_paths: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_range_rejects_start_after_end() {
        assert!(LineRange::new(5, 3).is_err());
        assert!(LineRange::new(0, 3).is_err());
    }

    #[test]
    fn line_range_overlaps_is_reflexive_and_symmetric() {
        let a = LineRange::new(10, 20).unwrap();
        assert!(a.overlaps(&a));
        let b = LineRange::new(15, 25).unwrap();
        assert_eq!(a.overlaps(&b), b.overlaps(&a));
        let c = LineRange::new(21, 30).unwrap();
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn estimated_cost_add_sums_fields() {
        let a = EstimatedCost {
            model: "gpt-4o".into(),
            input_tokens: 100,
            output_tokens: 50,
            input_cost_usd: 0.001,
            output_cost_usd: 0.002,
            total_cost_usd: 0.003,
        };
        let b = EstimatedCost {
            model: "gpt-4o".into(),
            input_tokens: 200,
            output_tokens: 75,
            input_cost_usd: 0.0015,
            output_cost_usd: 0.0025,
            total_cost_usd: 0.004,
        };
        let sum = a.add(&b);
        assert_eq!(sum.input_tokens, 300);
        assert_eq!(sum.output_tokens, 125);
        assert_eq!(sum.total_cost_usd, 0.007);
    }

    #[test]
    fn review_response_round_trips_through_json() {
        let resp = ReviewResponse {
            issues: vec![ReviewIssue {
                issue_type: "style".into(),
                line_number: None,
                file: None,
                description: "unused import".into(),
                suggestion: Some("remove it".into()),
                severity: Severity::Info,
                target_code: None,
                suggested_code: None,
            }],
            summary: "looks fine".into(),
            score: Some(8.5),
            recommendations: vec!["add tests".into()],
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: ReviewResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, back);
    }

    #[test]
    fn review_issue_severity_round_trips_wire_tag() {
        let issue = ReviewIssue {
            issue_type: "bug".into(),
            line_number: Some(12),
            file: Some("a.py".into()),
            description: "oops".into(),
            suggestion: None,
            severity: Severity::Warning,
            target_code: None,
            suggested_code: None,
        };
        let json = serde_json::to_string(&issue).unwrap();
        assert!(json.contains("\"warning\""));
        let back: ReviewIssue = serde_json::from_str(&json).unwrap();
        assert_eq!(back.severity, Severity::Warning);
    }
}
