//! Internal error types used up to a gateway's `review_code` boundary.
//!
//! Past that boundary every failure is downgraded into a `ReviewResult::Error`
//! value (see `types::ErrorResponse`) rather than propagated as a Rust error —
//! mirroring `BaseGateway.review_code` catching `RetryError` in the source
//! this crate is grounded on and converting it into a `ReviewResult`.

use crate::types::ErrorType;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("api error: {0}")]
    Api(String),
    #[error("context limit exceeded")]
    ContextLimitExceeded { actual_tokens: Option<u64>, max_tokens: Option<u64> },
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("model '{model}' belongs to provider {expected}, not this gateway")]
    InvalidModelProvider { model: String, expected: String },
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),
    #[error("malformed response: {0}")]
    Response(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("timeout")]
    Timeout,
    #[error("json parsing error: {message} (excerpt: {excerpt})")]
    JsonParsing { message: String, excerpt: String },
}

impl GatewayError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            GatewayError::Api(_) => ErrorType::ApiError,
            GatewayError::ContextLimitExceeded { .. } => ErrorType::ContextLimitExceeded,
            GatewayError::Authentication(_) => ErrorType::AuthenticationError,
            GatewayError::InvalidModelProvider { .. } => ErrorType::InvalidModelProvider,
            GatewayError::UnsupportedModel(_) => ErrorType::UnsupportedModel,
            GatewayError::UnsupportedProvider(_) => ErrorType::UnsupportedProvider,
            GatewayError::Response(_) => ErrorType::ResponseError,
            GatewayError::Connection(_) => ErrorType::ConnectionError,
            GatewayError::Timeout => ErrorType::TimeoutError,
            GatewayError::JsonParsing { .. } => ErrorType::JsonParsingError,
        }
    }

    /// Transport/structural errors retried inside the gateway (spec.md §4.5/§7).
    /// Authentication, invalid-model, unsupported-{model,provider} and
    /// context-limit errors are deliberately excluded.
    pub fn is_retryable(&self) -> bool {
        self.error_type().is_retryable()
    }

    /// Keyword scan for context-limit phrasing in a raw provider error string
    /// (spec.md §7: "context", "token", "limit", "exceed", "maximum").
    pub fn looks_like_context_limit(message: &str) -> bool {
        let lower = message.to_lowercase();
        ["context", "token", "limit", "exceed", "maximum"]
            .iter()
            .any(|kw| lower.contains(kw))
    }
}

/// Truncates a raw response excerpt to at most 500 characters, matching
/// `JSONParsingError.from_parsing_exception`'s `_truncate_response`.
pub fn truncate_excerpt(raw: &str) -> String {
    const MAX_LEN: usize = 500;
    if raw.chars().count() <= MAX_LEN {
        raw.to_string()
    } else {
        let truncated: String = raw.chars().take(MAX_LEN).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_set_matches_spec() {
        assert!(GatewayError::Api("x".into()).is_retryable());
        assert!(GatewayError::Response("x".into()).is_retryable());
        assert!(GatewayError::Connection("x".into()).is_retryable());
        assert!(GatewayError::Timeout.is_retryable());
        assert!(GatewayError::JsonParsing { message: "x".into(), excerpt: "x".into() }
            .is_retryable());

        assert!(!GatewayError::Authentication("x".into()).is_retryable());
        assert!(!GatewayError::UnsupportedModel("x".into()).is_retryable());
        assert!(!GatewayError::UnsupportedProvider("x".into()).is_retryable());
        assert!(!GatewayError::ContextLimitExceeded { actual_tokens: None, max_tokens: None }
            .is_retryable());
        assert!(!GatewayError::InvalidModelProvider {
            model: "m".into(),
            expected: "openai".into()
        }
        .is_retryable());
    }

    #[test]
    fn context_limit_keyword_scan() {
        assert!(GatewayError::looks_like_context_limit(
            "This model's maximum context length is 128000 tokens"
        ));
        assert!(GatewayError::looks_like_context_limit("request exceeds token limit"));
        assert!(!GatewayError::looks_like_context_limit("invalid api key"));
    }

    #[test]
    fn excerpt_truncated_at_500_chars() {
        let raw = "x".repeat(600);
        let excerpt = truncate_excerpt(&raw);
        assert_eq!(excerpt.len(), 503);
        assert!(excerpt.ends_with("..."));

        let short = "short".to_string();
        assert_eq!(truncate_excerpt(&short), short);
    }
}
