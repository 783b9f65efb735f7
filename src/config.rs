//! Configuration for the review orchestrator.
//!
//! Every provider API key is optional at this level — a specific gateway's
//! construction fails lazily with an authentication error only when that
//! provider is actually selected (SPEC_FULL.md "Configuration", grounded in
//! `api_key_not_found_error.py` being raised per-gateway, not at startup).

use thiserror::Error;

use crate::gateway::factory::{ApiKeys, ClaudeProviderOverride};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub default_model: String,
    pub default_language: String,
    pub claude_provider_override: Option<ClaudeProviderOverride>,
    pub cache_ttl_hours: i64,
    pub multiturn_max_parallel: usize,
}

impl Config {
    /// Load configuration from environment variables. No API key is
    /// required at this level; missing keys surface only when a gateway
    /// needing that specific provider is actually constructed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "claude-sonnet-4.5".to_string());
        let default_language = std::env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "Korean".to_string());

        let claude_provider_override = match std::env::var("REVIEW_CLAUDE_PROVIDER").ok().as_deref() {
            None => None,
            Some("anthropic") => Some(ClaudeProviderOverride::Anthropic),
            Some("openrouter") => Some(ClaudeProviderOverride::OpenRouter),
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "REVIEW_CLAUDE_PROVIDER".to_string(),
                    other.to_string(),
                ))
            }
        };

        let cache_ttl_hours = parse_env_or("CACHE_TTL_HOURS", 1)?;
        let multiturn_max_parallel = parse_env_or("MULTITURN_MAX_PARALLEL", 3)?;

        Ok(Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            google_api_key: std::env::var("GEMINI_API_KEY").ok(),
            openrouter_api_key: std::env::var("OPENROUTER_API_KEY").ok(),
            default_model,
            default_language,
            claude_provider_override,
            cache_ttl_hours,
            multiturn_max_parallel,
        })
    }

    pub fn api_keys(&self) -> ApiKeys {
        ApiKeys {
            openai: self.openai_api_key.clone(),
            anthropic: self.anthropic_api_key.clone(),
            google: self.google_api_key.clone(),
            openrouter: self.openrouter_api_key.clone(),
        }
    }
}

fn parse_env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
