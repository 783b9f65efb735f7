//! Gateway Factory — routes a model name to the correct gateway, including
//! the OpenRouter-First override (spec.md §4.6).
//!
//! Grounded in `selvage/src/llm_gateway/gateway_factory.py`'s
//! `GatewayFactory.create`, generalized with the OpenRouter-First policy
//! spec.md adds: the rule lives here, not in any gateway class, per the
//! Design Note in spec.md §9 ("OpenRouter First as a policy, not a hack").

use crate::catalog::{self, CatalogError};
use crate::error::GatewayError;
use crate::gateway::{anthropic::AnthropicGateway, google::GoogleGateway, openai::OpenAiGateway, openrouter::OpenRouterGateway, ReviewGateway};
use crate::types::Provider;

/// Per-model override honored for Anthropic models: forces direct Anthropic
/// routing even when an OpenRouter key is configured, or forces OpenRouter
/// routing even without an OpenRouter name override policy change (spec.md
/// §4.6 "the factory also honors an explicit user override").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaudeProviderOverride {
    Anthropic,
    OpenRouter,
}

#[derive(Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub google: Option<String>,
    pub openrouter: Option<String>,
}

pub struct GatewayFactory {
    keys: ApiKeys,
    claude_provider_override: Option<ClaudeProviderOverride>,
}

impl GatewayFactory {
    pub fn new(keys: ApiKeys) -> Self {
        Self { keys, claude_provider_override: None }
    }

    pub fn with_claude_provider_override(mut self, override_: ClaudeProviderOverride) -> Self {
        self.claude_provider_override = Some(override_);
        self
    }

    pub fn maybe_with_claude_override(mut self, override_: Option<ClaudeProviderOverride>) -> Self {
        self.claude_provider_override = override_;
        self
    }

    /// `create(model) -> Box<dyn ReviewGateway>`. Fails fast with
    /// `UnsupportedModel`/`UnsupportedProvider` and makes no HTTP call.
    pub fn create(&self, model_name: &str) -> Result<Box<dyn ReviewGateway>, GatewayError> {
        let model_info = catalog::get(model_name).map_err(|CatalogError::UnsupportedModel(m)| {
            GatewayError::UnsupportedModel(m)
        })?;

        let is_claude = model_info.provider == Provider::Anthropic;
        if is_claude {
            match self.claude_provider_override {
                Some(ClaudeProviderOverride::Anthropic) => {
                    let key = self.require_key(&self.keys.anthropic, Provider::Anthropic)?;
                    return Ok(Box::new(AnthropicGateway::new(model_info, key)?));
                }
                Some(ClaudeProviderOverride::OpenRouter) => {
                    let key = self.require_key(&self.keys.openrouter, Provider::OpenRouter)?;
                    return Ok(Box::new(OpenRouterGateway::new(model_info, key)?));
                }
                None => {}
            }
        }

        // OpenRouter First: an OpenRouter key plus an openrouter_name wins
        // over the model's native provider, regardless of what that provider is.
        if let Some(key) = &self.keys.openrouter {
            if model_info.openrouter_name.is_some() {
                return Ok(Box::new(OpenRouterGateway::new(model_info, key.clone())?));
            }
        }

        match model_info.provider {
            Provider::OpenAi => {
                let key = self.require_key(&self.keys.openai, Provider::OpenAi)?;
                Ok(Box::new(OpenAiGateway::new(model_info, key)?))
            }
            Provider::Anthropic => {
                let key = self.require_key(&self.keys.anthropic, Provider::Anthropic)?;
                Ok(Box::new(AnthropicGateway::new(model_info, key)?))
            }
            Provider::Google => {
                let key = self.require_key(&self.keys.google, Provider::Google)?;
                Ok(Box::new(GoogleGateway::new(model_info, key)?))
            }
            Provider::OpenRouter => Err(GatewayError::UnsupportedProvider(
                "model's native provider is openrouter but no OPENROUTER_API_KEY is configured".to_string(),
            )),
        }
    }

    fn require_key(&self, key: &Option<String>, provider: Provider) -> Result<String, GatewayError> {
        key.clone()
            .ok_or_else(|| GatewayError::Authentication(format!("no API key configured for {provider}")))
    }
}
