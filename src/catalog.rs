//! Model Catalog — name→ModelInfo lookup with aliases, pricing and
//! context limits, loaded once as an immutable singleton (spec.md §4.1, §9
//! "Global mutable state").
//!
//! Grounded in `selvage/src/model_config.py`'s `ModelConfig` singleton (a
//! `threading.Lock`-guarded double-checked-locking load of a YAML table) and
//! the teacher's `budget/pricing.rs::ModelPricing` read-mostly cache idiom.
//! Unlike either, this catalog is a fixed, compiled-in table — the out-of-scope
//! "YAML-based model-catalog loading" external collaborator named in spec.md
//! §1 is not reimplemented; entries are embedded Rust literals instead.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use thiserror::Error;

use crate::types::{ModelInfo, Pricing, Provider};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),
}

struct Catalog {
    by_name: HashMap<String, ModelInfo>,
    by_alias: HashMap<String, String>,
}

fn build_entry(
    full_name: &str,
    aliases: &[&str],
    provider: Provider,
    thinking_mode: bool,
    input_per_million: f64,
    output_per_million: f64,
    description: &str,
    context_limit: u64,
    openrouter_name: Option<&str>,
) -> ModelInfo {
    ModelInfo {
        full_name: full_name.to_string(),
        aliases: aliases.iter().map(|s| s.to_string()).collect(),
        provider,
        params: BTreeMap::new(),
        thinking_mode,
        pricing: Pricing {
            input_per_million,
            output_per_million,
            description: description.to_string(),
        },
        context_limit,
        openrouter_name: openrouter_name.map(|s| s.to_string()),
    }
}

fn build_catalog() -> Catalog {
    let entries = vec![
        build_entry(
            "gpt-4o",
            &["gpt4o", "openai/gpt-4o"],
            Provider::OpenAi,
            false,
            2.50,
            10.00,
            "OpenAI GPT-4o",
            128_000,
            Some("openai/gpt-4o"),
        ),
        build_entry(
            "gpt-4o-mini",
            &["gpt4o-mini"],
            Provider::OpenAi,
            false,
            0.15,
            0.60,
            "OpenAI GPT-4o mini",
            128_000,
            Some("openai/gpt-4o-mini"),
        ),
        build_entry(
            "claude-sonnet-4.5",
            &["claude-sonnet", "sonnet-4.5"],
            Provider::Anthropic,
            false,
            3.00,
            15.00,
            "Anthropic Claude Sonnet 4.5",
            200_000,
            Some("anthropic/claude-sonnet-4.5"),
        ),
        build_entry(
            "claude-sonnet-4.5-thinking",
            &["sonnet-4.5-thinking"],
            Provider::Anthropic,
            true,
            3.00,
            15.00,
            "Anthropic Claude Sonnet 4.5 (extended thinking)",
            200_000,
            Some("anthropic/claude-sonnet-4.5"),
        ),
        build_entry(
            "gemini-2.0-flash",
            &["gemini-flash"],
            Provider::Google,
            false,
            0.10,
            0.40,
            "Google Gemini 2.0 Flash",
            1_048_576,
            Some("google/gemini-2.0-flash-001"),
        ),
        build_entry(
            "gemini-2.5-pro",
            &["gemini-pro"],
            Provider::Google,
            false,
            1.25,
            10.00,
            "Google Gemini 2.5 Pro",
            1_048_576,
            Some("google/gemini-2.5-pro"),
        ),
    ];

    let mut by_name = HashMap::new();
    let mut by_alias = HashMap::new();
    for entry in entries {
        assert!(!entry.full_name.is_empty(), "catalog entry missing full_name");
        assert!(entry.context_limit > 0, "catalog entry context_limit must be > 0");
        assert!(
            !entry.pricing.description.is_empty(),
            "catalog entry missing pricing.description"
        );
        for alias in &entry.aliases {
            by_alias.insert(alias.clone(), entry.full_name.clone());
        }
        by_name.insert(entry.full_name.clone(), entry);
    }

    Catalog { by_name, by_alias }
}

fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(build_catalog)
}

/// Resolve by `full_name` first, then by any `alias`.
pub fn get(name: &str) -> Result<ModelInfo, CatalogError> {
    let cat = catalog();
    if let Some(info) = cat.by_name.get(name) {
        return Ok(info.clone());
    }
    if let Some(full_name) = cat.by_alias.get(name) {
        if let Some(info) = cat.by_name.get(full_name) {
            return Ok(info.clone());
        }
    }
    Err(CatalogError::UnsupportedModel(name.to_string()))
}

pub fn supported_names() -> HashSet<String> {
    catalog().by_name.keys().cloned().collect()
}

pub fn pricing(name: &str) -> Result<Pricing, CatalogError> {
    get(name).map(|m| m.pricing)
}

pub fn context_limit(name: &str) -> Result<u64, CatalogError> {
    get(name).map(|m| m.context_limit)
}

pub fn provider(name: &str) -> Result<Provider, CatalogError> {
    get(name).map(|m| m.provider)
}

pub fn params(name: &str) -> Result<BTreeMap<String, serde_json::Value>, CatalogError> {
    get(name).map(|m| m.params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_full_name_and_alias() {
        let by_name = get("gpt-4o").unwrap();
        let by_alias = get("gpt4o").unwrap();
        assert_eq!(by_name.full_name, by_alias.full_name);
    }

    #[test]
    fn unknown_model_is_unsupported() {
        assert_eq!(
            get("does-not-exist"),
            Err(CatalogError::UnsupportedModel("does-not-exist".to_string()))
        );
    }

    #[test]
    fn every_entry_has_positive_context_limit() {
        for name in supported_names() {
            assert!(context_limit(&name).unwrap() > 0);
        }
    }

    #[test]
    fn thinking_mode_flag_is_per_entry() {
        assert!(!get("claude-sonnet-4.5").unwrap().thinking_mode);
        assert!(get("claude-sonnet-4.5-thinking").unwrap().thinking_mode);
    }
}
