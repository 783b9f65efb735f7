//! # Review Orchestrator
//!
//! A CLI code-review orchestrator: enriches a diff with syntactic context,
//! dispatches it to one of four LLM provider families (OpenAI, Anthropic,
//! Google Gemini, OpenRouter), and returns a structured review.
//!
//! ## Modules
//! - `types`: shared data model (ModelInfo, ReviewPrompt, ReviewResult, ...)
//! - `catalog`: the Model Catalog singleton
//! - `cost_estimator`: provider-usage → EstimatedCost normalization
//! - `json_extractor`: tolerant JSON extraction from LLM text output
//! - `cache`: content-addressed review-result cache
//! - `schema`: the JSON schema every gateway asks providers to conform to
//! - `context_extractor`: tree-sitter-backed syntactic context slicing
//! - `gateway`: the provider-abstract LLM Gateway layer and its factory
//! - `prompt_splitter`: chunking oversized prompts to fit a model's context
//! - `multiturn`: the multi-turn split/execute engine
//! - `synthesizer`: merges multi-turn chunk results into one review
//! - `orchestrator`: ties cache + gateway + multi-turn into one entry point
//! - `config`: environment-based configuration
//! - `error`: internal gateway error taxonomy

pub mod cache;
pub mod catalog;
pub mod config;
pub mod context_extractor;
pub mod cost_estimator;
pub mod error;
pub mod gateway;
pub mod json_extractor;
pub mod multiturn;
pub mod orchestrator;
pub mod prompt_splitter;
pub mod schema;
pub mod synthesizer;
pub mod types;

pub use config::Config;
