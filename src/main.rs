//! Review Orchestrator — CLI entry point.
//!
//! Diff acquisition, argument parsing proper, and rendering are out of scope
//! (spec.md §1); this binary is the thin, invoked-but-not-specified surface
//! that wires `Config`, the cache, and the gateway factory into one
//! `orchestrator::review` call and prints the resulting JSON.

use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use review_orchestrator::cache::Cache;
use review_orchestrator::config::Config;
use review_orchestrator::gateway::factory::GatewayFactory;
use review_orchestrator::multiturn::ExecutionStrategy;
use review_orchestrator::orchestrator;
use review_orchestrator::types::{ErrorType, FileContextInfo, ReviewPrompt, ReviewRequest, ReviewResult, UserPrompt};

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a meticulous senior engineer performing a code review. Identify bugs, \
     security issues and style problems; respond with JSON matching the given schema.";

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "review_orchestrator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut args = std::env::args().skip(1);
    let diff_path = match args.next() {
        Some(path) => PathBuf::from(path),
        None => {
            eprintln!("usage: review-orchestrator <diff-file> [model]");
            return ExitCode::FAILURE;
        }
    };
    let model = args.next().unwrap_or_else(|| config.default_model.clone());

    let diff_content = match std::fs::read_to_string(&diff_path) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(error = %e, path = %diff_path.display(), "failed to read diff file");
            return ExitCode::FAILURE;
        }
    };

    let request = ReviewRequest {
        diff_content: diff_content.clone(),
        model: model.clone(),
        use_full_context: false,
        file_paths: vec![],
    };
    let prompt = ReviewPrompt {
        system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        user_prompts: vec![UserPrompt {
            file_name: diff_path.display().to_string(),
            language: "diff".to_string(),
            file_context: FileContextInfo::FullContext { content: diff_content },
            hunks: vec![],
        }],
    };

    let factory = GatewayFactory::new(config.api_keys())
        .maybe_with_claude_override(config.claude_provider_override);

    let cache = match Cache::from_platform_dir("review-orchestrator") {
        Ok(cache) => Some(cache),
        Err(e) => {
            tracing::warn!(error = %e, "cache unavailable, proceeding without it");
            None
        }
    };

    let strategy = ExecutionStrategy::Parallel(config.multiturn_max_parallel);
    let result = orchestrator::review(&request, &prompt, &factory, cache.as_ref(), strategy).await;

    let exit_code = exit_code_for(&result);
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("failed to serialize result: {e}"),
    }
    exit_code
}

fn exit_code_for(result: &ReviewResult) -> ExitCode {
    match result {
        ReviewResult::Success { .. } => ExitCode::SUCCESS,
        ReviewResult::Error { error } => match error.error_type {
            ErrorType::UnsupportedModel | ErrorType::UnsupportedProvider | ErrorType::InvalidModelProvider => {
                ExitCode::from(2)
            }
            ErrorType::AuthenticationError => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        },
    }
}
