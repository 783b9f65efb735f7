//! Gateway layer — provider-abstract LLM client (spec.md §4.5).
//!
//! A closed sum type over the four provider gateways, each implementing a
//! shared trait, matching both spec.md §9's Design Note ("avoid class
//! hierarchies") and the teacher's `#[async_trait] trait LlmClient` in
//! `llm/mod.rs`.

pub mod anthropic;
pub mod factory;
pub mod google;
pub mod openai;
pub mod openrouter;

use async_trait::async_trait;

use crate::types::{ModelInfo, Provider, ReviewPrompt, ReviewResult};

/// Exponential backoff schedule shared by every gateway: multiplier 1,
/// min 1s, max 8s (spec.md §4.5 "Retry"). Grounded in
/// `llm/openrouter.rs::execute_with_retry`'s retry-loop shape, re-parameterized
/// per spec's fixed (non-jittered) schedule.
pub fn backoff_delay(attempt: u32) -> std::time::Duration {
    let secs = 1u64.saturating_mul(1 << attempt.min(3));
    std::time::Duration::from_secs(secs.min(8))
}

#[async_trait]
pub trait ReviewGateway: Send + Sync {
    async fn review_code(&self, prompt: &ReviewPrompt) -> ReviewResult;
    fn model_name(&self) -> &str;
    fn provider(&self) -> Provider;
    fn model_info(&self) -> &ModelInfo;

    /// A single, non-retrying schema-constrained text completion using the
    /// same provider transport as `review_code`, returning the parsed value
    /// plus `(input_tokens, output_tokens)`. Used exclusively by the Review
    /// Synthesizer (spec.md §4.9) for its summary/recommendation synthesis
    /// calls — "the only place in the system that issues LLM calls that are
    /// not 'code review' calls".
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_content: &str,
        schema_name: &str,
        schema: serde_json::Value,
    ) -> Result<(serde_json::Value, u64, u64), crate::error::GatewayError>;
}

/// Builds the common system+user message list every provider gateway
/// serializes a `ReviewPrompt` into (spec.md §4.5 step 1): one system message,
/// then one user message per file, each the concatenation of the file header,
/// the file_context rendering, and the hunk diffs with a change-range marker.
pub fn render_user_messages(prompt: &ReviewPrompt) -> Vec<String> {
    prompt.user_prompts.iter().map(render_user_prompt).collect()
}

fn render_user_prompt(user_prompt: &crate::types::UserPrompt) -> String {
    use crate::types::FileContextInfo;
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "## File: {} ({})", user_prompt.file_name, user_prompt.language);

    match &user_prompt.file_context {
        FileContextInfo::FullContext { content } => {
            let _ = writeln!(out, "### Full file content\n```\n{content}\n```");
        }
        FileContextInfo::ContextBlocks { blocks } => {
            let _ = writeln!(out, "### Context blocks");
            for block in blocks {
                let _ = writeln!(
                    out,
                    "```\n// Lines {}-{}\n{}\n```",
                    block.start_line, block.end_line, block.text
                );
            }
        }
    }

    for hunk in &user_prompt.hunks {
        let _ = writeln!(
            out,
            "### Hunk: {}\n--- before ---\n```\n{}\n```\n--- after (changed lines {}-{}) ---\n```\n{}\n```",
            hunk.header,
            hunk.before_code,
            hunk.change_line.start_line,
            hunk.change_line.end_line,
            hunk.after_code,
        );
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delay_follows_one_to_eight_second_schedule() {
        assert_eq!(backoff_delay(0).as_secs(), 1);
        assert_eq!(backoff_delay(1).as_secs(), 2);
        assert_eq!(backoff_delay(2).as_secs(), 4);
        assert_eq!(backoff_delay(3).as_secs(), 8);
        assert_eq!(backoff_delay(10).as_secs(), 8);
    }
}
