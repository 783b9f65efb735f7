//! Prompt Splitter — partitions `UserPrompt`s into chunks that each fit a
//! model's context budget (spec.md §4.7).
//!
//! The original source's `PromptSplitter` module was not retained in
//! `original_source/`, so this is ported directly from spec.md's algorithmic
//! description; token counting is pluggable via [`TokenCounter`] so the
//! splitter does not hardcode a tokenizer, mirroring selvage's own
//! `TokenUtils.count_tokens(..., model)` being model-dependent.

use crate::types::UserPrompt;

/// Tokens reserved for the system prompt and expected output, subtracted from
/// `max_tokens` to derive the per-chunk budget (spec.md §4.7).
pub const RESERVE_FOR_SYSTEM_AND_OUTPUT: u64 = 2_000;

pub trait TokenCounter {
    fn count(&self, prompt: &UserPrompt) -> u64;
}

/// A simple byte-length heuristic (~4 bytes/token), adequate for chunking
/// decisions without depending on a provider-specific tokenizer.
pub struct ApproxTokenCounter;

impl TokenCounter for ApproxTokenCounter {
    fn count(&self, prompt: &UserPrompt) -> u64 {
        let mut len = prompt.file_name.len() + prompt.language.len();
        match &prompt.file_context {
            crate::types::FileContextInfo::FullContext { content } => len += content.len(),
            crate::types::FileContextInfo::ContextBlocks { blocks } => {
                len += blocks.iter().map(|b| b.text.len()).sum::<usize>();
            }
        }
        for hunk in &prompt.hunks {
            len += hunk.before_code.len() + hunk.after_code.len() + hunk.header.len();
        }
        (len as u64 / 4).max(1)
    }
}

/// `split_user_prompts(user_prompts, max_tokens, overlap)`. `max_tokens` is
/// the model's context limit; the effective per-chunk budget subtracts
/// [`RESERVE_FOR_SYSTEM_AND_OUTPUT`]. A single oversized prompt forms its own
/// chunk rather than being subdivided.
pub fn split_user_prompts(
    user_prompts: &[UserPrompt],
    max_tokens: u64,
    overlap: usize,
    counter: &dyn TokenCounter,
) -> Vec<Vec<UserPrompt>> {
    if user_prompts.is_empty() {
        return vec![];
    }

    let budget = max_tokens.saturating_sub(RESERVE_FOR_SYSTEM_AND_OUTPUT).max(1);

    let mut chunks: Vec<Vec<UserPrompt>> = Vec::new();
    let mut current: Vec<UserPrompt> = Vec::new();
    let mut current_tokens: u64 = 0;

    for prompt in user_prompts {
        let prompt_tokens = counter.count(prompt);

        if current.is_empty() {
            current.push(prompt.clone());
            current_tokens = prompt_tokens;
            continue;
        }

        if current_tokens + prompt_tokens > budget {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;

            if overlap > 0 {
                if let Some(last_chunk) = chunks.last() {
                    let carried: Vec<UserPrompt> =
                        last_chunk.iter().rev().take(overlap).rev().cloned().collect();
                    current_tokens = carried.iter().map(|p| counter.count(p)).sum();
                    current = carried;
                }
            }

            current.push(prompt.clone());
            current_tokens += prompt_tokens;
        } else {
            current.push(prompt.clone());
            current_tokens += prompt_tokens;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
