//! Context injection
//!
//! Bounds what the dialog summary and retrieved long-term memory contribute
//! to the router prompt. Snippets are kept in retrieval order until the
//! token budget runs out; snippets carrying prompt-injection phrasing are
//! dropped outright since they reach the model as trusted context.

use crate::error::{Error, Result};
use crate::security::detect_prompt_injection;
use bantz_llm::TOKEN_COUNTER;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Token budgets for injected context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Dialog summary budget
    pub summary_max_tokens: usize,
    /// Budget shared by all memory snippets
    pub memory_max_tokens: usize,
    /// Most snippets injected
    pub max_snippets: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            summary_max_tokens: 600,
            memory_max_tokens: 400,
            max_snippets: 5,
        }
    }
}

/// Context that goes into the prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedContext {
    /// Dialog summary, possibly truncated
    pub dialog_summary: String,
    /// Kept memory snippets
    pub retrieved_memory: Vec<String>,
    /// Tokens injected in total
    pub injected_tokens: usize,
    /// Snippets dropped for budget or safety
    pub dropped_snippets: usize,
    /// Whether the summary was cut to fit
    pub summary_truncated: bool,
}

/// Longest suffix of `text` (on a char boundary) that fits in `budget` tokens
///
/// The end of a rolling summary is the most recent part of the dialog.
fn tail_within_budget(text: &str, budget: usize) -> &str {
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let fits = |start: usize| TOKEN_COUNTER.count_tokens(&text[start..]) <= budget;
    let (mut lo, mut hi) = (0usize, boundaries.len() - 1);
    while lo < hi {
        let mid = (lo + hi) / 2;
        if fits(boundaries[mid]) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    &text[boundaries[lo]..]
}

/// Trims context to the configured budgets
#[derive(Debug, Clone, Default)]
pub struct ContextInjector {
    config: MemoryConfig,
}

impl ContextInjector {
    /// Create an injector
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self { config }
    }

    /// Build the context; an over-budget summary is a `Memory` error
    pub fn inject(
        &self,
        turn_id: &str,
        dialog_summary: &str,
        retrieved_memory: &[String],
    ) -> Result<InjectedContext> {
        let summary_tokens = TOKEN_COUNTER.count_tokens(dialog_summary);
        if summary_tokens > self.config.summary_max_tokens {
            return Err(Error::Memory {
                turn_id: turn_id.to_string(),
                message: format!(
                    "dialog summary is {summary_tokens} tokens, budget is {}",
                    self.config.summary_max_tokens
                ),
            });
        }
        Ok(self.build(dialog_summary.trim().to_string(), summary_tokens, false, retrieved_memory))
    }

    /// Build the context, cutting an over-budget summary instead of failing
    ///
    /// The error that triggered the cut is returned for the trace.
    pub fn inject_or_truncate(
        &self,
        turn_id: &str,
        dialog_summary: &str,
        retrieved_memory: &[String],
    ) -> (InjectedContext, Option<Error>) {
        match self.inject(turn_id, dialog_summary, retrieved_memory) {
            Ok(context) => (context, None),
            Err(e) => {
                warn!(turn_id = %turn_id, error = %e, "Truncating dialog summary");
                let summary = tail_within_budget(dialog_summary, self.config.summary_max_tokens).trim();
                let tokens = TOKEN_COUNTER.count_tokens(summary);
                (self.build(summary.to_string(), tokens, true, retrieved_memory), Some(e))
            }
        }
    }

    fn build(
        &self,
        dialog_summary: String,
        summary_tokens: usize,
        summary_truncated: bool,
        retrieved_memory: &[String],
    ) -> InjectedContext {
        let mut kept = Vec::new();
        let mut used = 0;
        let mut dropped = 0;

        for snippet in retrieved_memory {
            let snippet = snippet.trim();
            if snippet.is_empty() {
                continue;
            }
            if let Some(pattern) = detect_prompt_injection(snippet) {
                warn!(pattern = pattern.id, "Memory snippet dropped");
                dropped += 1;
                continue;
            }
            let tokens = TOKEN_COUNTER.count_tokens(snippet);
            if kept.len() >= self.config.max_snippets || used + tokens > self.config.memory_max_tokens {
                dropped += 1;
                continue;
            }
            used += tokens;
            kept.push(snippet.to_string());
        }

        debug!(
            summary_tokens,
            memory_tokens = used,
            kept = kept.len(),
            dropped,
            "Context injected"
        );

        InjectedContext {
            dialog_summary,
            retrieved_memory: kept,
            injected_tokens: summary_tokens + used,
            dropped_snippets: dropped,
            summary_truncated,
        }
    }
}
