//! Token counting
//!
//! Uses tiktoken's cl100k_base encoding as a model-agnostic estimate. The turn
//! trace records prompt sizes with it and the context injector trims memory
//! to a token budget.

use crate::message::Message;
use std::sync::LazyLock;
use tiktoken_rs::{cl100k_base, CoreBPE};

/// Global tokenizer instance (initialized once, thread-safe)
static TOKENIZER: LazyLock<CoreBPE> = LazyLock::new(|| {
    cl100k_base().expect("cl100k_base tokenizer is a compile-time constant and should never fail")
});

/// Token counter for estimating message token usage
#[derive(Clone, Copy)]
pub struct TokenCounter;

impl TokenCounter {
    /// Create a new token counter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Count tokens in a string
    #[must_use]
    pub fn count_tokens(&self, text: &str) -> usize {
        TOKENIZER.encode_with_special_tokens(text).len()
    }

    /// Count tokens in a message (includes role overhead)
    #[must_use]
    pub fn count_message_tokens(&self, message: &Message) -> usize {
        const MESSAGE_OVERHEAD: usize = 6; // role + separators
        self.count_tokens(&message.content) + MESSAGE_OVERHEAD
    }

    /// Count total tokens in a conversation
    #[must_use]
    pub fn count_conversation_tokens(&self, messages: &[Message]) -> usize {
        const CONVERSATION_OVERHEAD: usize = 3; // start/end tokens
        messages
            .iter()
            .map(|m| self.count_message_tokens(m))
            .sum::<usize>()
            + CONVERSATION_OVERHEAD
    }

    /// Longest prefix of `text` (on a char boundary) that fits in `budget` tokens.
    #[must_use]
    pub fn truncate_to_budget<'a>(&self, text: &'a str, budget: usize) -> &'a str {
        if self.count_tokens(text) <= budget {
            return text;
        }
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let (mut lo, mut hi) = (0usize, boundaries.len() - 1);
        while lo < hi {
            let mid = (lo + hi + 1) / 2;
            if self.count_tokens(&text[..boundaries[mid]]) <= budget {
                lo = mid;
            } else {
                hi = mid - 1;
            }
        }
        &text[..boundaries[lo]]
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static::lazy_static! {
    /// Global token counter instance for convenience
    pub static ref TOKEN_COUNTER: TokenCounter = TokenCounter::new();
}

/// Convenience function to count tokens in text
#[must_use]
pub fn count_tokens(text: &str) -> usize {
    TOKEN_COUNTER.count_tokens(text)
}

/// Convenience function to count tokens in messages
#[must_use]
pub fn count_message_tokens(messages: &[Message]) -> usize {
    TOKEN_COUNTER.count_conversation_tokens(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tokens_non_empty() {
        assert_eq!(count_tokens(""), 0);
        assert!(count_tokens("bugün takvimimde neler var") > 0);
    }

    #[test]
    fn test_conversation_overhead() {
        let messages = vec![Message::system("a"), Message::user("b")];
        let total = count_message_tokens(&messages);
        assert!(total >= count_tokens("a") + count_tokens("b") + 12 + 3);
    }

    #[test]
    fn test_truncate_to_budget() {
        let counter = TokenCounter::new();
        let text = "kısa not ".repeat(200);
        let truncated = counter.truncate_to_budget(&text, 20);
        assert!(counter.count_tokens(truncated) <= 20);
        assert!(text.starts_with(truncated));
        assert_eq!(counter.truncate_to_budget("merhaba", 100), "merhaba");
    }
}
