//! Bantz LLM - LLM Provider Abstraction
//!
//! This crate provides the two model tiers used by the Bantz turn pipeline:
//! - Provider: the `LlmProvider` trait both tiers implement
//! - Ollama: local Ollama provider (fast tier)
//! - OpenAI-compatible: hosted chat-completions endpoint (quality tier)
//! - Mock: scripted provider for tests and offline runs
//! - Token: tiktoken-based prompt token counting for the turn trace

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod ollama;
pub mod openai_compat;
pub mod provider;
pub mod token;

pub use completion::{CompletionRequest, CompletionResponse, TokenUsage};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::MockProvider;
pub use ollama::{OllamaConfig, OllamaProvider};
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
pub use provider::{LlmProvider, SharedProvider};
pub use token::{count_message_tokens, count_tokens, TokenCounter, TOKEN_COUNTER};
