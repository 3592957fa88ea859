//! LLM Provider trait definition
//!
//! Both finalizer tiers and the intent router talk to models through this trait.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;
use std::sync::Arc;

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the default model (used for provenance stamping)
    fn default_model(&self) -> &str;

    /// Health probe. Providers without a cheap probe report available.
    async fn is_available(&self) -> bool {
        true
    }

    /// Complete a conversation (text only)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}

/// Shared provider handle
pub type SharedProvider = Arc<dyn LlmProvider>;
