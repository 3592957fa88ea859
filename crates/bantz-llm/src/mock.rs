//! Mock LLM Provider for testing
//!
//! Returns queued replies (or queued failures) in order and records every
//! request it receives so tests can assert on call counts and prompts.

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{Error, Result};
use crate::provider::LlmProvider;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A mock LLM provider that returns queued responses or a default one.
pub struct MockProvider {
    model: String,
    responses: Arc<Mutex<VecDeque<Result<String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    available: AtomicBool,
    default_reply: String,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

impl MockProvider {
    /// Create a new mock provider reporting the given model name.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            available: AtomicBool::new(true),
            default_reply: "mock response".to_string(),
        }
    }

    /// Set the reply used once the queue is empty.
    #[must_use]
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    /// Queue a successful reply.
    pub fn push_reply(&self, content: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(content.into()));
    }

    /// Queue a failure.
    pub fn push_error(&self, error: Error) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// Toggle the health probe result.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `complete` calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// The most recent request, if any.
    #[must_use]
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let content = match next {
            Some(result) => result?,
            None => self.default_reply.clone(),
        };

        Ok(CompletionResponse {
            content,
            usage: None,
            finish_reason: Some("stop".to_string()),
            model: self.model.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[tokio::test]
    async fn test_mock_returns_queue_in_order() {
        let mock = MockProvider::new("fast-mock");
        mock.push_reply("first");
        mock.push_error(Error::Network("down".into()));

        let req = CompletionRequest::new("").with_message(Message::user("hi"));
        let first = mock.complete(req.clone()).await.unwrap();
        assert_eq!(first.content, "first");
        assert_eq!(first.model, "fast-mock");

        assert!(mock.complete(req.clone()).await.is_err());

        let fallback = mock.complete(req).await.unwrap();
        assert_eq!(fallback.content, "mock response");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_availability_toggle() {
        let mock = MockProvider::default();
        assert!(mock.is_available().await);
        mock.set_available(false);
        assert!(!mock.is_available().await);
    }
}
