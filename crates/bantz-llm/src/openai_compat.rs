//! OpenAI-compatible provider used for the quality tier
//!
//! Works against any `/chat/completions` endpoint (vLLM, Groq, OpenRouter,
//! a hosted OpenAI deployment). JSON mode maps to
//! `response_format: {"type": "json_object"}`.

use crate::completion::{CompletionRequest, CompletionResponse, TokenUsage};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::LlmProvider;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible provider configuration
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// API key (may be empty for local servers such as vLLM)
    pub api_key: String,
    /// Base URL including the version segment, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Mask API key for safe display
fn mask_api_key(key: &str) -> String {
    if key.chars().count() <= 8 {
        return "****".to_string();
    }
    let head: String = key.chars().take(4).collect();
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{head}...{tail}")
}

/// Sanitize API error messages
fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("invalid key")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "API authentication error. Please check the quality tier API key.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "Rate limit exceeded. Please wait.".to_string();
    }

    if error.len() < 100 && !error.contains("sk-") && !error.contains("key") {
        return error.to_string();
    }

    "An API error occurred. Please try again.".to_string()
}

impl OpenAiCompatConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI-compatible provider
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    model: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiCompatProvider {
    /// Create a new provider
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn convert_message(msg: &Message) -> ChatMessage {
        ChatMessage {
            role: msg.role.as_str(),
            content: msg.content.clone(),
        }
    }

    fn build_request(&self, request: &CompletionRequest) -> ChatRequest {
        let model = if request.model.is_empty() {
            self.config.default_model.clone()
        } else {
            request.model.clone()
        };

        ChatRequest {
            model,
            messages: request.messages.iter().map(Self::convert_message).collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: request
                .json_mode
                .then(|| serde_json::json!({"type": "json_object"})),
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            builder
        } else {
            builder.header("Authorization", format!("Bearer {}", self.config.api_key))
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai_compat"
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn is_available(&self) -> bool {
        let request = self
            .authorized(self.client.get(format!("{}/models", self.config.base_url)))
            .timeout(Duration::from_secs(3));
        matches!(request.send().await, Ok(r) if r.status().is_success())
    }

    #[instrument(skip(self, request), fields(model = %request.model, json = request.json_mode))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let chat_request = self.build_request(&request);

        debug!(model = %chat_request.model, "Sending request to OpenAI-compatible endpoint");

        let response = self
            .authorized(
                self.client
                    .post(format!("{}/chat/completions", self.config.base_url)),
            )
            .header("Content-Type", "application/json")
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    Error::Network(sanitize_api_error(&e.to_string()))
                }
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::RateLimit);
        }
        if status.is_server_error() {
            return Err(Error::ServerError(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Api(sanitize_api_error(&error_text)));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        let choice = chat_response
            .choices
            .first()
            .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

        let usage = chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content.clone().unwrap_or_default(),
            usage,
            finish_reason: choice.finish_reason.clone(),
            model: chat_response.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_masks_api_key() {
        let config = OpenAiCompatConfig::new("https://api.example.com/v1/", "sk-1234567890abcdef");
        let debug = format!("{config:?}");
        assert!(!debug.contains("1234567890"));
        assert!(debug.contains("sk-1...cdef"));
        assert_eq!(config.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_json_mode_response_format() {
        let provider =
            OpenAiCompatProvider::new(OpenAiCompatConfig::new("http://localhost:8000/v1", ""))
                .unwrap();
        let request = CompletionRequest::new("")
            .with_message(Message::user("plan yap"))
            .with_json_mode(true);
        let body = serde_json::to_value(provider.build_request(&request)).unwrap();
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["response_format"]["type"], "json_object");

        let plain = serde_json::to_value(
            provider.build_request(&CompletionRequest::new("big-model")),
        )
        .unwrap();
        assert!(plain.get("response_format").is_none());
        assert_eq!(plain["model"], "big-model");
    }

    #[test]
    fn test_sanitize_auth_errors() {
        let msg = sanitize_api_error("Unauthorized: invalid api key sk-abc");
        assert!(!msg.contains("sk-abc"));
    }
}
