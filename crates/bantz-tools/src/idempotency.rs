//! Idempotency wrapper for mutating tools
//!
//! Wraps a tool such as `calendar.create_event` so that a second call with
//! the same identity fields (title, start, end by default) inside the window
//! returns the first result instead of creating a duplicate.

use crate::error::Result;
use crate::registry::{Tool, ToolDefinition, ToolResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// Default identity fields for event-like payloads
pub const DEFAULT_KEY_FIELDS: &[&str] = &["title", "start", "end"];

/// A tool wrapper that suppresses duplicate calls
pub struct IdempotentTool<T: Tool> {
    inner: T,
    key_fields: Vec<String>,
    window: Duration,
    seen: Mutex<HashMap<String, (Instant, ToolResult)>>,
}

impl<T: Tool> IdempotentTool<T> {
    /// Wrap a tool with the default key fields and a ten minute window
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            key_fields: DEFAULT_KEY_FIELDS.iter().map(|s| (*s).to_string()).collect(),
            window: Duration::from_secs(600),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Use different identity fields
    #[must_use]
    pub fn with_key_fields(mut self, fields: &[&str]) -> Self {
        self.key_fields = fields.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the deduplication window
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Identity key of a call, `None` when no key field is present
    fn identity(&self, input: &serde_json::Value) -> Option<String> {
        let parts: Vec<String> = self
            .key_fields
            .iter()
            .map(|field| match input.get(field) {
                Some(serde_json::Value::String(s)) => s.trim().to_lowercase(),
                Some(serde_json::Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        if parts.iter().all(String::is_empty) {
            return None;
        }
        Some(parts.join("\u{1f}"))
    }
}

#[async_trait::async_trait]
impl<T: Tool> Tool for IdempotentTool<T> {
    fn definition(&self) -> &ToolDefinition {
        self.inner.definition()
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let key = self.identity(&input);

        if let Some(key) = &key {
            let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
            seen.retain(|_, (at, _)| at.elapsed() < self.window);
            if let Some((_, previous)) = seen.get(key) {
                info!(tool = %self.inner.definition().name, "Duplicate call suppressed");
                let mut replay = previous.clone();
                if let serde_json::Value::Object(map) = &mut replay.output {
                    map.insert("deduplicated".to_string(), serde_json::Value::Bool(true));
                }
                return Ok(replay);
            }
        }

        let result = self.inner.execute(input).await?;

        if let (Some(key), true) = (key, result.success) {
            self.seen
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key, (Instant::now(), result.clone()));
        }

        Ok(result)
    }

    fn validate_input(&self, input: &serde_json::Value) -> Result<()> {
        self.inner.validate_input(input)
    }
}
