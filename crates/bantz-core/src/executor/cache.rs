//! Per-session cache for read-only tool results

use super::action_key::make_action_key;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Parameter keys that change between otherwise identical calls
pub const UNSTABLE_KEYS: &[&str] = &[
    "page_token",
    "pageToken",
    "next_page_token",
    "nextPageToken",
    "request_id",
    "requestId",
    "nonce",
    "timestamp",
    "trace_id",
];

/// Remove unstable keys at every depth
#[must_use]
pub fn strip_unstable(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSTABLE_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), strip_unstable(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_unstable).collect()),
        other => other.clone(),
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    output: Value,
}

/// TTL cache keyed by the stable action key
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl ResultCache {
    /// Create a cache with the given TTL
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Cache key for a call
    #[must_use]
    pub fn key(tool: &str, params: &Value) -> String {
        make_action_key(tool, &strip_unstable(params))
    }

    /// Fresh cached output for a call
    pub fn get(&mut self, tool: &str, params: &Value) -> Option<Value> {
        self.get_at(tool, params, Instant::now())
    }

    /// `get` at an explicit instant
    pub fn get_at(&mut self, tool: &str, params: &Value, now: Instant) -> Option<Value> {
        let key = Self::key(tool, params);
        let expired = match self.entries.get(&key) {
            Some(entry) => now.saturating_duration_since(entry.stored_at) >= self.ttl,
            None => return None,
        };
        if expired {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key).map(|e| e.output.clone())
    }

    /// Store a successful output
    pub fn insert(&mut self, tool: &str, params: &Value, output: Value) {
        self.entries.insert(
            Self::key(tool, params),
            CacheEntry {
                stored_at: Instant::now(),
                output,
            },
        );
    }

    /// Number of entries (fresh or not)
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
