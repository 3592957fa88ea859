//! Turn trace log
//!
//! One JSON line per turn, appended to a file shared by every session of
//! the process. The latency gate reads the same file back.

mod gate;


pub use gate::{LatencyBudgets, LatencyGate, LatencyReport, PhaseReport};

use crate::error::Result;
use crate::finalize::Tier;
use crate::types::{Route, ToolCallResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Per-phase elapsed milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// Router call (0 when bypassed)
    pub router_ms: u64,
    /// All tool calls
    pub tool_ms: u64,
    /// Finalizer call
    pub finalize_ms: u64,
    /// Whole turn
    pub total_ms: u64,
}

/// One tool call as seen by the trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolTraceEntry {
    /// Tool name
    pub tool: String,
    /// Whether the call succeeded
    pub success: bool,
    /// Whether the result came from the cache
    pub cached: bool,
    /// Whether the call is waiting for confirmation
    pub pending_confirmation: bool,
    /// Elapsed milliseconds
    pub elapsed_ms: u64,
}

impl From<&ToolCallResult> for ToolTraceEntry {
    fn from(result: &ToolCallResult) -> Self {
        Self {
            tool: result.tool.clone(),
            success: result.success,
            cached: result.cached,
            pending_confirmation: result.pending_confirmation,
            elapsed_ms: result.elapsed_ms,
        }
    }
}

/// One JSONL record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnTrace {
    /// Turn correlation id
    pub turn_id: String,
    /// Session turn number
    pub turn_number: u64,
    /// When the turn started
    pub timestamp: DateTime<Utc>,
    /// Final route
    pub route: Route,
    /// Final intent
    pub intent: String,
    /// Router confidence
    pub confidence: f32,
    /// Whether the pre-router answered
    pub pre_routed: bool,
    /// Router prompt size in tokens
    pub router_prompt_tokens: usize,
    /// Tokens of injected summary and memory
    pub memory_tokens: usize,
    /// Tool calls
    pub tools: Vec<ToolTraceEntry>,
    /// Successful calls
    pub tool_successes: usize,
    /// Failed calls (held calls excluded)
    pub tool_failures: usize,
    /// Model that wrote the reply, or `none(reason)`
    pub finalizer: String,
    /// Tier of that model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Tier reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_reason: Option<String>,
    /// Verification finding codes
    #[serde(default)]
    pub verification: Vec<String>,
    /// Whether the fact guard rejected the reply
    #[serde(default)]
    pub guard_failed: bool,
    /// Errors recovered during the turn
    #[serde(default)]
    pub errors: Vec<String>,
    /// Phase timings
    pub timings: PhaseTimings,
}

impl TurnTrace {
    /// Start a record for a turn
    #[must_use]
    pub fn new(turn_id: impl Into<String>, turn_number: u64) -> Self {
        Self {
            turn_id: turn_id.into(),
            turn_number,
            timestamp: Utc::now(),
            route: Route::Unknown,
            intent: String::new(),
            confidence: 0.0,
            pre_routed: false,
            router_prompt_tokens: 0,
            memory_tokens: 0,
            tools: Vec::new(),
            tool_successes: 0,
            tool_failures: 0,
            finalizer: String::new(),
            tier: None,
            tier_reason: None,
            verification: Vec::new(),
            guard_failed: false,
            errors: Vec::new(),
            timings: PhaseTimings::default(),
        }
    }

    /// Record the tool calls of the turn
    pub fn record_tools(&mut self, results: &[ToolCallResult]) {
        self.tools = results.iter().map(ToolTraceEntry::from).collect();
        self.tool_successes = results.iter().filter(|r| r.success).count();
        self.tool_failures = results
            .iter()
            .filter(|r| !r.success && !r.pending_confirmation)
            .count();
        self.timings.tool_ms = results.iter().map(|r| r.elapsed_ms).sum();
    }
}

/// Append-only JSONL sink
#[derive(Clone)]
pub struct TraceLog {
    path: PathBuf,
    file: Arc<Mutex<tokio::fs::File>>,
}

impl TraceLog {
    /// Open (or create) the log for appending
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Log file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record
    pub async fn append(&self, trace: &TurnTrace) -> Result<()> {
        let mut line = serde_json::to_string(trace)?;
        line.push('\n');
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(turn_id = %trace.turn_id, "Trace appended");
        Ok(())
    }

    /// Read every record of a log; malformed lines are skipped
    pub async fn read_all(path: impl AsRef<Path>) -> Result<Vec<TurnTrace>> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
