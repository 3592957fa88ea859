//! Builtins - tools that need no external integration
//!
//! - `system.time`: current local date and time
//! - `system.status`: process uptime and registered tool count

use crate::error::Result;
use crate::registry::{RiskLevel, Tool, ToolDefinition, ToolRegistry, ToolResult};
use chrono::{Datelike, Local};
use std::sync::Arc;
use std::time::Instant;

const WEEKDAYS_TR: [&str; 7] = [
    "Pazartesi",
    "Salı",
    "Çarşamba",
    "Perşembe",
    "Cuma",
    "Cumartesi",
    "Pazar",
];

/// Current date/time tool
pub struct SystemTimeTool {
    definition: ToolDefinition,
}

impl SystemTimeTool {
    /// Create a new time tool
    #[must_use]
    pub fn new() -> Self {
        Self {
            definition: ToolDefinition::new("system.time", "Şu anki tarih ve saati döndürür")
                .with_risk_level(RiskLevel::Low)
                .with_idempotent(true),
        }
    }
}

impl Default for SystemTimeTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Tool for SystemTimeTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolResult> {
        let now = Local::now();
        let weekday = WEEKDAYS_TR[now.weekday().num_days_from_monday() as usize];
        Ok(ToolResult::success(
            serde_json::json!({
                "date": now.format("%Y-%m-%d").to_string(),
                "time": now.format("%H:%M").to_string(),
                "weekday": weekday,
                "timezone": now.format("%:z").to_string(),
            }),
            0,
        ))
    }
}

/// Runtime status tool
pub struct SystemStatusTool {
    definition: ToolDefinition,
    started: Instant,
    tool_count: usize,
}

impl SystemStatusTool {
    /// Create a status tool that reports uptime since `started`
    #[must_use]
    pub fn new(started: Instant, tool_count: usize) -> Self {
        Self {
            definition: ToolDefinition::new(
                "system.status",
                "Asistanın çalışma süresini ve durumunu döndürür",
            )
            .with_risk_level(RiskLevel::Low)
            .with_idempotent(true),
            started,
            tool_count,
        }
    }
}

#[async_trait::async_trait]
impl Tool for SystemStatusTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _input: serde_json::Value) -> Result<ToolResult> {
        let uptime = self.started.elapsed().as_secs();
        Ok(ToolResult::success(
            serde_json::json!({
                "uptime_seconds": uptime,
                "uptime_minutes": uptime / 60,
                "tools": self.tool_count,
                "status": "ok",
            }),
            0,
        ))
    }
}

/// Register all built-in tools with the registry
pub fn register_builtins(registry: &mut ToolRegistry) {
    registry.register(Arc::new(SystemTimeTool::new()));
    let count = registry.len() + 1;
    registry.register(Arc::new(SystemStatusTool::new(Instant::now(), count)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_builtins() {
        let mut registry = ToolRegistry::new();
        register_builtins(&mut registry);
        assert!(registry.has("system.time"));
        assert!(registry.has("system.status"));
        assert_eq!(registry.get_definition("system.time").unwrap().domain(), "system");
    }

    #[tokio::test]
    async fn test_time_tool_shape() {
        let result = SystemTimeTool::new()
            .execute(serde_json::json!({}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output["date"].as_str().unwrap().len(), 10);
        assert!(result.output["time"].as_str().unwrap().contains(':'));
    }

    #[tokio::test]
    async fn test_status_tool_reports_tools() {
        let tool = SystemStatusTool::new(Instant::now(), 2);
        let result = tool.execute(serde_json::json!({})).await.unwrap();
        assert_eq!(result.output["tools"], 2);
        assert_eq!(result.output["status"], "ok");
    }
}
