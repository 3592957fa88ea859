//! Registry - Tool registration and discovery
//!
//! Tools are capability objects registered under a dotted name
//! (`calendar.create_event`, `gmail.send`). The part before the first dot is
//! the tool's domain, which the pipeline uses for route consistency checks
//! and per-domain circuit breaking.
//!
//! Creation tools (`*.create*`, not marked idempotent) are registered behind
//! [`IdempotentTool`] so a repeated create inside the window is not run twice.

use crate::error::{Error, Result};
use crate::idempotency::IdempotentTool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Risk level of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Low risk - read-only operations
    Low,
    /// Medium risk - writes with limited scope
    Medium,
    /// High risk - destructive or outbound actions
    High,
}

impl RiskLevel {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Check if this risk level always needs an explicit confirmation
    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::High)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tool metadata and schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (`domain.action`)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
    /// Risk level
    pub risk_level: RiskLevel,
    /// Whether a call must be confirmed by the user first
    pub requires_confirmation: bool,
    /// Whether repeating the call is harmless (safe to retry)
    pub idempotent: bool,
    /// Whether the tool is enabled
    pub enabled: bool,
}

impl ToolDefinition {
    /// Create a new tool definition
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            risk_level: RiskLevel::Low,
            requires_confirmation: false,
            idempotent: false,
            enabled: true,
        }
    }

    /// Set the parameters schema
    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the risk level
    #[must_use]
    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Mark the tool as needing explicit confirmation
    #[must_use]
    pub fn with_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = required;
        self
    }

    /// Mark the tool as idempotent
    #[must_use]
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    /// Set enabled status
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Domain prefix of the tool name (`gmail` for `gmail.send`)
    #[must_use]
    pub fn domain(&self) -> &str {
        tool_domain(&self.name)
    }

    /// Whether the firewall must hold this tool for confirmation
    #[must_use]
    pub fn needs_confirmation(&self) -> bool {
        self.requires_confirmation || self.risk_level.requires_confirmation()
    }

    /// Names listed in the schema's `required` array
    #[must_use]
    pub fn required_params(&self) -> Vec<&str> {
        self.parameters
            .get("required")
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }
}

/// Domain prefix of a dotted tool name
#[must_use]
pub fn tool_domain(name: &str) -> &str {
    name.split_once('.').map_or(name, |(domain, _)| domain)
}

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution succeeded
    pub success: bool,
    /// Output data
    pub output: serde_json::Value,
    /// Error message if failed
    pub error: Option<String>,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl ToolResult {
    /// Create a successful result
    #[must_use]
    pub fn success(output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            output,
            error: None,
            duration_ms,
        }
    }

    /// Create a failed result
    #[must_use]
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

/// Trait for tool implementations
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with given input
    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult>;

    /// Validate input before execution
    fn validate_input(&self, input: &serde_json::Value) -> Result<()> {
        let Some(obj) = input.as_object() else {
            return Err(Error::InvalidInput("Input must be an object".to_string()));
        };
        for name in self.definition().required_params() {
            if obj.get(name).map_or(true, serde_json::Value::is_null) {
                return Err(Error::InvalidInput(format!("missing parameter: {name}")));
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl<T: Tool + ?Sized> Tool for Arc<T> {
    fn definition(&self) -> &ToolDefinition {
        (**self).definition()
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        (**self).execute(input).await
    }

    fn validate_input(&self, input: &serde_json::Value) -> Result<()> {
        (**self).validate_input(input)
    }
}

/// Whether a tool creates records and needs duplicate suppression
#[must_use]
pub fn creates_records(definition: &ToolDefinition) -> bool {
    let action = definition
        .name
        .split_once('.')
        .map_or(definition.name.as_str(), |(_, action)| action);
    !definition.idempotent && action.starts_with("create")
}

/// Registry for managing tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    definitions: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let tool: Arc<dyn Tool> = if creates_records(tool.definition()) {
            Arc::new(IdempotentTool::new(tool))
        } else {
            tool
        };
        let def = tool.definition();
        let name = def.name.clone();
        debug!(tool = %name, risk = %def.risk_level, "Registering tool");
        self.definitions.insert(name.clone(), def.clone());
        self.tools.insert(name, tool);
    }

    /// Get a tool by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Get a tool definition by name
    #[must_use]
    pub fn get_definition(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.get(name)
    }

    /// Look up both the definition and the capability object
    pub fn lookup(&self, name: &str) -> Result<(&ToolDefinition, Arc<dyn Tool>)> {
        match (self.definitions.get(name), self.tools.get(name)) {
            (Some(def), Some(tool)) => Ok((def, Arc::clone(tool))),
            _ => Err(Error::NotFound(name.to_string())),
        }
    }

    /// Check if a tool exists
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List enabled tool names, sorted
    #[must_use]
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .definitions
            .values()
            .filter(|d| d.enabled)
            .map(|d| d.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// List enabled tool definitions, sorted by name
    #[must_use]
    pub fn list_enabled(&self) -> Vec<&ToolDefinition> {
        let mut defs: Vec<&ToolDefinition> =
            self.definitions.values().filter(|d| d.enabled).collect();
        defs.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Enable a tool
    pub fn enable(&mut self, name: &str) -> bool {
        self.set_enabled(name, true)
    }

    /// Disable a tool
    pub fn disable(&mut self, name: &str) -> bool {
        self.set_enabled(name, false)
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        if let Some(def) = self.definitions.get_mut(name) {
            def.enabled = enabled;
            true
        } else {
            false
        }
    }

    /// Get tool count
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        definition: ToolDefinition,
    }

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
            Ok(ToolResult::success(input, 0))
        }
    }

    fn echo(name: &str) -> Arc<dyn Tool> {
        Arc::new(EchoTool {
            definition: ToolDefinition::new(name, "echo").with_parameters(serde_json::json!({
                "type": "object",
                "properties": {"title": {"type": "string"}},
                "required": ["title"]
            })),
        })
    }

    #[test]
    fn test_risk_level() {
        assert_eq!(RiskLevel::Medium.as_str(), "medium");
        assert!(!RiskLevel::Low.requires_confirmation());
        assert!(RiskLevel::High.requires_confirmation());
    }

    #[test]
    fn test_definition_domain_and_confirmation() {
        let def = ToolDefinition::new("calendar.delete_event", "Delete an event")
            .with_risk_level(RiskLevel::Medium)
            .with_confirmation(true);
        assert_eq!(def.domain(), "calendar");
        assert!(def.needs_confirmation());

        let high = ToolDefinition::new("gmail.send", "Send").with_risk_level(RiskLevel::High);
        assert!(high.needs_confirmation());
        assert_eq!(tool_domain("undotted"), "undotted");
    }

    #[test]
    fn test_registry_lookup_and_disable() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("calendar.list_events"));
        registry.register(echo("gmail.list_messages"));

        assert!(registry.lookup("calendar.list_events").is_ok());
        assert!(matches!(
            registry.lookup("calendar.nope"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(
            registry.list_names(),
            vec!["calendar.list_events", "gmail.list_messages"]
        );

        assert!(registry.disable("gmail.list_messages"));
        assert_eq!(registry.list_names(), vec!["calendar.list_events"]);
        assert!(!registry.disable("missing"));
    }

    #[test]
    fn test_creates_records() {
        assert!(creates_records(&ToolDefinition::new("calendar.create_event", "")));
        assert!(!creates_records(
            &ToolDefinition::new("calendar.create_event", "").with_idempotent(true)
        ));
        assert!(!creates_records(&ToolDefinition::new("calendar.list_events", "")));
        assert!(!creates_records(&ToolDefinition::new("system.time", "")));
    }

    #[tokio::test]
    async fn test_registered_create_tool_suppresses_duplicates() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("calendar.create_event"));
        registry.register(echo("calendar.list_events"));
        let input = serde_json::json!({"title": "Toplantı", "start": "2024-05-01T10:00"});

        let create = registry.get("calendar.create_event").unwrap();
        let first = create.execute(input.clone()).await.unwrap();
        let second = create.execute(input.clone()).await.unwrap();
        assert!(first.output.get("deduplicated").is_none());
        assert_eq!(second.output["deduplicated"], true);

        let list = registry.get("calendar.list_events").unwrap();
        list.execute(input.clone()).await.unwrap();
        let again = list.execute(input).await.unwrap();
        assert!(again.output.get("deduplicated").is_none());
    }

    #[test]
    fn test_validate_required_params() {
        let tool = echo("calendar.create_event");
        assert!(tool.validate_input(&serde_json::json!({"title": "x"})).is_ok());
        assert!(tool.validate_input(&serde_json::json!({})).is_err());
        assert!(tool.validate_input(&serde_json::json!([1, 2])).is_err());
    }
}
