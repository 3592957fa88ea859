//! Runner - Tool execution engine
//!
//! Resolves a tool by name, validates its input and runs it under a timeout.
//! Confirmation, circuit breaking and retries live one level up in the turn
//! pipeline; the runner only knows about a single call.

use crate::error::{Error, Result};
use crate::registry::{ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

/// Configuration for the tool runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Default timeout for tool execution
    pub default_timeout: Duration,
    /// Maximum timeout allowed
    pub max_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(10),
            max_timeout: Duration::from_secs(60),
        }
    }
}

impl RunnerConfig {
    /// Create a new configuration with default timeout
    #[must_use]
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            default_timeout,
            ..Default::default()
        }
    }

    /// Set the maximum timeout
    #[must_use]
    pub fn with_max_timeout(mut self, max_timeout: Duration) -> Self {
        self.max_timeout = max_timeout;
        self
    }
}

/// Options for a single tool execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Custom timeout for this execution
    pub timeout: Option<Duration>,
    /// Skip schema validation
    pub skip_validation: bool,
}

impl ExecutionOptions {
    /// Create options with a specific timeout
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Default::default()
        }
    }
}

/// Tool runner executing one call at a time under a timeout
#[derive(Clone)]
pub struct ToolRunner {
    registry: Arc<ToolRegistry>,
    config: RunnerConfig,
}

impl ToolRunner {
    /// Create a new tool runner
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, config: RunnerConfig) -> Self {
        Self { registry, config }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(registry: Arc<ToolRegistry>) -> Self {
        Self::new(registry, RunnerConfig::default())
    }

    /// Get the registry
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Execute a tool by name with default options
    pub async fn execute(&self, tool_name: &str, input: serde_json::Value) -> Result<ToolResult> {
        self.execute_with_options(tool_name, input, ExecutionOptions::default())
            .await
    }

    /// Execute a tool with custom options
    ///
    /// Errors raised by the tool itself are propagated unchanged so callers
    /// can decide whether to retry; a tool that reports failure through
    /// `ToolResult::failure` comes back as `Ok`.
    #[instrument(skip(self, input, options), fields(tool = %tool_name))]
    pub async fn execute_with_options(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        options: ExecutionOptions,
    ) -> Result<ToolResult> {
        let (definition, tool) = self.registry.lookup(tool_name)?;

        if !definition.enabled {
            return Err(Error::Disabled(tool_name.to_string()));
        }

        if !options.skip_validation {
            tool.validate_input(&input)?;
        }

        let execution_timeout = options
            .timeout
            .unwrap_or(self.config.default_timeout)
            .min(self.config.max_timeout);

        let start = Instant::now();
        debug!(tool = %tool_name, timeout_ms = %execution_timeout.as_millis(), "Executing tool");

        let mut result = match timeout(execution_timeout, tool.execute(input)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool = %tool_name, error = %e, "Tool execution failed");
                return Err(e);
            }
            Err(_) => {
                let duration = start.elapsed().as_millis() as u64;
                warn!(tool = %tool_name, timeout_ms = %execution_timeout.as_millis(), "Tool execution timed out");
                return Err(Error::Timeout(duration));
            }
        };

        if result.duration_ms == 0 {
            result.duration_ms = start.elapsed().as_millis() as u64;
        }

        debug!(
            tool = %tool_name,
            success = %result.success,
            duration_ms = %result.duration_ms,
            "Tool execution completed"
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Tool, ToolDefinition};

    struct SlowTool {
        definition: ToolDefinition,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl Tool for SlowTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, _input: serde_json::Value) -> Result<ToolResult> {
            tokio::time::sleep(self.delay).await;
            Ok(ToolResult::success(serde_json::json!({"ok": true}), 0))
        }
    }

    fn runner_with(delay: Duration, enabled: bool) -> ToolRunner {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SlowTool {
            definition: ToolDefinition::new("system.slow", "sleeps").with_enabled(enabled),
            delay,
        }));
        ToolRunner::new(
            Arc::new(registry),
            RunnerConfig::new(Duration::from_millis(50)),
        )
    }

    #[test]
    fn test_runner_config() {
        let config = RunnerConfig::new(Duration::from_secs(5)).with_max_timeout(Duration::from_secs(20));
        assert_eq!(config.default_timeout, Duration::from_secs(5));
        assert_eq!(config.max_timeout, Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_execute_success() {
        let runner = runner_with(Duration::from_millis(1), true);
        let result = runner
            .execute("system.slow", serde_json::json!({}))
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_times_out() {
        let runner = runner_with(Duration::from_secs(5), true);
        let err = runner
            .execute("system.slow", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_disabled_and_missing() {
        let runner = runner_with(Duration::from_millis(1), false);
        assert!(matches!(
            runner.execute("system.slow", serde_json::json!({})).await,
            Err(Error::Disabled(_))
        ));
        assert!(matches!(
            runner.execute("system.none", serde_json::json!({})).await,
            Err(Error::NotFound(_))
        ));
    }
}
