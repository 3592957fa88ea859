//! Orchestrator assembly from application config

use crate::config::AppConfig;
use crate::providers::{build_fast, build_quality};
use anyhow::{Context, Result};
use bantz_core::{Orchestrator, TraceLog};
use bantz_tools::{register_builtins, ToolRegistry};
use std::sync::Arc;
use tracing::info;

/// Build a ready orchestrator: model tiers, builtin tools and the trace log
pub async fn build_orchestrator(config: &AppConfig) -> Result<Arc<Orchestrator>> {
    config.validate()?;

    let fast = build_fast(&config.llm)?;
    let quality = build_quality(&config.llm)?;

    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    info!(tools = registry.len(), "Tool registry ready");

    let mut orchestrator = Orchestrator::new(
        fast,
        quality,
        Arc::new(registry),
        config.orchestrator.clone(),
    )?;

    if config.trace.enabled {
        let log = TraceLog::open(&config.trace.path)
            .await
            .with_context(|| format!("Failed to open trace log {}", config.trace.path.display()))?;
        info!(path = %config.trace.path.display(), "Turn tracing enabled");
        orchestrator = orchestrator.with_trace_log(log);
    }

    Ok(Arc::new(orchestrator))
}
