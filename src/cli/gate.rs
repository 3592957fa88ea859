//! `latency-gate` command

use crate::config::load_config;
use anyhow::{Context, Result};
use bantz_core::{LatencyGate, TraceLog};
use std::path::PathBuf;

pub async fn run(trace: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let path = trace.unwrap_or(config.trace.path);

    let traces = TraceLog::read_all(&path)
        .await
        .with_context(|| format!("Failed to read trace log {}", path.display()))?;
    let report = LatencyGate::new(config.latency_gate).evaluate(&traces);

    println!("Latency gate: {} ({} turns)", path.display(), report.samples);
    for phase in &report.phases {
        let mark = if phase.passed { "✅" } else { "❌" };
        println!(
            "  {mark} {:<10} p95 {:>6} ms  (budget {} ms)",
            phase.phase, phase.p95_ms, phase.budget_ms
        );
    }

    let violations = report.violations();
    if !violations.is_empty() {
        let names: Vec<&str> = violations.iter().map(|p| p.phase.as_str()).collect();
        anyhow::bail!("p95 budget exceeded: {}", names.join(", "));
    }
    println!("All phases within budget.");
    Ok(())
}
