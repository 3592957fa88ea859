//! p95 latency gate over trace records

use super::TurnTrace;
use serde::{Deserialize, Serialize};

/// p95 budgets in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyBudgets {
    /// Router phase
    pub router_p95_ms: u64,
    /// Tool phase
    pub tool_p95_ms: u64,
    /// Finalize phase
    pub finalize_p95_ms: u64,
    /// Whole turn
    pub total_p95_ms: u64,
}

impl Default for LatencyBudgets {
    fn default() -> Self {
        Self {
            router_p95_ms: 1_500,
            tool_p95_ms: 3_000,
            finalize_p95_ms: 4_000,
            total_p95_ms: 8_000,
        }
    }
}

/// One phase against its budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Phase name
    pub phase: String,
    /// Observed p95
    pub p95_ms: u64,
    /// Budget
    pub budget_ms: u64,
    /// Whether p95 is within budget
    pub passed: bool,
}

/// Gate result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyReport {
    /// Records considered
    pub samples: usize,
    /// Per-phase results
    pub phases: Vec<PhaseReport>,
}

impl LatencyReport {
    /// Whether every phase is within budget
    #[must_use]
    pub fn passed(&self) -> bool {
        self.phases.iter().all(|p| p.passed)
    }

    /// Phases over budget
    #[must_use]
    pub fn violations(&self) -> Vec<&PhaseReport> {
        self.phases.iter().filter(|p| !p.passed).collect()
    }
}

/// Nearest-rank percentile; 0 for no samples
#[must_use]
pub fn percentile(values: &[u64], pct: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Checks trace records against p95 budgets
#[derive(Debug, Clone, Default)]
pub struct LatencyGate {
    budgets: LatencyBudgets,
}

impl LatencyGate {
    /// Create a gate
    #[must_use]
    pub fn new(budgets: LatencyBudgets) -> Self {
        Self { budgets }
    }

    /// Evaluate the records
    ///
    /// Router p95 only counts turns that called the router, and tool p95
    /// only turns that called tools.
    #[must_use]
    pub fn evaluate(&self, traces: &[TurnTrace]) -> LatencyReport {
        let router: Vec<u64> = traces
            .iter()
            .filter(|t| !t.pre_routed && t.timings.router_ms > 0)
            .map(|t| t.timings.router_ms)
            .collect();
        let tool: Vec<u64> = traces
            .iter()
            .filter(|t| !t.tools.is_empty())
            .map(|t| t.timings.tool_ms)
            .collect();
        let finalize: Vec<u64> = traces.iter().map(|t| t.timings.finalize_ms).collect();
        let total: Vec<u64> = traces.iter().map(|t| t.timings.total_ms).collect();

        let phase = |name: &str, values: &[u64], budget_ms: u64| {
            let p95_ms = percentile(values, 95.0);
            PhaseReport {
                phase: name.to_string(),
                p95_ms,
                budget_ms,
                passed: p95_ms <= budget_ms,
            }
        };

        LatencyReport {
            samples: traces.len(),
            phases: vec![
                phase("router", &router, self.budgets.router_p95_ms),
                phase("tool", &tool, self.budgets.tool_p95_ms),
                phase("finalize", &finalize, self.budgets.finalize_p95_ms),
                phase("total", &total, self.budgets.total_p95_ms),
            ],
        }
    }
}
