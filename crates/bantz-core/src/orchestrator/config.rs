//! Orchestrator configuration
//!
//! One serde-deserializable tree covering every stage, so the binary can
//! load it straight out of the `[orchestrator]` table.

use crate::conversation::{ConversationConfig, JobConfig};
use crate::disambiguation::DisambiguationConfig;
use crate::error::{Error, Result};
use crate::executor::ExecutorConfig;
use crate::finalize::FinalizerConfig;
use crate::memory::MemoryConfig;
use crate::router::RouterConfig;
use crate::security::SanitizerConfig;
use crate::utils::CircuitBreakerConfig;
use crate::verifier::VerifierConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-domain circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures before a domain opens
    pub failure_threshold: u32,
    /// Seconds an open domain waits before a half-open probe
    pub reset_timeout_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout_secs: 30,
        }
    }
}

impl BreakerSettings {
    /// Registry configuration
    #[must_use]
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_reset_timeout(Duration::from_secs(self.reset_timeout_secs))
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Intent router
    pub router: RouterConfig,
    /// Plan verifier
    pub verifier: VerifierConfig,
    /// Argument sanitizer
    pub sanitizer: SanitizerConfig,
    /// Tool executor
    pub executor: ExecutorConfig,
    /// Circuit breaker
    pub breaker: BreakerSettings,
    /// Disambiguation dialog
    pub disambiguation: DisambiguationConfig,
    /// Finalizer, tiering and complexity table
    pub finalizer: FinalizerConfig,
    /// Context budgets
    pub memory: MemoryConfig,
    /// Job manager
    pub jobs: JobConfig,
    /// Conversation driver
    pub conversation: ConversationConfig,
}

fn invalid(field: &str, message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        field: field.to_string(),
        message: message.into(),
    }
}

impl OrchestratorConfig {
    /// Create a default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the router configuration
    #[must_use]
    pub fn with_router(mut self, router: RouterConfig) -> Self {
        self.router = router;
        self
    }

    /// Set the executor configuration
    #[must_use]
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Set the breaker settings
    #[must_use]
    pub fn with_breaker(mut self, breaker: BreakerSettings) -> Self {
        self.breaker = breaker;
        self
    }

    /// Set the finalizer configuration
    #[must_use]
    pub fn with_finalizer(mut self, finalizer: FinalizerConfig) -> Self {
        self.finalizer = finalizer;
        self
    }

    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.router.confidence_threshold) {
            return Err(invalid(
                "orchestrator.router.confidence_threshold",
                "must be between 0.0 and 1.0",
            ));
        }
        if self.router.max_consecutive_failures == 0 {
            return Err(invalid(
                "orchestrator.router.max_consecutive_failures",
                "must be at least 1",
            ));
        }
        if self.router.timeout_ms == 0 {
            return Err(invalid("orchestrator.router.timeout_ms", "must be positive"));
        }
        if self.executor.step_timeout_ms == 0 {
            return Err(invalid(
                "orchestrator.executor.step_timeout_ms",
                "must be positive",
            ));
        }
        if self.executor.retry_max_attempts == 0 {
            return Err(invalid(
                "orchestrator.executor.retry_max_attempts",
                "must be at least 1",
            ));
        }
        if self.executor.retry_initial_delay_ms > self.executor.retry_max_delay_ms {
            return Err(invalid(
                "orchestrator.executor.retry_initial_delay_ms",
                "must not exceed retry_max_delay_ms",
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(invalid(
                "orchestrator.breaker.failure_threshold",
                "must be at least 1",
            ));
        }
        if self.disambiguation.min_items < 2 {
            return Err(invalid(
                "orchestrator.disambiguation.min_items",
                "a question needs at least 2 candidates",
            ));
        }
        if self.finalizer.tier.complexity_threshold > self.finalizer.complexity.max_score {
            return Err(invalid(
                "orchestrator.finalizer.tier.complexity_threshold",
                format!(
                    "{} can never be reached, max_score is {}",
                    self.finalizer.tier.complexity_threshold, self.finalizer.complexity.max_score
                ),
            ));
        }
        if self.finalizer.timeout_ms == 0 {
            return Err(invalid("orchestrator.finalizer.timeout_ms", "must be positive"));
        }
        Ok(())
    }
}
