//! Executor - firewall, breaker and tool execution
//!
//! Every call in a verified plan passes, in order:
//! 1. argument sanitization (blocking issues reject the call)
//! 2. the confirmation firewall (destructive calls wait for the user)
//! 3. the per-domain circuit breaker (an OPEN domain is not called)
//! 4. the session result cache (read-only calls only)
//! 5. the runner, under the per-step timeout, with retries for idempotent tools
//!
//! Failures never escape as errors: each becomes a failed `ToolCallResult`.

mod action_key;
mod cache;
mod confirmation;

#[cfg(test)]
mod tests;

pub use action_key::{canonical_json, make_action_key};
pub use cache::{strip_unstable, ResultCache, UNSTABLE_KEYS};
pub use confirmation::{render_prompt, ConfirmationAnswer, ConfirmationFirewall};

use crate::error::{Error, Phase};
use crate::security::ArgumentSanitizer;
use crate::types::{ConfirmationRequest, RouteDecision, ToolCallResult};
use crate::utils::{retry_with_backoff, CircuitBreakerRegistry, RetryConfig};
use bantz_tools::{ExecutionOptions, RiskLevel, ToolRunner};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Per-step timeout in milliseconds
    pub step_timeout_ms: u64,
    /// Attempts for idempotent tools, including the first
    pub retry_max_attempts: u32,
    /// First retry delay in milliseconds
    pub retry_initial_delay_ms: u64,
    /// Retry delay cap in milliseconds
    pub retry_max_delay_ms: u64,
    /// Result cache TTL in seconds
    pub cache_ttl_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 10_000,
            retry_max_attempts: 4,
            retry_initial_delay_ms: 1_000,
            retry_max_delay_ms: 4_000,
            cache_ttl_secs: 300,
        }
    }
}

impl ExecutorConfig {
    /// Retry schedule for idempotent tools
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.retry_max_attempts)
            .with_initial_delay(Duration::from_millis(self.retry_initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_delay_ms))
    }

    /// Per-step timeout
    #[must_use]
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    /// Result cache TTL
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

/// Session-owned state the executor reads and updates
#[derive(Debug, Default)]
pub struct ExecutionState {
    /// Confirmation firewall
    pub firewall: ConfirmationFirewall,
    /// Read-only result cache
    pub cache: ResultCache,
}

impl ExecutionState {
    /// Create state with the given cache TTL
    #[must_use]
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            firewall: ConfirmationFirewall::new(),
            cache: ResultCache::new(cache_ttl),
        }
    }
}

/// What a plan does after a step
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    /// Run the next step
    Continue,
    /// Set a parameter for the remaining steps, then continue
    Fill {
        /// Parameter name
        slot: String,
        /// Value taken from the step's result
        value: Value,
    },
    /// End the plan here
    Stop,
}

/// Plan executor
#[derive(Clone)]
pub struct ToolExecutor {
    runner: ToolRunner,
    breakers: Arc<CircuitBreakerRegistry>,
    sanitizer: ArgumentSanitizer,
    config: ExecutorConfig,
}

impl ToolExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(
        runner: ToolRunner,
        breakers: Arc<CircuitBreakerRegistry>,
        sanitizer: ArgumentSanitizer,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            runner,
            breakers,
            sanitizer,
            config,
        }
    }

    /// Get the runner
    #[must_use]
    pub fn runner(&self) -> &ToolRunner {
        &self.runner
    }

    /// Get the breaker registry
    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Enabled tool names, for the router catalog and the verifier
    #[must_use]
    pub fn catalog(&self) -> Vec<String> {
        self.runner
            .registry()
            .list_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Execute a verified plan in order
    ///
    /// With a confirmation already pending, returns exactly one blocked
    /// result for it and invokes nothing. Otherwise stops at the first call
    /// held for confirmation, or when `after_step` says so for the result
    /// just produced. `after_step` may also fill a parameter for the steps
    /// that follow (a lookup supplying the target id).
    #[instrument(skip_all, fields(turn_id = %turn_id, route = %decision.route))]
    pub async fn execute_plan<F>(
        &self,
        turn_id: &str,
        decision: &RouteDecision,
        state: &mut ExecutionState,
        mut after_step: F,
    ) -> Vec<ToolCallResult>
    where
        F: FnMut(&ToolCallResult) -> NextStep,
    {
        if let Some(pending) = state.firewall.pending() {
            debug!(tool = %pending.tool, "Confirmation pending, plan held");
            return vec![ToolCallResult::blocked(
                pending.tool.clone(),
                pending.params.clone(),
                pending.prompt.clone(),
            )];
        }

        let mut params = decision.params();
        let prompt = decision.confirmation_prompt.as_deref();
        let mut results = Vec::with_capacity(decision.tool_plan.len());
        for tool in &decision.tool_plan {
            let result = self.execute_call(turn_id, tool, &params, prompt, state).await;
            if result.pending_confirmation {
                results.push(result);
                break;
            }
            let next = after_step(&result);
            results.push(result);
            match next {
                NextStep::Continue => {}
                NextStep::Fill { slot, value } => {
                    debug!(slot = %slot, "Parameter filled from previous step");
                    if let Value::Object(map) = &mut params {
                        map.insert(slot, value);
                    }
                }
                NextStep::Stop => break,
            }
        }
        results
    }

    /// Execute one call through every gate
    pub async fn execute_call(
        &self,
        turn_id: &str,
        tool: &str,
        params: &Value,
        confirmation_prompt: Option<&str>,
        state: &mut ExecutionState,
    ) -> ToolCallResult {
        let Some(definition) = self.runner.registry().get_definition(tool).cloned() else {
            let error = Error::from(bantz_tools::Error::NotFound(tool.to_string()));
            return ToolCallResult::failed(tool, params.clone(), error.to_string(), 0);
        };

        let (cleaned, issues) = self.sanitizer.sanitize(tool, params);
        if ArgumentSanitizer::has_blocking_issues(&issues) {
            let error = Error::SafetyViolation {
                turn_id: turn_id.to_string(),
                phase: Phase::Sanitize,
                message: ArgumentSanitizer::blocking_summary(&issues),
            };
            warn!(tool = %tool, error = %error, "Call rejected by sanitizer");
            return ToolCallResult::failed(tool, cleaned, error.to_string(), 0);
        }

        if definition.needs_confirmation() {
            let action_key = make_action_key(tool, &cleaned);
            if !state.firewall.consume(&action_key) {
                let prompt = confirmation_prompt
                    .map(str::to_string)
                    .unwrap_or_else(|| render_prompt(tool, &cleaned));
                state.firewall.request(ConfirmationRequest {
                    tool: tool.to_string(),
                    risk_level: definition.risk_level,
                    prompt: prompt.clone(),
                    params: cleaned.clone(),
                    action_key,
                });
                return ToolCallResult::blocked(tool, cleaned, prompt);
            }
            info!(tool = %tool, "Executing confirmed call");
        }

        let domain = definition.domain().to_string();
        if !self.breakers.can_execute(&domain) {
            let error = Error::BackendUnavailable {
                turn_id: turn_id.to_string(),
                phase: Phase::Execute,
                backend: domain.clone(),
            };
            warn!(tool = %tool, domain = %domain, "Circuit open, call skipped");
            let mut result = ToolCallResult::failed(tool, cleaned, error.to_string(), 0);
            result.result = serde_json::json!({ "backend_unavailable": domain });
            return result;
        }

        let cacheable = definition.risk_level == RiskLevel::Low && !definition.needs_confirmation();
        if cacheable {
            if let Some(output) = state.cache.get(tool, &cleaned) {
                debug!(tool = %tool, "Cache hit");
                let mut result = ToolCallResult::succeeded(tool, cleaned, output, 0);
                result.cached = true;
                return result;
            }
        }

        let start = Instant::now();
        let options = ExecutionOptions::with_timeout(self.config.step_timeout());
        let outcome = if definition.idempotent {
            retry_with_backoff(
                &self.config.retry_config(),
                || self.runner.execute_with_options(tool, cleaned.clone(), options.clone()),
                bantz_tools::Error::is_retryable,
            )
            .await
            .map_err(|e| e.last_error)
        } else {
            self.runner
                .execute_with_options(tool, cleaned.clone(), options)
                .await
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(output) if output.success => {
                self.breakers.record_success(&domain);
                if cacheable {
                    state.cache.insert(tool, &cleaned, output.output.clone());
                }
                ToolCallResult::succeeded(tool, cleaned, output.output, elapsed_ms)
            }
            Ok(output) => {
                self.breakers.record_failure(&domain);
                let error = Error::ToolExecution {
                    turn_id: turn_id.to_string(),
                    tool: tool.to_string(),
                    message: output.error.unwrap_or_else(|| "unknown failure".to_string()),
                };
                ToolCallResult::failed(tool, cleaned, error.to_string(), elapsed_ms)
            }
            Err(e) => {
                if counts_against_backend(&e) {
                    self.breakers.record_failure(&domain);
                }
                let error = Error::ToolExecution {
                    turn_id: turn_id.to_string(),
                    tool: tool.to_string(),
                    message: e.to_string(),
                };
                warn!(tool = %tool, error = %error, "Tool call failed");
                ToolCallResult::failed(tool, cleaned, error.to_string(), elapsed_ms)
            }
        }
    }
}

/// Input/registry mistakes say nothing about the backend
fn counts_against_backend(error: &bantz_tools::Error) -> bool {
    !matches!(
        error,
        bantz_tools::Error::InvalidInput(_)
            | bantz_tools::Error::NotFound(_)
            | bantz_tools::Error::Disabled(_)
    )
}
