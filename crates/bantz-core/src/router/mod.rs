//! Router - LLM intent routing
//!
//! One model call per turn turns the utterance into a `RouteDecision`.
//! The router tracks backend health: after `max_consecutive_failures`
//! failed calls (or a failed availability probe) the next turn
//! short-circuits to the fallback decision without calling the model, and
//! the turn after that probes `is_available()` before trying again. Parse
//! failures are recovered into the fallback decision but say nothing about
//! backend health, so they do not count.

mod parse;
mod prompt;


pub use parse::parse_decision;
pub use prompt::build_messages;

use crate::error::{Error, Phase, Result};
use crate::types::RouteDecision;
use bantz_llm::{count_message_tokens, CompletionRequest, SharedProvider};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Question asked when routing fails
pub const FALLBACK_QUESTION: &str = "Şu an seni tam anlayamadım, tekrar söyler misin?";

/// Question asked when confidence is below the threshold and the model gave none
pub const LOW_CONFIDENCE_QUESTION: &str =
    "Tam olarak ne yapmamı istediğini biraz daha açar mısın?";

/// Router configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Decisions below this confidence ask instead of acting
    pub confidence_threshold: f32,
    /// Consecutive call failures before short-circuiting
    pub max_consecutive_failures: u32,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Sampling temperature
    pub temperature: f32,
    /// Max tokens for the JSON answer
    pub max_tokens: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_consecutive_failures: 3,
            timeout_ms: 8_000,
            temperature: 0.0,
            max_tokens: 512,
        }
    }
}

/// A routed turn
#[derive(Debug, Clone)]
pub struct RouterReply {
    /// The decision
    pub decision: RouteDecision,
    /// Prompt size in tokens
    pub prompt_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Health {
    Healthy,
    /// Next call returns the fallback without touching the backend
    ShortCircuit,
    /// Next call probes availability first
    Probe,
}

#[derive(Debug)]
struct HealthTracker {
    state: Health,
    consecutive_failures: u32,
}

/// LLM-backed intent router
pub struct IntentRouter {
    provider: SharedProvider,
    config: RouterConfig,
    catalog: Vec<String>,
    health: Mutex<HealthTracker>,
}

impl IntentRouter {
    /// Create a router over `provider`
    #[must_use]
    pub fn new(provider: SharedProvider, config: RouterConfig) -> Self {
        Self {
            provider,
            config,
            catalog: Vec::new(),
            health: Mutex::new(HealthTracker {
                state: Health::Healthy,
                consecutive_failures: 0,
            }),
        }
    }

    /// Set the tool names offered to the model
    #[must_use]
    pub fn with_catalog(mut self, catalog: Vec<String>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Consecutive call failures so far
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.health
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .consecutive_failures
    }

    fn take_health(&self) -> Health {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        let current = health.state;
        if current == Health::ShortCircuit {
            health.state = Health::Probe;
        }
        current
    }

    fn record_success(&self) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        if health.consecutive_failures > 0 {
            info!(after = health.consecutive_failures, "Router backend recovered");
        }
        health.state = Health::Healthy;
        health.consecutive_failures = 0;
    }

    fn record_failure(&self) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        health.consecutive_failures += 1;
        if health.consecutive_failures >= self.config.max_consecutive_failures {
            warn!(
                failures = health.consecutive_failures,
                "Router backend unhealthy, short-circuiting next call"
            );
            health.state = Health::ShortCircuit;
        }
    }

    fn mark_probe_failed(&self) {
        let mut health = self.health.lock().unwrap_or_else(|e| e.into_inner());
        health.state = Health::ShortCircuit;
    }

    fn unavailable(&self, turn_id: &str) -> Error {
        Error::BackendUnavailable {
            turn_id: turn_id.to_string(),
            phase: Phase::Router,
            backend: self.provider.name().to_string(),
        }
    }

    /// Route one utterance
    ///
    /// Errors: `BackendUnavailable` when short-circuited or the probe fails,
    /// `Timeout`/`Llm` on call failure, `RouterParse` on malformed output.
    #[instrument(skip_all, fields(turn_id = %turn_id))]
    pub async fn route(
        &self,
        turn_id: &str,
        user_input: &str,
        dialog_summary: &str,
        retrieved_memory: &[String],
    ) -> Result<RouterReply> {
        match self.take_health() {
            Health::ShortCircuit => {
                debug!("Router short-circuited");
                return Err(self.unavailable(turn_id));
            }
            Health::Probe => {
                if !self.provider.is_available().await {
                    warn!("Router availability probe failed");
                    self.mark_probe_failed();
                    return Err(self.unavailable(turn_id));
                }
            }
            Health::Healthy => {}
        }

        let messages = build_messages(&self.catalog, user_input, dialog_summary, retrieved_memory);
        let prompt_tokens = count_message_tokens(&messages);
        let request = CompletionRequest::new("")
            .with_messages(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_json_mode(true);

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = match tokio::time::timeout(timeout, self.provider.complete(request)).await {
            Ok(Ok(response)) => {
                self.record_success();
                response
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Router call failed");
                self.record_failure();
                return Err(Error::Model {
                    turn_id: turn_id.to_string(),
                    phase: Phase::Router,
                    source: e,
                });
            }
            Err(_) => {
                warn!(timeout_ms = self.config.timeout_ms, "Router call timed out");
                self.record_failure();
                return Err(Error::Timeout {
                    turn_id: turn_id.to_string(),
                    phase: Phase::Router,
                    elapsed_ms: self.config.timeout_ms,
                });
            }
        };

        let decision = parse_decision(turn_id, &response.content)?;
        let decision = self.apply_confidence_gate(decision);

        debug!(
            route = %decision.route,
            intent = %decision.intent,
            confidence = decision.confidence,
            tools = decision.tool_plan.len(),
            "Routed"
        );

        Ok(RouterReply {
            decision,
            prompt_tokens,
        })
    }

    /// Route, recovering every failure into the fallback decision
    pub async fn route_or_fallback(
        &self,
        turn_id: &str,
        user_input: &str,
        dialog_summary: &str,
        retrieved_memory: &[String],
    ) -> (RouterReply, Option<Error>) {
        match self
            .route(turn_id, user_input, dialog_summary, retrieved_memory)
            .await
        {
            Ok(reply) => (reply, None),
            Err(e) => (
                RouterReply {
                    decision: RouteDecision::fallback(FALLBACK_QUESTION),
                    prompt_tokens: 0,
                },
                Some(e),
            ),
        }
    }

    /// Clear the plan and ask when confidence is under the threshold
    fn apply_confidence_gate(&self, decision: RouteDecision) -> RouteDecision {
        let low_confidence = decision.confidence < self.config.confidence_threshold;
        if !low_confidence && !decision.ask_user {
            return decision;
        }
        let reason = if low_confidence {
            "low_confidence"
        } else {
            "router_asked"
        };
        let question = decision
            .question
            .clone()
            .unwrap_or_else(|| LOW_CONFIDENCE_QUESTION.to_string());
        decision.without_plan(reason).with_question(question)
    }
}
