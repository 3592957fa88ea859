//! Circuit Breaker pattern implementation
//!
//! One breaker per tool domain (`calendar`, `gmail`, ...), created lazily on
//! first use and kept in a single process-wide map behind one mutex.
//! - Closed: requests pass through
//! - Open: `failure_threshold` consecutive failures seen, requests rejected
//! - HalfOpen: `reset_timeout` elapsed, the next request probes the backend

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures exceeded threshold - requests are rejected
    Open,
    /// Testing recovery - the next request is a probe
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "CLOSED"),
            Self::Open => write!(f, "OPEN"),
            Self::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breakers
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Time to wait before moving from open to half-open
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set reset timeout
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
struct DomainCircuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl DomainCircuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
        }
    }
}

/// Per-domain circuit breakers
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    circuits: Mutex<HashMap<String, DomainCircuit>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerRegistry {
    /// Create a new registry
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    fn with_circuit<T>(&self, domain: &str, f: impl FnOnce(&mut DomainCircuit) -> T) -> T {
        let mut circuits = self.circuits.lock().unwrap_or_else(|e| e.into_inner());
        let circuit = circuits
            .entry(domain.to_string())
            .or_insert_with(DomainCircuit::new);
        f(circuit)
    }

    /// Current state of a domain (lazy transitions not applied)
    #[must_use]
    pub fn state(&self, domain: &str) -> CircuitState {
        self.with_circuit(domain, |c| c.state)
    }

    /// Consecutive failures recorded for a domain
    #[must_use]
    pub fn failure_count(&self, domain: &str) -> u32 {
        self.with_circuit(domain, |c| c.consecutive_failures)
    }

    /// Check if the domain allows a request now
    #[must_use]
    pub fn can_execute(&self, domain: &str) -> bool {
        self.can_execute_at(domain, Instant::now())
    }

    /// Check if the domain allows a request at `now`
    #[must_use]
    pub fn can_execute_at(&self, domain: &str, now: Instant) -> bool {
        let reset_timeout = self.config.reset_timeout;
        self.with_circuit(domain, |c| {
            if c.state == CircuitState::Open {
                let elapsed = c
                    .opened_at
                    .map_or(Duration::MAX, |at| now.saturating_duration_since(at));
                if elapsed >= reset_timeout {
                    info!(domain = %domain, "Circuit breaker entering half-open state");
                    c.state = CircuitState::HalfOpen;
                }
            }
            c.state != CircuitState::Open
        })
    }

    /// Record a successful operation
    pub fn record_success(&self, domain: &str) {
        self.with_circuit(domain, |c| {
            if c.state != CircuitState::Closed {
                info!(domain = %domain, from = %c.state, "Circuit breaker closed");
            }
            c.state = CircuitState::Closed;
            c.consecutive_failures = 0;
            c.opened_at = None;
        });
    }

    /// Record a failed operation
    pub fn record_failure(&self, domain: &str) {
        self.record_failure_at(domain, Instant::now());
    }

    /// Record a failed operation at `now`
    pub fn record_failure_at(&self, domain: &str, now: Instant) {
        let threshold = self.config.failure_threshold;
        self.with_circuit(domain, |c| match c.state {
            CircuitState::Closed => {
                c.consecutive_failures += 1;
                debug!(
                    domain = %domain,
                    failures = c.consecutive_failures,
                    threshold = threshold,
                    "Circuit breaker failure recorded"
                );
                if c.consecutive_failures >= threshold {
                    warn!(domain = %domain, failures = c.consecutive_failures, "Circuit breaker opened");
                    c.state = CircuitState::Open;
                    c.opened_at = Some(now);
                }
            }
            CircuitState::HalfOpen => {
                warn!(domain = %domain, "Circuit breaker probe failed, reopening");
                c.state = CircuitState::Open;
                c.opened_at = Some(now);
            }
            CircuitState::Open => {}
        });
    }

    /// Reset a domain to closed
    pub fn reset(&self, domain: &str) {
        self.record_success(domain);
    }

    /// Snapshot of every known domain
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        let circuits = self.circuits.lock().unwrap_or_else(|e| e.into_inner());
        let mut states: Vec<(String, CircuitState)> = circuits
            .iter()
            .map(|(domain, c)| (domain.clone(), c.state))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }
}
