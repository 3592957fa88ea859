//! Utility modules for bantz-core
//!
//! - retry: bounded retry with exponential backoff
//! - circuit_breaker: per-domain circuit breaker registry

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState};
pub use retry::{retry_with_backoff, RetryConfig, RetryError};
