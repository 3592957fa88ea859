//! Bantz Core - Turn Orchestration Pipeline
//!
//! This crate turns a free-text utterance into verified tool calls and a
//! grounded reply:
//! - Admission: zero-LLM pre-router for trivial and destructive phrasings
//! - Router: LLM intent routing with health tracking and fallback
//! - Verifier: plan checks against the live tool catalog
//! - Security: per-field argument sanitization
//! - Executor: confirmation firewall, per-domain circuit breaker, retries
//! - Disambiguation: numbered clarification instead of guessing a target
//! - Finalize: fast/quality tiering and the numeric fact guard
//! - Trace: JSONL turn records and the p95 latency gate
//! - Conversation: voice-loop state machine and barge-in job manager

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod admission;
pub mod conversation;
pub mod disambiguation;
pub mod error;
pub mod executor;
pub mod finalize;
pub mod memory;
pub mod orchestrator;
pub mod router;
pub mod security;
pub mod trace;
pub mod types;
pub mod utils;
pub mod verifier;

pub use admission::{AdmissionMatch, AdmissionStats, PreRouter, PreRouterRule};
pub use conversation::{
    ConversationConfig, ConversationDriver, ConversationHandle, ConversationState, Job, JobEvent,
    JobManager, JobState, Transition, TransitionOutcome,
};
pub use disambiguation::{
    DisambiguationDialog, DisambiguationItem, DisambiguationRequest, LookupOutcome, Selection,
};
pub use error::{format_error_for_chat, Error, Phase, Result, UserFriendlyError};
pub use executor::{make_action_key, ConfirmationFirewall, NextStep, ToolExecutor};
pub use finalize::{FactGuard, FinalizerPipeline, GuardStrictness, GuardVerdict, Tier};
pub use memory::{ContextInjector, InjectedContext};
pub use orchestrator::{BreakerSettings, Orchestrator, OrchestratorConfig, Session, SessionHandle};
pub use router::IntentRouter;
pub use security::{ArgumentSanitizer, IssueKind, SanitizationIssue, Severity};
pub use trace::{LatencyBudgets, LatencyGate, LatencyReport, TraceLog, TurnTrace};
pub use types::{
    ConfirmationRequest, OrchestratorOutput, Route, RouteDecision, ToolCallResult, TurnInput,
};
pub use utils::{
    retry_with_backoff, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, RetryConfig,
    RetryError,
};
pub use verifier::{PlanVerifier, VerificationError, VerificationOutcome};
