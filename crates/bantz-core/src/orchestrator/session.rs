//! Per-session state
//!
//! A session owns everything a turn may mutate besides the process-wide
//! breaker registry and pre-router counters: the confirmation firewall, the
//! result cache, an open disambiguation question and the previous turn's
//! results. The handle serializes turns, so no turn observes another one
//! half way through.

use crate::disambiguation::DisambiguationRequest;
use crate::executor::ExecutionState;
use crate::types::{OrchestratorOutput, ToolCallResult, TurnInput};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::core::Orchestrator;

/// State owned by one session
#[derive(Debug)]
pub struct Session {
    /// Session id
    pub id: Uuid,
    /// Turns processed so far
    pub turn_count: u64,
    /// Firewall and cache
    pub execution: ExecutionState,
    /// Question waiting for a numbered answer
    pub pending_disambiguation: Option<DisambiguationRequest>,
    /// Tool results of the previous turn
    pub last_results: Vec<ToolCallResult>,
}

impl Session {
    /// Create an empty session
    #[must_use]
    pub fn new(cache_ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            turn_count: 0,
            execution: ExecutionState::new(cache_ttl),
            pending_disambiguation: None,
            last_results: Vec::new(),
        }
    }

    /// Forget pending questions, confirmations and cached results
    pub fn reset(&mut self) {
        self.execution.firewall.reset();
        self.execution.cache.clear();
        self.pending_disambiguation = None;
        self.last_results.clear();
    }

    /// Whether a confirmation is waiting
    #[must_use]
    pub fn awaiting_confirmation(&self) -> bool {
        self.execution.firewall.is_pending()
    }

    /// Whether a disambiguation question is open
    #[must_use]
    pub fn awaiting_selection(&self) -> bool {
        self.pending_disambiguation.is_some()
    }
}

/// Public turn API for one session
pub struct SessionHandle {
    orchestrator: Arc<Orchestrator>,
    session: Mutex<Session>,
}

impl SessionHandle {
    pub(crate) fn new(orchestrator: Arc<Orchestrator>) -> Self {
        let ttl = orchestrator.config().executor.cache_ttl();
        Self {
            orchestrator,
            session: Mutex::new(Session::new(ttl)),
        }
    }

    /// Process one utterance
    ///
    /// Never fails: every recoverable problem becomes a typed reply.
    pub async fn process_turn(
        &self,
        user_input: &str,
        dialog_summary: &str,
        retrieved_memory: &[String],
    ) -> OrchestratorOutput {
        let jobs = Arc::clone(self.orchestrator.jobs());
        let job = jobs.create("turn", self.orchestrator.config().conversation.turn_priority);
        // a fresh job is queued, so this cannot fail
        let _ = jobs.start(job);

        let output = self
            .process_turn_in_job(job, user_input, dialog_summary, retrieved_memory)
            .await;

        if jobs.state(job).is_some_and(|s| !s.is_terminal()) {
            let _ = jobs.complete(job);
        }
        output
    }

    /// Process one utterance inside an existing job
    ///
    /// The job's owner (usually the conversation driver) stays responsible
    /// for finishing it. Pausing or cancelling the job takes effect at the
    /// next suspension point.
    pub async fn process_turn_in_job(
        &self,
        job: Uuid,
        user_input: &str,
        dialog_summary: &str,
        retrieved_memory: &[String],
    ) -> OrchestratorOutput {
        let mut session = self.session.lock().await;
        session.turn_count += 1;
        let input = TurnInput::new(user_input)
            .with_turn_number(session.turn_count)
            .with_summary(dialog_summary)
            .with_memory(retrieved_memory.to_vec())
            .with_prior_results(session.last_results.clone());
        self.orchestrator.run_turn(&mut session, input, job).await
    }

    /// Clear the session state
    pub async fn reset(&self) {
        self.session.lock().await.reset();
    }

    /// Whether a confirmation is waiting
    pub async fn awaiting_confirmation(&self) -> bool {
        self.session.lock().await.awaiting_confirmation()
    }

    /// Whether a disambiguation question is open
    pub async fn awaiting_selection(&self) -> bool {
        self.session.lock().await.awaiting_selection()
    }

    /// Turns processed so far
    pub async fn turn_count(&self) -> u64 {
        self.session.lock().await.turn_count
    }

    /// The orchestrator behind this session
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}
