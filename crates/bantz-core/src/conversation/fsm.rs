//! Voice-loop state machine
//!
//! The machine runs as its own task. Callers send a `Transition` through a
//! `ConversationHandle` and await the reply on a oneshot channel under a
//! bounded timeout, so a wedged driver surfaces as an error instead of a
//! hang.

use super::jobs::JobManager;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Waiting for the wake word
    Idle,
    /// Capturing the utterance
    Listening,
    /// Running the turn
    Thinking,
    /// Speaking the reply
    Speaking,
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
        };
        f.write_str(s)
    }
}

/// Requested transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Wake word detected
    Wake,
    /// An utterance was captured
    Heard,
    /// The turn produced a reply
    Replied,
    /// Speech playback finished
    Finished,
    /// Back to idle, cancelling the current job
    Reset,
}

/// Result of a transition request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The state changed
    Moved {
        /// Previous state
        from: ConversationState,
        /// New state
        to: ConversationState,
        /// Job tied to the new state, if any
        job: Option<Uuid>,
        /// Whether this interrupted speech
        barge_in: bool,
    },
    /// Not allowed from the current state
    Rejected {
        /// Current state
        state: ConversationState,
        /// The refused transition
        transition: Transition,
    },
}

/// Driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// How long a caller waits for the driver
    pub request_timeout_ms: u64,
    /// Request channel capacity
    pub channel_capacity: usize,
    /// Priority of ordinary turn jobs
    pub turn_priority: u8,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 2_000,
            channel_capacity: 32,
            turn_priority: 10,
        }
    }
}

enum Request {
    Transition(Transition, oneshot::Sender<TransitionOutcome>),
    State(oneshot::Sender<(ConversationState, Option<Uuid>)>),
}

/// Client side of the driver
#[derive(Clone)]
pub struct ConversationHandle {
    tx: mpsc::Sender<Request>,
    timeout: Duration,
}

impl ConversationHandle {
    async fn call<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| Error::Internal("conversation driver stopped".to_string()))?;
        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(Error::Internal("conversation driver dropped the reply".to_string())),
            Err(_) => Err(Error::Internal(format!(
                "conversation driver did not reply within {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Request a transition
    pub async fn send(&self, transition: Transition) -> Result<TransitionOutcome> {
        self.call(|reply| Request::Transition(transition, reply)).await
    }

    /// Current state and job
    pub async fn state(&self) -> Result<(ConversationState, Option<Uuid>)> {
        self.call(Request::State).await
    }
}

/// The state machine task
pub struct ConversationDriver {
    state: ConversationState,
    current_job: Option<Uuid>,
    jobs: Arc<JobManager>,
    config: ConversationConfig,
}

impl ConversationDriver {
    /// Spawn the driver and return its handle
    #[must_use]
    pub fn spawn(jobs: Arc<JobManager>, config: ConversationConfig) -> ConversationHandle {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let driver = Self {
            state: ConversationState::Idle,
            current_job: None,
            jobs,
            config,
        };
        tokio::spawn(driver.run(rx));
        ConversationHandle { tx, timeout }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        while let Some(request) = rx.recv().await {
            match request {
                Request::Transition(transition, reply) => {
                    let outcome = self.apply(transition);
                    // the caller may have timed out
                    let _ = reply.send(outcome);
                }
                Request::State(reply) => {
                    let _ = reply.send((self.state, self.current_job));
                }
            }
        }
        debug!("Conversation driver stopped");
    }

    fn apply(&mut self, transition: Transition) -> TransitionOutcome {
        use ConversationState::*;

        let from = self.state;
        let mut barge_in = false;
        let to = match (from, transition) {
            (_, Transition::Reset) => {
                // oldest first, so no watcher resumes a parent we are about to cancel
                let mut chain = Vec::new();
                let mut next = self.current_job.take();
                while let Some(job) = next {
                    chain.push(job);
                    next = self.jobs.get(job).and_then(|j| j.parent);
                }
                for job in chain.into_iter().rev() {
                    if self.jobs.state(job).is_some_and(|s| !s.is_terminal()) {
                        if let Err(e) = self.jobs.cancel(job) {
                            debug!(job_id = %job, error = %e, "Job already finished");
                        }
                    }
                }
                Idle
            }
            (Idle, Transition::Wake) => Listening,
            (Listening, Transition::Heard) => {
                let job = self.jobs.create("turn", self.config.turn_priority);
                if let Err(e) = self.jobs.start(job) {
                    warn!(error = %e, "Turn job did not start");
                }
                self.current_job = Some(job);
                Thinking
            }
            (Thinking, Transition::Replied) => Speaking,
            (Speaking, Transition::Finished) => {
                let parent = self.current_job.take().and_then(|job| {
                    if let Err(e) = self.jobs.complete(job) {
                        debug!(job_id = %job, error = %e, "Job already finished");
                    }
                    self.jobs.get(job).and_then(|j| j.parent)
                });
                // an interrupted reply picks up where it left off
                match parent.filter(|p| self.jobs.state(*p).is_some_and(|s| !s.is_terminal())) {
                    Some(parent) => {
                        self.current_job = Some(parent);
                        Speaking
                    }
                    None => Idle,
                }
            }
            (Speaking, Transition::Heard) => {
                let child = match self.current_job {
                    Some(parent) => self.jobs.barge_in(parent, "barge-in").ok(),
                    None => None,
                };
                let child = child.unwrap_or_else(|| {
                    self.jobs.create("barge-in", self.config.turn_priority)
                });
                if let Err(e) = self.jobs.start(child) {
                    warn!(error = %e, "Barge-in job did not start");
                }
                self.current_job = Some(child);
                barge_in = true;
                Thinking
            }
            (state, transition) => {
                debug!(state = %state, ?transition, "Transition rejected");
                return TransitionOutcome::Rejected { state, transition };
            }
        };

        self.state = to;
        if barge_in {
            info!(from = %from, to = %to, "Barge-in transition");
        } else {
            debug!(from = %from, to = %to, "Transition");
        }
        TransitionOutcome::Moved {
            from,
            to,
            job: self.current_job,
            barge_in,
        }
    }
}
