//! Job manager with pause/resume barge-in
//!
//! Jobs are cooperative: a running job calls `checkpoint` at each
//! suspension point, which waits while the job is paused and fails once it
//! is cancelled. Barge-in pauses the running job, starts a child at boosted
//! priority, and resumes the parent when the child reaches a terminal state.
//! The resume is driven by the job event stream, not by polling.
//!
//! Finished jobs stay queryable until `max_finished` newer ones have
//! finished after them; then the oldest are dropped.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, not started
    Queued,
    /// Running
    Running,
    /// Paused by a barge-in
    Paused,
    /// Finished normally
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled
    Cancelled,
}

impl JobState {
    /// Whether the job can no longer change
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn can_move_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Queued, Running) | (Running, Paused) | (Paused, Running) => true,
            (Queued | Running | Paused, Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Snapshot of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job id
    pub id: Uuid,
    /// Job that was interrupted to start this one
    pub parent: Option<Uuid>,
    /// Description
    pub label: String,
    /// Higher runs first
    pub priority: u8,
    /// Current state
    pub state: JobState,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Job lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// A job was created
    Created {
        /// Job id
        job_id: Uuid,
        /// Parent job, for barge-in children
        parent: Option<Uuid>,
    },
    /// A job changed state
    StateChanged {
        /// Job id
        job_id: Uuid,
        /// Previous state
        from: JobState,
        /// New state
        to: JobState,
    },
}

struct JobEntry {
    job: Job,
    token: CancellationToken,
    state_tx: watch::Sender<JobState>,
}

#[derive(Default)]
struct JobTable {
    entries: HashMap<Uuid, JobEntry>,
    // terminal jobs, oldest first
    finished: VecDeque<Uuid>,
}

/// Job manager configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Priority added to a barge-in child over its parent
    pub barge_in_boost: u8,
    /// Event channel capacity
    pub event_capacity: usize,
    /// Finished jobs kept for inspection
    pub max_finished: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            barge_in_boost: 10,
            event_capacity: 256,
            max_finished: 64,
        }
    }
}

/// Tracks jobs and publishes their lifecycle
pub struct JobManager {
    jobs: Mutex<JobTable>,
    events: broadcast::Sender<JobEvent>,
    config: JobConfig,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new(JobConfig::default())
    }
}

impl JobManager {
    /// Create a manager
    #[must_use]
    pub fn new(config: JobConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            jobs: Mutex::new(JobTable::default()),
            events,
            config,
        }
    }

    /// Subscribe to job events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: JobEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Create a queued job
    pub fn create(&self, label: impl Into<String>, priority: u8) -> Uuid {
        self.create_with_parent(label.into(), priority, None)
    }

    fn create_with_parent(&self, label: String, priority: u8, parent: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        let (state_tx, _) = watch::channel(JobState::Queued);
        let job = Job {
            id,
            parent,
            label,
            priority,
            state: JobState::Queued,
            created_at: Utc::now(),
        };
        debug!(job_id = %id, label = %job.label, priority, "Job created");
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .insert(
                id,
                JobEntry {
                    job,
                    token: CancellationToken::new(),
                    state_tx,
                },
            );
        self.publish(JobEvent::Created { job_id: id, parent });
        id
    }

    /// Snapshot of a job
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .get(&id)
            .map(|entry| entry.job.clone())
    }

    /// Number of tracked jobs, finished ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner()).entries.len()
    }

    /// Whether no jobs are tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current state of a job
    #[must_use]
    pub fn state(&self, id: Uuid) -> Option<JobState> {
        self.get(id).map(|job| job.state)
    }

    /// Cancellation token of a job
    #[must_use]
    pub fn token(&self, id: Uuid) -> Option<CancellationToken> {
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .get(&id)
            .map(|entry| entry.token.clone())
    }

    fn transition(&self, id: Uuid, next: JobState) -> Result<()> {
        let from = {
            let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            let entry = jobs
                .entries
                .get_mut(&id)
                .ok_or_else(|| Error::Internal(format!("unknown job {id}")))?;
            let from = entry.job.state;
            if !from.can_move_to(next) {
                return Err(Error::Internal(format!(
                    "job {id}: invalid transition {from} -> {next}"
                )));
            }
            entry.job.state = next;
            entry.state_tx.send_replace(next);
            if next == JobState::Cancelled {
                entry.token.cancel();
            }
            if next.is_terminal() {
                jobs.finished.push_back(id);
                while jobs.finished.len() > self.config.max_finished {
                    if let Some(oldest) = jobs.finished.pop_front() {
                        jobs.entries.remove(&oldest);
                        debug!(job_id = %oldest, "Finished job evicted");
                    }
                }
            }
            from
        };
        debug!(job_id = %id, from = %from, to = %next, "Job state changed");
        self.publish(JobEvent::StateChanged {
            job_id: id,
            from,
            to: next,
        });
        Ok(())
    }

    /// Start a queued job
    pub fn start(&self, id: Uuid) -> Result<()> {
        self.transition(id, JobState::Running)
    }

    /// Pause a running job
    pub fn pause(&self, id: Uuid) -> Result<()> {
        self.transition(id, JobState::Paused)
    }

    /// Resume a paused job
    pub fn resume(&self, id: Uuid) -> Result<()> {
        self.transition(id, JobState::Running)
    }

    /// Mark a job completed
    pub fn complete(&self, id: Uuid) -> Result<()> {
        self.transition(id, JobState::Completed)
    }

    /// Mark a job failed
    pub fn fail(&self, id: Uuid) -> Result<()> {
        self.transition(id, JobState::Failed)
    }

    /// Cancel a job and trip its token
    pub fn cancel(&self, id: Uuid) -> Result<()> {
        self.transition(id, JobState::Cancelled)
    }

    /// Suspension point for a running job
    ///
    /// Waits while the job is paused; errors once it is cancelled or gone.
    pub async fn checkpoint(&self, id: Uuid) -> Result<()> {
        let (mut state_rx, token) = {
            let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
            let entry = jobs
                .entries
                .get(&id)
                .ok_or_else(|| Error::Internal(format!("unknown job {id}")))?;
            (entry.state_tx.subscribe(), entry.token.clone())
        };

        loop {
            let state = *state_rx.borrow_and_update();
            match state {
                JobState::Paused => {}
                JobState::Cancelled => return Err(Error::Cancelled { job_id: id }),
                _ => return Ok(()),
            }
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return Err(Error::Internal(format!("job {id} dropped")));
                    }
                }
                () = token.cancelled() => {
                    return Err(Error::Cancelled { job_id: id });
                }
            }
        }
    }

    /// Interrupt `parent` with a new child job
    ///
    /// The parent is paused and the child created at boosted priority. A
    /// watcher resumes the parent once the child is completed, failed or
    /// cancelled.
    pub fn barge_in(self: &Arc<Self>, parent: Uuid, label: impl Into<String>) -> Result<Uuid> {
        let parent_priority = self
            .get(parent)
            .ok_or_else(|| Error::Internal(format!("unknown job {parent}")))?
            .priority;

        // subscribe before the child exists so its terminal event cannot be missed
        let mut events = self.subscribe();
        self.pause(parent)?;
        let priority = parent_priority.saturating_add(self.config.barge_in_boost);
        let child = self.create_with_parent(label.into(), priority, Some(parent));
        info!(parent = %parent, child = %child, priority, "Barge-in");

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(JobEvent::StateChanged { job_id, to, .. })
                        if job_id == child && to.is_terminal() =>
                    {
                        if manager.state(parent) == Some(JobState::Paused) {
                            if let Err(e) = manager.resume(parent) {
                                warn!(parent = %parent, error = %e, "Parent resume failed");
                            } else {
                                debug!(parent = %parent, child = %child, "Parent resumed");
                            }
                        }
                        break;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Job watcher lagged");
                        // an evicted child has finished
                        if manager.state(child).map_or(true, |s| s.is_terminal()) {
                            if manager.state(parent) == Some(JobState::Paused) {
                                let _ = manager.resume(parent);
                            }
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(child)
    }
}
