use super::*;
use std::sync::Arc;
use std::time::Duration;

async fn wait_for_state(jobs: &JobManager, id: uuid::Uuid, want: JobState) {
    for _ in 0..200 {
        if jobs.state(id) == Some(want) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {id} never reached {want}, is {:?}", jobs.state(id));
}

// ── Jobs ──

#[test]
fn test_job_lifecycle() {
    let jobs = JobManager::default();
    let id = jobs.create("turn", 5);
    assert_eq!(jobs.state(id), Some(JobState::Queued));

    jobs.start(id).unwrap();
    jobs.pause(id).unwrap();
    jobs.resume(id).unwrap();
    jobs.complete(id).unwrap();
    assert_eq!(jobs.state(id), Some(JobState::Completed));
}

#[test]
fn test_terminal_job_rejects_transitions() {
    let jobs = JobManager::default();
    let id = jobs.create("turn", 5);
    jobs.start(id).unwrap();
    jobs.fail(id).unwrap();

    assert!(jobs.resume(id).is_err());
    assert!(jobs.cancel(id).is_err());
    assert!(jobs.pause(uuid::Uuid::new_v4()).is_err());
}

#[test]
fn test_cancel_trips_token() {
    let jobs = JobManager::default();
    let id = jobs.create("turn", 5);
    let token = jobs.token(id).unwrap();
    assert!(!token.is_cancelled());

    jobs.cancel(id).unwrap();
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_events_are_published() {
    let jobs = JobManager::default();
    let mut rx = jobs.subscribe();
    let id = jobs.create("turn", 5);
    jobs.start(id).unwrap();

    assert_eq!(
        rx.recv().await.unwrap(),
        JobEvent::Created {
            job_id: id,
            parent: None
        }
    );
    assert_eq!(
        rx.recv().await.unwrap(),
        JobEvent::StateChanged {
            job_id: id,
            from: JobState::Queued,
            to: JobState::Running
        }
    );
}

#[tokio::test]
async fn test_checkpoint_waits_while_paused() {
    let jobs = Arc::new(JobManager::default());
    let id = jobs.create("turn", 5);
    jobs.start(id).unwrap();
    jobs.pause(id).unwrap();

    let waiter = {
        let jobs = Arc::clone(&jobs);
        tokio::spawn(async move { jobs.checkpoint(id).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    jobs.resume(id).unwrap();
    assert!(waiter.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_checkpoint_fails_on_cancel() {
    let jobs = Arc::new(JobManager::default());
    let id = jobs.create("turn", 5);
    jobs.start(id).unwrap();
    jobs.pause(id).unwrap();

    let waiter = {
        let jobs = Arc::clone(&jobs);
        tokio::spawn(async move { jobs.checkpoint(id).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    jobs.cancel(id).unwrap();
    let err = waiter.await.unwrap().unwrap_err();
    assert!(matches!(err, crate::error::Error::Cancelled { job_id } if job_id == id));
}

#[tokio::test]
async fn test_checkpoint_on_cancelled_job_reports_cancelled() {
    let jobs = JobManager::default();
    let id = jobs.create("turn", 5);
    jobs.cancel(id).unwrap();
    assert!(matches!(
        jobs.checkpoint(id).await,
        Err(crate::error::Error::Cancelled { .. })
    ));
}

#[tokio::test]
async fn test_barge_in_pauses_and_resumes_parent() {
    let jobs = Arc::new(JobManager::default());
    let parent = jobs.create("turn", 5);
    jobs.start(parent).unwrap();

    let child = jobs.barge_in(parent, "barge-in").unwrap();
    assert_eq!(jobs.state(parent), Some(JobState::Paused));
    let child_job = jobs.get(child).unwrap();
    assert_eq!(child_job.parent, Some(parent));
    assert_eq!(child_job.priority, 15);

    jobs.start(child).unwrap();
    jobs.complete(child).unwrap();
    wait_for_state(&jobs, parent, JobState::Running).await;
}

#[tokio::test]
async fn test_barge_in_resumes_parent_after_child_failure() {
    let jobs = Arc::new(JobManager::default());
    let parent = jobs.create("turn", 5);
    jobs.start(parent).unwrap();

    let child = jobs.barge_in(parent, "barge-in").unwrap();
    jobs.cancel(child).unwrap();
    wait_for_state(&jobs, parent, JobState::Running).await;
}

#[tokio::test]
async fn test_barge_in_priority_saturates() {
    let jobs = Arc::new(JobManager::default());
    let parent = jobs.create("turn", 250);
    jobs.start(parent).unwrap();
    let child = jobs.barge_in(parent, "barge-in").unwrap();
    assert_eq!(jobs.get(child).unwrap().priority, u8::MAX);
}

#[test]
fn test_finished_jobs_are_evicted_oldest_first() {
    let jobs = JobManager::new(JobConfig {
        max_finished: 4,
        ..JobConfig::default()
    });
    let running = jobs.create("long", 5);
    jobs.start(running).unwrap();

    let finished: Vec<_> = (0..10)
        .map(|i| {
            let id = jobs.create(format!("turn {i}"), 5);
            jobs.start(id).unwrap();
            jobs.complete(id).unwrap();
            id
        })
        .collect();

    assert_eq!(jobs.len(), 5);
    assert_eq!(jobs.state(running), Some(JobState::Running));
    assert!(jobs.get(finished[0]).is_none());
    assert!(jobs.get(finished[5]).is_none());
    assert_eq!(jobs.state(finished[6]), Some(JobState::Completed));
    assert_eq!(jobs.state(finished[9]), Some(JobState::Completed));
}

#[tokio::test]
async fn test_barge_in_resumes_parent_when_child_was_evicted() {
    let jobs = Arc::new(JobManager::new(JobConfig {
        max_finished: 0,
        ..JobConfig::default()
    }));
    let parent = jobs.create("turn", 5);
    jobs.start(parent).unwrap();

    let child = jobs.barge_in(parent, "barge-in").unwrap();
    jobs.start(child).unwrap();
    jobs.complete(child).unwrap();
    assert!(jobs.get(child).is_none());
    wait_for_state(&jobs, parent, JobState::Running).await;
}

// ── State machine ──

fn driver() -> (Arc<JobManager>, ConversationHandle) {
    let jobs = Arc::new(JobManager::default());
    let handle = ConversationDriver::spawn(Arc::clone(&jobs), ConversationConfig::default());
    (jobs, handle)
}

#[tokio::test]
async fn test_full_cycle() {
    let (jobs, handle) = driver();
    assert_eq!(handle.state().await.unwrap(), (ConversationState::Idle, None));

    handle.send(Transition::Wake).await.unwrap();
    let outcome = handle.send(Transition::Heard).await.unwrap();
    let TransitionOutcome::Moved { to, job, .. } = outcome else {
        panic!("expected a move, got {outcome:?}");
    };
    assert_eq!(to, ConversationState::Thinking);
    let job = job.unwrap();
    assert_eq!(jobs.state(job), Some(JobState::Running));

    handle.send(Transition::Replied).await.unwrap();
    let outcome = handle.send(Transition::Finished).await.unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Moved {
            to: ConversationState::Idle,
            job: None,
            ..
        }
    ));
    assert_eq!(jobs.state(job), Some(JobState::Completed));
}

#[tokio::test]
async fn test_invalid_transition_rejected() {
    let (_jobs, handle) = driver();

    let outcome = handle.send(Transition::Replied).await.unwrap();
    assert_eq!(
        outcome,
        TransitionOutcome::Rejected {
            state: ConversationState::Idle,
            transition: Transition::Replied
        }
    );
    assert_eq!(handle.state().await.unwrap().0, ConversationState::Idle);
}

#[tokio::test]
async fn test_barge_in_while_speaking() {
    let (jobs, handle) = driver();
    handle.send(Transition::Wake).await.unwrap();
    handle.send(Transition::Heard).await.unwrap();
    handle.send(Transition::Replied).await.unwrap();
    let (_, parent) = handle.state().await.unwrap();
    let parent = parent.unwrap();

    let outcome = handle.send(Transition::Heard).await.unwrap();
    let TransitionOutcome::Moved {
        to, job, barge_in, ..
    } = outcome
    else {
        panic!("expected a move, got {outcome:?}");
    };
    assert!(barge_in);
    assert_eq!(to, ConversationState::Thinking);
    let child = job.unwrap();
    assert_ne!(child, parent);
    assert_eq!(jobs.state(parent), Some(JobState::Paused));
    assert_eq!(jobs.state(child), Some(JobState::Running));

    handle.send(Transition::Replied).await.unwrap();
    let outcome = handle.send(Transition::Finished).await.unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Moved {
            to: ConversationState::Speaking,
            job: Some(j),
            ..
        } if j == parent
    ));
    wait_for_state(&jobs, parent, JobState::Running).await;

    handle.send(Transition::Finished).await.unwrap();
    assert_eq!(handle.state().await.unwrap(), (ConversationState::Idle, None));
    assert_eq!(jobs.state(parent), Some(JobState::Completed));
}

#[tokio::test]
async fn test_reset_cancels_job_chain() {
    let (jobs, handle) = driver();
    handle.send(Transition::Wake).await.unwrap();
    handle.send(Transition::Heard).await.unwrap();
    handle.send(Transition::Replied).await.unwrap();
    let parent = handle.state().await.unwrap().1.unwrap();
    handle.send(Transition::Heard).await.unwrap();
    let child = handle.state().await.unwrap().1.unwrap();

    handle.send(Transition::Reset).await.unwrap();
    assert_eq!(handle.state().await.unwrap(), (ConversationState::Idle, None));
    assert_eq!(jobs.state(child), Some(JobState::Cancelled));
    assert_eq!(jobs.state(parent), Some(JobState::Cancelled));
}
