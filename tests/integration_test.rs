//! Integration tests for Bantz
//!
//! These tests drive the public API across crates:
//! - bantz-llm: mock model tier
//! - bantz-tools: builtin tools and the registry
//! - bantz-core: sessions, trace log, latency gate, conversation driver

use std::sync::Arc;

use bantz_core::{
    ConversationConfig, ConversationDriver, ConversationState, JobState, LatencyBudgets,
    LatencyGate, Orchestrator, OrchestratorConfig, Route, Tier, TraceLog, Transition,
    TransitionOutcome,
};
use bantz_llm::MockProvider;
use bantz_tools::{register_builtins, ToolRegistry};

fn builtin_registry() -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);
    Arc::new(registry)
}

fn orchestrator(fast: Arc<MockProvider>) -> Orchestrator {
    Orchestrator::new(fast, None, builtin_registry(), OrchestratorConfig::default()).unwrap()
}

// ============================================================================
// Turn pipeline
// ============================================================================

#[tokio::test]
async fn test_time_question_runs_builtin_without_router() {
    let fast = Arc::new(MockProvider::new("fast-model"));
    fast.push_reply("Saati kontrol ettim, hemen söylüyorum.");
    let orchestrator = Arc::new(orchestrator(fast.clone()));

    let out = orchestrator.session().process_turn("saat kaç", "", &[]).await;

    assert_eq!(out.route, Route::System);
    assert_eq!(out.tool_plan, vec!["system.time".to_string()]);
    assert_eq!(out.tool_results.len(), 1);
    assert_eq!(out.tool_results[0].tool, "system.time");
    assert!(out.tool_results[0].success);
    assert_eq!(out.finalizer, "fast-model");
    assert_eq!(out.tier, Some(Tier::Fast));
    // only the finalizer reached the model
    assert_eq!(fast.call_count(), 1);
}

#[tokio::test]
async fn test_destructive_greeting_is_routed() {
    let fast = Arc::new(MockProvider::new("fast-model"));
    fast.push_reply(
        r#"{"route": "smalltalk", "intent": "chat", "confidence": 0.9, "tool_plan": [], "assistant_reply": "Hangi toplantıyı silmemi istersin?"}"#,
    );
    let orchestrator = Arc::new(orchestrator(fast.clone()));

    let out = orchestrator
        .session()
        .process_turn("merhaba, toplantıyı sil", "", &[])
        .await;

    assert_ne!(out.finalizer, "none(pre_router)");
    assert_eq!(fast.call_count(), 1);
    let stats = orchestrator.pre_router().stats();
    assert_eq!(stats.destructive, 1);
    assert_eq!(stats.bypassed, 0);
}

#[tokio::test]
async fn test_unknown_tool_in_plan_asks_instead_of_running() {
    let fast = Arc::new(MockProvider::new("fast-model"));
    fast.push_reply(
        r#"{"route": "calendar", "intent": "list_events", "confidence": 0.9, "tool_plan": ["calendar.list_events"]}"#,
    );
    let orchestrator = Arc::new(orchestrator(fast.clone()));

    let out = orchestrator
        .session()
        .process_turn("bugünkü toplantılarımı listele", "", &[])
        .await;

    assert!(out.tool_results.is_empty());
    assert!(out.tool_plan.is_empty());
    assert!(out.ask_user);
    assert!(out.question.is_some());
    assert_eq!(fast.call_count(), 1);
}

// ============================================================================
// Trace log and latency gate
// ============================================================================

#[tokio::test]
async fn test_trace_log_feeds_latency_gate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("traces").join("turns.jsonl");

    let fast = Arc::new(MockProvider::new("fast-model"));
    fast.push_reply("Saati kontrol ettim.");
    let log = TraceLog::open(&path).await.unwrap();
    let orchestrator = Arc::new(orchestrator(fast).with_trace_log(log));
    let session = orchestrator.session();

    session.process_turn("merhaba", "", &[]).await;
    session.process_turn("saat kaç", "", &[]).await;

    let traces = TraceLog::read_all(&path).await.unwrap();
    assert_eq!(traces.len(), 2);
    assert!(traces.iter().all(|t| t.pre_routed));
    assert_eq!(traces[1].turn_number, 2);
    assert_eq!(traces[1].tool_successes, 1);

    let report = LatencyGate::new(LatencyBudgets::default()).evaluate(&traces);
    assert_eq!(report.samples, 2);
    assert!(report.passed());
    assert!(report.violations().is_empty());
}

// ============================================================================
// Conversation driver
// ============================================================================

#[tokio::test]
async fn test_driver_owned_turn_job() {
    let fast = Arc::new(MockProvider::new("fast-model"));
    let orchestrator = Arc::new(orchestrator(fast));
    let session = orchestrator.session();
    let jobs = Arc::clone(orchestrator.jobs());
    let driver = ConversationDriver::spawn(Arc::clone(&jobs), ConversationConfig::default());

    driver.send(Transition::Wake).await.unwrap();
    let job = match driver.send(Transition::Heard).await.unwrap() {
        TransitionOutcome::Moved {
            to: ConversationState::Thinking,
            job: Some(job),
            barge_in: false,
            ..
        } => job,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(jobs.state(job), Some(JobState::Running));

    let out = session.process_turn_in_job(job, "merhaba", "", &[]).await;
    assert_eq!(out.finalizer, "none(pre_router)");
    // the session leaves the driver's job alone
    assert_eq!(jobs.state(job), Some(JobState::Running));

    driver.send(Transition::Replied).await.unwrap();
    let outcome = driver.send(Transition::Finished).await.unwrap();
    assert!(matches!(
        outcome,
        TransitionOutcome::Moved {
            to: ConversationState::Idle,
            ..
        }
    ));
    assert_eq!(jobs.state(job), Some(JobState::Completed));
    assert_eq!(driver.state().await.unwrap().0, ConversationState::Idle);
}
