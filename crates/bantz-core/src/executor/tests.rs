use super::*;
use crate::types::Route;
use crate::utils::CircuitBreakerConfig;
use bantz_tools::{Tool, ToolDefinition, ToolRegistry, ToolResult};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

struct ScriptedTool {
    definition: ToolDefinition,
    calls: Arc<AtomicUsize>,
    failures: Mutex<Vec<bantz_tools::Error>>,
    output: Value,
}

#[async_trait::async_trait]
impl Tool for ScriptedTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, _input: Value) -> bantz_tools::Result<ToolResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop() {
            return Err(error);
        }
        Ok(ToolResult::success(self.output.clone(), 1))
    }
}

struct Fixture {
    executor: ToolExecutor,
    calls: Vec<(String, Arc<AtomicUsize>)>,
}

impl Fixture {
    fn calls(&self, tool: &str) -> usize {
        self.calls
            .iter()
            .find(|(name, _)| name == tool)
            .map(|(_, c)| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

fn fixture(failing: Vec<bantz_tools::Error>) -> Fixture {
    let specs = vec![
        (
            ToolDefinition::new("calendar.list_events", "List events"),
            json!({"events": [{"id": "e1", "summary": "Standup"}]}),
        ),
        (
            ToolDefinition::new("calendar.delete_event", "Delete event")
                .with_risk_level(RiskLevel::High),
            json!({"deleted": true}),
        ),
        (
            ToolDefinition::new("gmail.send", "Send mail")
                .with_risk_level(RiskLevel::Medium)
                .with_confirmation(true),
            json!({"sent": true}),
        ),
        (
            ToolDefinition::new("calendar.create_event", "Create event")
                .with_risk_level(RiskLevel::Medium),
            json!({"id": "e9", "created": true}),
        ),
        (
            ToolDefinition::new("auth.refresh_token", "Refresh credentials")
                .with_risk_level(RiskLevel::Medium)
                .with_idempotent(true),
            json!({"refreshed": true}),
        ),
    ];

    let mut registry = ToolRegistry::new();
    let mut calls = Vec::new();
    let mut failing = Some(failing);
    for (definition, output) in specs {
        let counter = Arc::new(AtomicUsize::new(0));
        calls.push((definition.name.clone(), counter.clone()));
        let failures = if definition.name == "auth.refresh_token" {
            failing.take().unwrap_or_default()
        } else {
            Vec::new()
        };
        registry.register(Arc::new(ScriptedTool {
            definition,
            calls: counter,
            failures: Mutex::new(failures),
            output,
        }));
    }

    let runner = ToolRunner::with_defaults(Arc::new(registry));
    let breakers = Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig::default()));
    let executor = ToolExecutor::new(
        runner,
        breakers,
        ArgumentSanitizer::default(),
        ExecutorConfig::default(),
    );
    Fixture { executor, calls }
}

fn decision(route: Route, tools: &[&str]) -> RouteDecision {
    RouteDecision::new(route, "test")
        .with_confidence(0.9)
        .with_tool_plan(tools.iter().map(|s| (*s).to_string()).collect())
}

// ── Action key ──

#[test]
fn test_action_key_is_order_independent() {
    let a = json!({"id": "e1", "opts": {"notify": true, "scope": ["a", {"x": 1, "y": 2}]}});
    let b = json!({"opts": {"scope": ["a", {"y": 2, "x": 1}], "notify": true}, "id": "e1"});
    assert_eq!(
        make_action_key("calendar.delete_event", &a),
        make_action_key("calendar.delete_event", &b)
    );
    assert_ne!(
        make_action_key("calendar.delete_event", &a),
        make_action_key("calendar.update_event", &a)
    );
    assert_eq!(make_action_key("x", &Value::Null).len(), 64);
}

#[test]
fn test_canonical_json_sorts_keys() {
    assert_eq!(canonical_json(&json!({"b": 1, "a": [true, null]})), r#"{"a":[true,null],"b":1}"#);
}

// ── Confirmation firewall ──

#[test]
fn test_confirmation_answers() {
    assert_eq!(ConfirmationAnswer::parse("Evet, sil"), ConfirmationAnswer::Confirm);
    assert_eq!(ConfirmationAnswer::parse("onaylıyorum"), ConfirmationAnswer::Confirm);
    assert_eq!(ConfirmationAnswer::parse("hayır yapma"), ConfirmationAnswer::Deny);
    assert_eq!(ConfirmationAnswer::parse("tamam da iptal et"), ConfirmationAnswer::Deny);
    assert_eq!(ConfirmationAnswer::parse("yarın ne var"), ConfirmationAnswer::Unclear);
}

#[tokio::test]
async fn test_destructive_call_is_held() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let plan = decision(Route::Calendar, &["calendar.delete_event"]).with_slot("id", json!("e1"));

    let results = fx.executor.execute_plan("t1", &plan, &mut state, |_| NextStep::Continue).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].pending_confirmation);
    assert_eq!(fx.calls("calendar.delete_event"), 0);

    let pending = state.firewall.pending().unwrap();
    assert_eq!(pending.tool, "calendar.delete_event");
    assert_eq!(pending.risk_level, RiskLevel::High);
    assert_eq!(pending.action_key, make_action_key("calendar.delete_event", &json!({"id": "e1"})));
}

#[tokio::test]
async fn test_pending_confirmation_blocks_whole_plan() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let first = decision(Route::Calendar, &["calendar.delete_event"]).with_slot("id", json!("e1"));
    fx.executor.execute_plan("t1", &first, &mut state, |_| NextStep::Continue).await;

    let long_plan = decision(
        Route::Calendar,
        &["calendar.list_events", "calendar.list_events", "calendar.list_events"],
    );
    let results = fx.executor.execute_plan("t2", &long_plan, &mut state, |_| NextStep::Continue).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].pending_confirmation);
    assert_eq!(results[0].tool, "calendar.delete_event");
    assert_eq!(fx.calls("calendar.list_events"), 0);
}

#[tokio::test]
async fn test_confirmed_call_runs_once() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let params = json!({"id": "e1"});
    fx.executor
        .execute_call("t1", "calendar.delete_event", &params, None, &mut state)
        .await;

    let request = state.firewall.confirm().unwrap();
    let result = fx
        .executor
        .execute_call("t2", &request.tool, &request.params, None, &mut state)
        .await;
    assert!(result.success);
    assert_eq!(fx.calls("calendar.delete_event"), 1);

    // the confirmation was consumed
    let again = fx
        .executor
        .execute_call("t3", "calendar.delete_event", &params, None, &mut state)
        .await;
    assert!(again.pending_confirmation);
    assert_eq!(fx.calls("calendar.delete_event"), 1);
}

#[tokio::test]
async fn test_router_prompt_is_used_for_confirmation() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let plan = decision(Route::Gmail, &["gmail.send"])
        .with_slot("to", json!("ali@example.com"))
        .with_slot("body", json!("Selam"))
        .with_confirmation("Ali'ye mail gönderilsin mi?");

    let results = fx.executor.execute_plan("t1", &plan, &mut state, |_| NextStep::Continue).await;
    assert_eq!(results[0].result["confirmation_prompt"], "Ali'ye mail gönderilsin mi?");
}

// ── Sanitizer gate ──

#[tokio::test]
async fn test_blocking_sanitizer_issue_rejects_call() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let params = json!({"to": "ali@example.com; DROP TABLE users", "body": "Selam"});

    let result = fx
        .executor
        .execute_call("t1", "gmail.send", &params, None, &mut state)
        .await;
    assert!(!result.success);
    assert!(!result.pending_confirmation);
    assert!(result.error.unwrap().contains("safety violation"));
    assert!(!state.firewall.is_pending());
}

// ── Circuit breaker ──

#[tokio::test]
async fn test_open_circuit_skips_call() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    for _ in 0..3 {
        fx.executor.breakers().record_failure("calendar");
    }

    let plan = decision(Route::Calendar, &["calendar.list_events"]);
    let results = fx.executor.execute_plan("t1", &plan, &mut state, |_| NextStep::Continue).await;
    assert!(!results[0].success);
    assert_eq!(results[0].result["backend_unavailable"], "calendar");
    assert_eq!(fx.calls("calendar.list_events"), 0);
}

// ── Retry and cache ──

#[tokio::test(start_paused = true)]
async fn test_idempotent_tool_is_retried() {
    let fx = fixture(vec![
        bantz_tools::Error::Network("reset".into()),
        bantz_tools::Error::Network("reset".into()),
    ]);
    let mut state = ExecutionState::default();

    let result = fx
        .executor
        .execute_call("t1", "auth.refresh_token", &json!({}), None, &mut state)
        .await;
    assert!(result.success);
    assert_eq!(fx.calls("auth.refresh_token"), 3);
    assert_eq!(fx.executor.breakers().failure_count("auth"), 0);
}

#[tokio::test]
async fn test_low_risk_results_are_cached() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();

    let first = fx
        .executor
        .execute_call("t1", "calendar.list_events", &json!({"day": "2024-05-01", "page_token": "a"}), None, &mut state)
        .await;
    let second = fx
        .executor
        .execute_call("t2", "calendar.list_events", &json!({"page_token": "b", "day": "2024-05-01"}), None, &mut state)
        .await;

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.result, first.result);
    assert_eq!(fx.calls("calendar.list_events"), 1);
}

#[test]
fn test_cache_entries_expire() {
    let mut cache = ResultCache::new(Duration::from_secs(10));
    cache.insert("calendar.list_events", &json!({}), json!([1]));
    let later = Instant::now() + Duration::from_secs(11);
    assert!(cache.get_at("calendar.list_events", &json!({}), later).is_none());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_should_continue_stops_plan() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let plan = decision(Route::Calendar, &["calendar.list_events", "calendar.delete_event"]);

    let results = fx.executor.execute_plan("t1", &plan, &mut state, |_| NextStep::Stop).await;
    assert_eq!(results.len(), 1);
    assert!(!state.firewall.is_pending());
}

#[tokio::test]
async fn test_fill_step_feeds_later_calls() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let plan = decision(Route::Calendar, &["calendar.list_events", "calendar.delete_event"]);

    let results = fx
        .executor
        .execute_plan("t1", &plan, &mut state, |result| {
            if result.tool == "calendar.list_events" {
                NextStep::Fill {
                    slot: "id".to_string(),
                    value: result.result["events"][0]["id"].clone(),
                }
            } else {
                NextStep::Continue
            }
        })
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[1].params["id"], "e1");
    let pending = state.firewall.pending().unwrap();
    assert_eq!(pending.params, json!({"id": "e1"}));
    assert_eq!(pending.action_key, make_action_key("calendar.delete_event", &json!({"id": "e1"})));
}

#[tokio::test]
async fn test_repeated_create_runs_once() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let params = json!({"title": "Toplantı", "start": "2024-05-01T10:00", "end": "2024-05-01T11:00"});

    let first = fx
        .executor
        .execute_call("t1", "calendar.create_event", &params, None, &mut state)
        .await;
    let second = fx
        .executor
        .execute_call("t2", "calendar.create_event", &params, None, &mut state)
        .await;

    assert!(first.success && second.success);
    assert!(!second.cached);
    assert_eq!(second.result["deduplicated"], true);
    assert_eq!(fx.calls("calendar.create_event"), 1);
}

#[tokio::test]
async fn test_unknown_tool_is_failed_result() {
    let fx = fixture(Vec::new());
    let mut state = ExecutionState::default();
    let result = fx
        .executor
        .execute_call("t1", "calendar.teleport", &json!({}), None, &mut state)
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("calendar.teleport"));
}
