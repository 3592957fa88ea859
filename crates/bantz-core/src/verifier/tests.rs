use super::*;
use serde_json::json;

fn catalog() -> Vec<String> {
    [
        "calendar.list_events",
        "calendar.create_event",
        "calendar.delete_event",
        "gmail.get_message",
        "gmail.send",
        "system.time",
    ]
    .iter()
    .map(|s| (*s).to_string())
    .collect()
}

fn plan(tools: &[&str]) -> Vec<String> {
    tools.iter().map(|s| (*s).to_string()).collect()
}

// ── Route inference ──

#[test]
fn test_infer_route_single_domain() {
    let inferred = PlanVerifier::infer_route_from_tools(&plan(&["gmail.get_message", "gmail.send"]));
    assert_eq!(inferred, Some(Route::Gmail));
}

#[test]
fn test_infer_route_ambiguous_or_empty() {
    assert_eq!(
        PlanVerifier::infer_route_from_tools(&plan(&["gmail.send", "calendar.list_events"])),
        None
    );
    assert_eq!(PlanVerifier::infer_route_from_tools(&[]), None);
    assert_eq!(PlanVerifier::infer_route_from_tools(&plan(&["weather.get"])), None);
}

// ── Corrections ──

#[test]
fn test_smalltalk_with_tools_is_corrected() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Smalltalk, "")
        .with_confidence(0.9)
        .with_tool_plan(plan(&["gmail.get_message"]));

    let (fixed, outcome) = verifier.apply(decision, "son maili oku", &catalog());
    assert!(!outcome.ok);
    assert!(outcome.codes().contains(&"smalltalk_with_tools"));
    assert_eq!(fixed.route, Route::Gmail);
    assert_eq!(fixed.tool_plan, plan(&["gmail.get_message"]));
    assert!(!fixed.ask_user);
}

#[test]
fn test_ambiguous_plan_is_hard() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Smalltalk, "")
        .with_confidence(0.9)
        .with_tool_plan(plan(&["gmail.send", "calendar.list_events"]));

    let (fixed, _) = verifier.apply(decision, "mail gönder ve takvime bak", &catalog());
    assert!(fixed.tool_plan.is_empty());
    assert!(fixed.ask_user);
    assert_eq!(fixed.question.as_deref(), Some(CLARIFICATION_QUESTION));
}

#[test]
fn test_route_mismatch_is_corrected() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Calendar, "list_events")
        .with_confidence(0.9)
        .with_tool_plan(plan(&["system.time"]));

    let (fixed, outcome) = verifier.apply(decision, "saat kaç", &catalog());
    assert!(outcome.codes().contains(&"route_tool_mismatch"));
    assert_eq!(fixed.route, Route::System);
    assert!(fixed.adjustments.iter().any(|a| a == "route: calendar -> system"));
}

#[test]
fn test_unknown_tool_is_hard() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Calendar, "list_events")
        .with_confidence(0.9)
        .with_tool_plan(plan(&["calendar.list_events", "calendar.teleport"]));

    let (fixed, outcome) = verifier.apply(decision, "takvimime bak", &catalog());
    assert_eq!(
        outcome.errors,
        vec![VerificationError::UnknownTool {
            tool: "calendar.teleport".to_string()
        }]
    );
    assert!(fixed.tool_plan.is_empty());
    assert!(fixed.ask_user);
}

// ── Slots and indicators ──

#[test]
fn test_missing_slot_asks_specific_question() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Gmail, "send")
        .with_confidence(0.9)
        .with_slot("body", json!("Toplantı ertelendi"))
        .with_tool_plan(plan(&["gmail.send"]));

    let (fixed, outcome) = verifier.apply(decision, "mail gönder", &catalog());
    assert!(!outcome.ok);
    assert!(fixed.tool_plan.is_empty());
    assert_eq!(fixed.question.as_deref(), Some("Kime göndereyim?"));
}

#[test]
fn test_lookup_step_supplies_id() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Calendar, "delete_event")
        .with_confidence(0.9)
        .with_tool_plan(plan(&["calendar.list_events", "calendar.delete_event"]));

    let (fixed, outcome) = verifier.apply(decision, "toplantıyı sil", &catalog());
    assert!(outcome.ok);
    assert_eq!(fixed.tool_plan.len(), 2);
    assert!(!fixed.ask_user);

    let alone = RouteDecision::new(Route::Calendar, "delete_event")
        .with_confidence(0.9)
        .with_tool_plan(plan(&["calendar.delete_event"]));
    let (fixed, _) = verifier.apply(alone, "toplantıyı sil", &catalog());
    assert!(fixed.tool_plan.is_empty());
    assert_eq!(fixed.question.as_deref(), Some("Hangisini kastettiğini söyler misin?"));
}

#[test]
fn test_missing_indicators_is_only_a_warning() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Gmail, "list")
        .with_confidence(0.9)
        .with_tool_plan(plan(&["gmail.get_message"]));

    let (fixed, outcome) = verifier.apply(decision, "neler oldu", &catalog());
    assert!(outcome.ok);
    assert_eq!(outcome.codes(), vec!["tool_plan_no_indicators"]);
    assert_eq!(fixed.tool_plan, plan(&["gmail.get_message"]));
    assert!(!fixed.ask_user);
}

#[test]
fn test_clean_plan_passes_untouched() {
    let verifier = PlanVerifier::default();
    let decision = RouteDecision::new(Route::Calendar, "create_event")
        .with_confidence(0.9)
        .with_slot("title", json!("Diş hekimi"))
        .with_slot("start", json!("2024-05-01T09:00"))
        .with_tool_plan(plan(&["calendar.create_event"]));

    let (fixed, outcome) = verifier.apply(decision.clone(), "yarın randevu ekle", &catalog());
    assert!(outcome.ok);
    assert!(outcome.errors.is_empty());
    assert_eq!(fixed, decision);
}
