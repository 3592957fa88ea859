use super::*;
use crate::types::Route;
use serde_json::json;

fn events_result() -> ToolCallResult {
    ToolCallResult::succeeded(
        "calendar.list_events",
        json!({"query": "toplantı"}),
        json!({"events": [
            {"id": "e1", "summary": "Ekip toplantısı", "start": "2024-05-01T09:00"},
            {"id": "e2", "summary": "Müşteri toplantısı", "start": "2024-05-01T14:00"},
            {"id": "e3", "summary": "Bütçe toplantısı"}
        ]}),
        12,
    )
}

fn delete_decision() -> RouteDecision {
    RouteDecision::new(Route::Calendar, "delete_event")
        .with_confidence(0.9)
        .with_tool_plan(vec![
            "calendar.list_events".to_string(),
            "calendar.delete_event".to_string(),
        ])
}

fn open_request() -> DisambiguationRequest {
    DisambiguationDialog::default()
        .check(&delete_decision(), &[events_result()])
        .unwrap()
}

// ── Triggering ──

#[test]
fn test_single_target_intents() {
    let dialog = DisambiguationDialog::default();
    assert!(dialog.is_single_target("delete_event"));
    assert!(dialog.is_single_target("calendar.reschedule_event"));
    assert!(dialog.is_single_target("Reply"));
    assert!(!dialog.is_single_target("list_events"));
    assert!(!dialog.is_single_target(""));
}

#[test]
fn test_question_names_domain_and_count() {
    let request = open_request();
    assert_eq!(request.items.len(), 3);
    assert_eq!(request.remaining_plan, vec!["calendar.delete_event"]);
    assert!(request
        .question
        .starts_with("Takvimde 3 sonuç buldum, hangisini kastediyorsun?"));
    assert!(request
        .question
        .contains("\n1. Ekip toplantısı (2024-05-01T09:00)\n"));
    assert!(request.question.ends_with("\n3. Bütçe toplantısı"));

    let asked = DisambiguationDialog::apply(delete_decision(), &request);
    assert!(asked.ask_user);
    assert!(asked.tool_plan.is_empty());
}

#[test]
fn test_no_question_for_list_intents_or_single_item() {
    let dialog = DisambiguationDialog::default();
    let listing = RouteDecision::new(Route::Calendar, "list_events");
    assert!(dialog.check(&listing, &[events_result()]).is_none());

    let single = ToolCallResult::succeeded(
        "calendar.list_events",
        json!({}),
        json!([{"id": "e1", "title": "Tek"}]),
        3,
    );
    assert!(dialog.check(&delete_decision(), &[single]).is_none());
}

#[test]
fn test_mail_question_uses_mail_phrase() {
    let dialog = DisambiguationDialog::default();
    let decision = RouteDecision::new(Route::Gmail, "reply_message")
        .with_tool_plan(vec!["gmail.search".to_string(), "gmail.reply".to_string()]);
    let search = ToolCallResult::succeeded(
        "gmail.search",
        json!({}),
        json!({"messages": [{"id": "m1", "subject": "Fatura"}, {"id": "m2", "subject": "Fatura (2)"}]}),
        5,
    );
    let request = dialog.check(&decision, &[search]).unwrap();
    assert_eq!(
        request.question,
        "E-postalarında 2 sonuç buldum, hangisini kastediyorsun?\n1. Fatura\n2. Fatura (2)"
    );
}

// ── Lookup outcomes ──

#[test]
fn test_lookup_outcome_classifies_candidate_counts() {
    let dialog = DisambiguationDialog::default();
    let lookup = |payload| ToolCallResult::succeeded("calendar.list_events", json!({}), payload, 1);

    assert_eq!(
        dialog.lookup_outcome("delete_event", &events_result()),
        Some(LookupOutcome::Ambiguous)
    );
    match dialog.lookup_outcome("delete_event", &lookup(json!({"events": [{"id": "e9", "summary": "Tek"}]}))) {
        Some(LookupOutcome::Single(item)) => {
            assert_eq!(item.id, json!("e9"));
            assert_eq!(item.label, "Tek");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(
        dialog.lookup_outcome("delete_event", &lookup(json!({"events": []}))),
        Some(LookupOutcome::Empty)
    );
}

#[test]
fn test_lookup_outcome_ignores_unrelated_results() {
    let dialog = DisambiguationDialog::default();
    // not a list payload
    let created = ToolCallResult::succeeded("calendar.create_event", json!({}), json!({"id": "e1"}), 1);
    assert_eq!(dialog.lookup_outcome("delete_event", &created), None);
    // listing intents never need a target
    assert_eq!(dialog.lookup_outcome("list_events", &events_result()), None);
    let failed = ToolCallResult::failed("calendar.list_events", json!({}), "timeout", 1);
    assert_eq!(dialog.lookup_outcome("delete_event", &failed), None);
}

#[test]
fn test_items_need_a_label() {
    let items = DisambiguationDialog::extract_items(
        &json!({"messages": [{"id": "m1", "subject": "Fatura"}, {"id": "m2"}, "düz metin"]}),
        "gmail.search",
    );
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].index, 2);
    assert_eq!(items[1].id, json!("düz metin"));
}

// ── Resolution ──

#[test]
fn test_resolve_by_number_and_hash() {
    let dialog = DisambiguationDialog::default();
    let request = open_request();

    match dialog.resolve(&request, "2") {
        Selection::Chosen(item) => assert_eq!(item.id, json!("e2")),
        other => panic!("unexpected {other:?}"),
    }
    match dialog.resolve(&request, "#3 olanı sil") {
        Selection::Chosen(item) => assert_eq!(item.id, json!("e3")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_resolve_by_ordinal_words() {
    let dialog = DisambiguationDialog::default();
    let request = open_request();

    let cases = [
        ("ilkini", "e1"),
        ("ikincisi", "e2"),
        ("üçüncüsü olsun", "e3"),
        ("sonuncuyu sil", "e3"),
        ("the first one", "e1"),
        ("last", "e3"),
    ];
    for (text, expected) in cases {
        match dialog.resolve(&request, text) {
            Selection::Chosen(item) => assert_eq!(item.id, json!(expected), "{text}"),
            other => panic!("{text}: unexpected {other:?}"),
        }
    }
}

#[test]
fn test_resolve_suffixed_numbers() {
    let dialog = DisambiguationDialog::default();
    let request = open_request();

    let cases = [
        ("2'yi", "e2"),
        ("3.'yü sil", "e3"),
        ("1'i", "e1"),
        ("2.", "e2"),
        ("2yi lütfen", "e2"),
    ];
    for (text, expected) in cases {
        match dialog.resolve(&request, text) {
            Selection::Chosen(item) => assert_eq!(item.id, json!(expected), "{text}"),
            other => panic!("{text}: unexpected {other:?}"),
        }
    }
}

#[test]
fn test_unresolved_reasks_with_range() {
    let dialog = DisambiguationDialog::default();
    let request = open_request();

    for text in ["7", "hangisi olursa", "beşinci"] {
        match dialog.resolve(&request, text) {
            Selection::Reask(question) => {
                assert!(question.starts_with("Lütfen 1 ile 3 arasında"), "{text}");
                assert!(question.contains("Takvimde 3 sonuç buldum"));
            }
            other => panic!("{text}: unexpected {other:?}"),
        }
    }
}
