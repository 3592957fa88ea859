use super::*;

fn router() -> PreRouter {
    PreRouter::with_default_rules().unwrap()
}

#[test]
fn test_greeting_routes_to_smalltalk() {
    let pre = router();
    let m = pre.route("hey bantz nasılsın").unwrap();
    assert_eq!(m.route, Route::Smalltalk);
    assert_eq!(m.confidence, 1.0);
    assert!(m.tool_plan.is_empty());
    assert!(m.bypasses_router());

    let decision = m.into_decision();
    assert_eq!(decision.route, Route::Smalltalk);
    assert!(decision.tool_plan.is_empty());
    assert_eq!(decision.confidence, 1.0);
    assert!(decision.assistant_reply.is_some());
}

#[test]
fn test_variants_match() {
    let pre = router();
    for text in ["Merhaba", "selam!", "günaydın", "bantz, naber?", "Teşekkürler.", "hey bantz"] {
        assert!(pre.should_bypass(text), "expected bypass for {text:?}");
    }
}

#[test]
fn test_requests_do_not_match() {
    let pre = router();
    assert!(pre.route("merhaba, yarın saat 10'da toplantı ekle").is_none());
    assert!(pre.route("bu hafta maillerimi özetle").is_none());
    assert!(pre.route("   ").is_none());
}

#[test]
fn test_destructive_is_never_bypassed() {
    let pre = router();
    assert!(!pre.should_bypass("yarınki toplantıyı sil"));
    let m = pre.route("yarınki toplantıyı sil").unwrap();
    assert!(m.destructive);
    assert!(!m.bypasses_router());

    assert!(pre.route("merhaba, toplantıyı iptal et").unwrap().destructive);
}

#[test]
fn test_destructive_verb_forms() {
    let pre = router();
    for text in [
        "toplantıyı sil",
        "şu maili siler misin",
        "hepsini silsene",
        "etkinliği kaldır",
        "hatırlatıcıyı kaldırabilir misin",
        "please delete it",
    ] {
        let m = pre.route(text);
        assert!(m.is_some_and(|m| m.destructive), "expected destructive for {text:?}");
    }
}

#[test]
fn test_lookalike_words_are_not_destructive() {
    let pre = router();
    for text in [
        "silver renkli kalemi bul",
        "silence mode aç",
        "silgi almayı hatırlat",
        "kaldırımda bekliyorum",
    ] {
        assert!(
            pre.route(text).map_or(true, |m| !m.destructive),
            "unexpected destructive match for {text:?}"
        );
    }
}

#[test]
fn test_time_rule_carries_tool_plan() {
    let pre = router();
    let m = pre.route("saat kaç?").unwrap();
    assert_eq!(m.route, Route::System);
    assert_eq!(m.tool_plan, vec!["system.time".to_string()]);
    assert!(m.reply.is_none());
}

#[test]
fn test_bypass_rate_excludes_destructive() {
    let pre = router();
    pre.route("merhaba");
    pre.route("toplantıyı sil");

    let stats = pre.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.bypassed, 1);
    assert_eq!(stats.destructive, 1);
    assert_eq!(stats.bypass_rate(), 1.0);
}

#[test]
fn test_should_bypass_leaves_counters_alone() {
    let pre = router();
    assert!(pre.should_bypass("selam"));
    assert!(!pre.should_bypass("e-postaları listele"));
    assert_eq!(pre.stats(), AdmissionStats::default());
    assert_eq!(pre.stats().bypass_rate(), 0.0);
}

#[test]
fn test_invalid_rule_pattern_is_config_error() {
    let err = PreRouterRule::new("broken", "(unclosed", Route::Smalltalk).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig { .. }));
}
