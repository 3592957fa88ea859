//! Pipeline value types
//!
//! `RouteDecision` is created once per turn (by the pre-router, the intent
//! router, or as a fallback) and every later stage derives a new value from
//! it through `with_*` methods. Each derived value records what changed in
//! `adjustments`, so the trace shows which stage rewrote the plan.

use crate::finalize::Tier;
use bantz_tools::RiskLevel;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level route of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Chit-chat, answered without tools
    Smalltalk,
    /// Calendar operations
    Calendar,
    /// Mail operations
    Gmail,
    /// Local system queries
    System,
    /// Browser control
    Browser,
    /// Music playback
    Music,
    /// Not understood
    #[serde(other)]
    Unknown,
}

impl Route {
    /// Every concrete route, in display order
    pub const ALL: [Route; 7] = [
        Route::Smalltalk,
        Route::Calendar,
        Route::Gmail,
        Route::System,
        Route::Browser,
        Route::Music,
        Route::Unknown,
    ];

    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smalltalk => "smalltalk",
            Self::Calendar => "calendar",
            Self::Gmail => "gmail",
            Self::System => "system",
            Self::Browser => "browser",
            Self::Music => "music",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a route name; anything unrecognised is `Unknown`
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "smalltalk" => Self::Smalltalk,
            "calendar" => Self::Calendar,
            "gmail" => Self::Gmail,
            "system" => Self::System,
            "browser" => Self::Browser,
            "music" => Self::Music,
            _ => Self::Unknown,
        }
    }

    /// Route owning a tool domain (`gmail` for `gmail.send`)
    #[must_use]
    pub fn from_domain(domain: &str) -> Option<Self> {
        match Self::parse(domain) {
            Self::Unknown | Self::Smalltalk => None,
            route => Some(route),
        }
    }

    /// Whether replies on this route must be grounded in tool output
    #[must_use]
    pub fn requires_grounding(&self) -> bool {
        matches!(self, Self::Calendar | Self::Gmail)
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured routing decision for one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Route
    pub route: Route,
    /// Per-domain sub-intent (`list_events`, `delete_event`, ...)
    pub intent: String,
    /// Extracted slots
    pub slots: BTreeMap<String, Value>,
    /// Router confidence in `0.0..=1.0`
    pub confidence: f32,
    /// Ordered tool names to execute
    pub tool_plan: Vec<String>,
    /// Direct reply (smalltalk or canned pre-router answers)
    pub assistant_reply: Option<String>,
    /// Whether the turn ends with a question to the user
    pub ask_user: bool,
    /// The question to ask when `ask_user` is set
    pub question: Option<String>,
    /// Whether the router flagged the plan as needing confirmation
    pub requires_confirmation: bool,
    /// Router-proposed confirmation wording
    pub confirmation_prompt: Option<String>,
    /// Whether this is the router's fallback decision
    pub fallback: bool,
    /// What each stage changed, in order
    #[serde(default)]
    pub adjustments: Vec<String>,
}

impl RouteDecision {
    /// Create a decision for a route and intent
    #[must_use]
    pub fn new(route: Route, intent: impl Into<String>) -> Self {
        Self {
            route,
            intent: intent.into(),
            slots: BTreeMap::new(),
            confidence: 0.0,
            tool_plan: Vec::new(),
            assistant_reply: None,
            ask_user: false,
            question: None,
            requires_confirmation: false,
            confirmation_prompt: None,
            fallback: false,
            adjustments: Vec::new(),
        }
    }

    /// The decision used when routing is impossible
    #[must_use]
    pub fn fallback(question: impl Into<String>) -> Self {
        Self {
            ask_user: true,
            question: Some(question.into()),
            fallback: true,
            ..Self::new(Route::Unknown, "")
        }
    }

    /// Set confidence
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Change the route
    #[must_use]
    pub fn with_route(mut self, route: Route) -> Self {
        if route != self.route {
            self.adjustments
                .push(format!("route: {} -> {}", self.route, route));
            self.route = route;
        }
        self
    }

    /// Replace the tool plan
    #[must_use]
    pub fn with_tool_plan(mut self, plan: Vec<String>) -> Self {
        if plan != self.tool_plan {
            self.adjustments
                .push(format!("tool_plan: {:?} -> {:?}", self.tool_plan, plan));
            self.tool_plan = plan;
        }
        self
    }

    /// Clear the tool plan, recording why
    #[must_use]
    pub fn without_plan(mut self, reason: &str) -> Self {
        if !self.tool_plan.is_empty() {
            self.adjustments.push(format!("tool_plan cleared: {reason}"));
            self.tool_plan.clear();
        }
        self
    }

    /// End the turn with a question to the user
    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        let question = question.into();
        self.adjustments.push(format!("ask_user: {question}"));
        self.ask_user = true;
        self.question = Some(question);
        self
    }

    /// Set or replace one slot
    #[must_use]
    pub fn with_slot(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        self.adjustments.push(format!("slot: {key}"));
        self.slots.insert(key, value);
        self
    }

    /// Replace every slot
    #[must_use]
    pub fn with_slots(mut self, slots: BTreeMap<String, Value>) -> Self {
        self.slots = slots;
        self
    }

    /// Attach a direct reply
    #[must_use]
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.assistant_reply = Some(reply.into());
        self
    }

    /// Flag the plan as needing confirmation
    #[must_use]
    pub fn with_confirmation(mut self, prompt: impl Into<String>) -> Self {
        self.requires_confirmation = true;
        self.confirmation_prompt = Some(prompt.into());
        self
    }

    /// Record a free-form note
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.adjustments.push(note.into());
        self
    }

    /// Slot value as a trimmed, non-empty string
    #[must_use]
    pub fn slot_str(&self, key: &str) -> Option<&str> {
        self.slots
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether a slot is present and non-empty
    #[must_use]
    pub fn has_slot(&self, key: &str) -> bool {
        match self.slots.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        }
    }

    /// Slots as a JSON object, used as tool parameters
    #[must_use]
    pub fn params(&self) -> Value {
        Value::Object(self.slots.clone().into_iter().collect())
    }
}

/// Immutable per-turn input
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    /// Turn correlation id
    pub turn_id: String,
    /// 1-based turn number within the session
    pub turn_number: u64,
    /// Raw user text
    pub user_input: String,
    /// Rolling dialog summary
    pub dialog_summary: String,
    /// Retrieved long-term-memory snippets
    pub retrieved_memory: Vec<String>,
    /// Results of the previous turn's tool calls
    pub prior_results: Vec<ToolCallResult>,
}

impl TurnInput {
    /// Create an input for a fresh turn
    #[must_use]
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            turn_number: 1,
            user_input: user_input.into(),
            ..Default::default()
        }
    }

    /// Set the dialog summary
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.dialog_summary = summary.into();
        self
    }

    /// Set the retrieved memory snippets
    #[must_use]
    pub fn with_memory(mut self, memory: Vec<String>) -> Self {
        self.retrieved_memory = memory;
        self
    }

    /// Set the turn number
    #[must_use]
    pub fn with_turn_number(mut self, turn_number: u64) -> Self {
        self.turn_number = turn_number;
        self
    }

    /// Attach the previous turn's results
    #[must_use]
    pub fn with_prior_results(mut self, results: Vec<ToolCallResult>) -> Self {
        self.prior_results = results;
        self
    }
}

/// Outcome of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// Tool name
    pub tool: String,
    /// Parameters the tool was called with
    pub params: Value,
    /// Whether the call succeeded
    pub success: bool,
    /// Result payload (null on failure)
    pub result: Value,
    /// Error description on failure
    pub error: Option<String>,
    /// Elapsed milliseconds
    pub elapsed_ms: u64,
    /// Whether the call is held for confirmation instead of executed
    pub pending_confirmation: bool,
    /// Whether the payload came from the session cache
    #[serde(default)]
    pub cached: bool,
}

impl ToolCallResult {
    /// A successful call
    #[must_use]
    pub fn succeeded(tool: impl Into<String>, params: Value, result: Value, elapsed_ms: u64) -> Self {
        Self {
            tool: tool.into(),
            params,
            success: true,
            result,
            error: None,
            elapsed_ms,
            pending_confirmation: false,
            cached: false,
        }
    }

    /// A failed call
    #[must_use]
    pub fn failed(
        tool: impl Into<String>,
        params: Value,
        error: impl Into<String>,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            tool: tool.into(),
            params,
            success: false,
            result: Value::Null,
            error: Some(error.into()),
            elapsed_ms,
            pending_confirmation: false,
            cached: false,
        }
    }

    /// A call held at the confirmation firewall
    #[must_use]
    pub fn blocked(tool: impl Into<String>, params: Value, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        Self {
            tool: tool.into(),
            params,
            success: false,
            result: serde_json::json!({ "confirmation_prompt": prompt }),
            error: Some("pending_confirmation".to_string()),
            elapsed_ms: 0,
            pending_confirmation: true,
            cached: false,
        }
    }
}

/// A destructive call waiting for the user's yes/no
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    /// Target tool
    pub tool: String,
    /// Tool risk level
    pub risk_level: RiskLevel,
    /// Rendered question
    pub prompt: String,
    /// Resolved parameters
    pub params: Value,
    /// Stable identity of (tool, params)
    pub action_key: String,
}

/// Final, flat result of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorOutput {
    /// Turn correlation id
    pub turn_id: String,
    /// Route
    pub route: Route,
    /// Sub-intent
    pub intent: String,
    /// Slots
    pub slots: BTreeMap<String, Value>,
    /// Router confidence
    pub confidence: f32,
    /// Plan after verification
    pub tool_plan: Vec<String>,
    /// Reply text
    pub assistant_reply: String,
    /// Whether the reply is a question awaiting the user
    pub ask_user: bool,
    /// The question, when `ask_user` is set
    pub question: Option<String>,
    /// Whether a confirmation is pending
    pub requires_confirmation: bool,
    /// The pending confirmation prompt
    pub confirmation_prompt: Option<String>,
    /// Model that produced the reply, or `none(reason)`
    pub finalizer: String,
    /// Tier of that model
    #[serde(default)]
    pub tier: Option<Tier>,
    /// Why that tier was chosen
    pub tier_reason: Option<String>,
    /// Tool calls made this turn
    pub tool_results: Vec<ToolCallResult>,
    /// Whether the router fell back
    pub fallback: bool,
    /// Stage adjustments applied to the decision
    pub adjustments: Vec<String>,
}

impl OrchestratorOutput {
    /// Build the output from the last decision of a turn
    #[must_use]
    pub fn from_decision(
        turn_id: impl Into<String>,
        decision: RouteDecision,
        reply: impl Into<String>,
        finalizer: impl Into<String>,
    ) -> Self {
        Self {
            turn_id: turn_id.into(),
            route: decision.route,
            intent: decision.intent,
            slots: decision.slots,
            confidence: decision.confidence,
            tool_plan: decision.tool_plan,
            assistant_reply: reply.into(),
            ask_user: decision.ask_user,
            question: decision.question,
            requires_confirmation: decision.requires_confirmation,
            confirmation_prompt: decision.confirmation_prompt,
            finalizer: finalizer.into(),
            tier: None,
            tier_reason: None,
            tool_results: Vec::new(),
            fallback: decision.fallback,
            adjustments: decision.adjustments,
        }
    }

    /// Attach the tool results
    #[must_use]
    pub fn with_tool_results(mut self, results: Vec<ToolCallResult>) -> Self {
        self.tool_results = results;
        self
    }

    /// Attach the tier and why it was chosen
    #[must_use]
    pub fn with_tier(mut self, tier: Option<Tier>, reason: Option<String>) -> Self {
        self.tier = tier;
        self.tier_reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_serde_unknown_catch_all() {
        let route: Route = serde_json::from_str("\"gmail\"").unwrap();
        assert_eq!(route, Route::Gmail);
        let route: Route = serde_json::from_str("\"weather\"").unwrap();
        assert_eq!(route, Route::Unknown);
        assert_eq!(Route::from_domain("calendar"), Some(Route::Calendar));
        assert_eq!(Route::from_domain("smalltalk"), None);
    }

    #[test]
    fn test_with_methods_record_adjustments() {
        let original = RouteDecision::new(Route::Smalltalk, "")
            .with_tool_plan(vec!["gmail.get_message".to_string()]);
        let corrected = original.clone().with_route(Route::Gmail);

        assert_eq!(original.route, Route::Smalltalk);
        assert_eq!(corrected.route, Route::Gmail);
        assert!(corrected
            .adjustments
            .iter()
            .any(|a| a == "route: smalltalk -> gmail"));

        let cleared = corrected.without_plan("unknown_tool").with_question("Ne demek istedin?");
        assert!(cleared.tool_plan.is_empty());
        assert!(cleared.ask_user);
        assert_eq!(cleared.question.as_deref(), Some("Ne demek istedin?"));
    }

    #[test]
    fn test_slot_helpers() {
        let decision = RouteDecision::new(Route::Calendar, "create_event")
            .with_slot("title", serde_json::json!("  "))
            .with_slot("date", serde_json::json!("2024-05-01"));
        assert!(!decision.has_slot("title"));
        assert!(decision.has_slot("date"));
        assert_eq!(decision.slot_str("date"), Some("2024-05-01"));
        assert_eq!(decision.params()["date"], "2024-05-01");
    }

    #[test]
    fn test_fallback_decision() {
        let decision = RouteDecision::fallback("Tekrar söyler misin?");
        assert_eq!(decision.route, Route::Unknown);
        assert!(decision.ask_user);
        assert!(decision.fallback);
        assert_eq!(decision.confidence, 0.0);
    }

    #[test]
    fn test_blocked_result_shape() {
        let blocked = ToolCallResult::blocked(
            "calendar.delete_event",
            serde_json::json!({"id": "e1"}),
            "Silinsin mi?",
        );
        assert!(blocked.pending_confirmation);
        assert!(!blocked.success);
        assert_eq!(blocked.result["confirmation_prompt"], "Silinsin mi?");
    }
}
