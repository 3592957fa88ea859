//! Router output parsing
//!
//! Local models wrap JSON in code fences, prepend chatter, or use the
//! older per-domain intent keys. Anything that still is not a JSON object
//! with a recognisable shape is a `RouterParse` error.

use crate::error::{Error, Result};
use crate::types::{Route, RouteDecision};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct RawDecision {
    route: String,
    #[serde(default, alias = "calendar_intent", alias = "gmail_intent")]
    intent: Option<String>,
    #[serde(default)]
    slots: Option<Value>,
    #[serde(default)]
    confidence: Option<f32>,
    #[serde(default)]
    tool_plan: Vec<PlanEntry>,
    #[serde(default)]
    assistant_reply: Option<String>,
    #[serde(default)]
    ask_user: bool,
    #[serde(default)]
    question: Option<String>,
    #[serde(default)]
    requires_confirmation: bool,
    #[serde(default)]
    confirmation_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanEntry {
    Name(String),
    Call {
        #[serde(alias = "tool")]
        name: String,
    },
}

impl PlanEntry {
    fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Call { name } => name.trim().to_string(),
        }
    }
}

/// Slice out the outermost JSON object of a model reply
fn extract_json(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a router reply into a decision
pub fn parse_decision(turn_id: &str, raw: &str) -> Result<RouteDecision> {
    let parse_error = |message: String| Error::RouterParse {
        turn_id: turn_id.to_string(),
        message,
    };

    let json = extract_json(raw).ok_or_else(|| parse_error("no JSON object in reply".to_string()))?;
    let parsed: RawDecision =
        serde_json::from_str(json).map_err(|e| parse_error(e.to_string()))?;

    let slots: BTreeMap<String, Value> = match parsed.slots {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect(),
        Some(Value::Null) | None => BTreeMap::new(),
        Some(other) => return Err(parse_error(format!("slots must be an object, got {other}"))),
    };

    let mut decision = RouteDecision::new(Route::parse(&parsed.route), parsed.intent.unwrap_or_default().trim())
        .with_slots(slots)
        .with_confidence(parsed.confidence.unwrap_or(0.0))
        .with_tool_plan(
            parsed
                .tool_plan
                .into_iter()
                .map(PlanEntry::into_name)
                .filter(|n| !n.is_empty())
                .collect(),
        );
    decision.adjustments.clear();

    if let Some(reply) = non_empty(parsed.assistant_reply) {
        decision = decision.with_reply(reply);
    }
    if parsed.ask_user {
        decision.ask_user = true;
        decision.question = non_empty(parsed.question);
    }
    if parsed.requires_confirmation {
        decision.requires_confirmation = true;
        decision.confirmation_prompt = non_empty(parsed.confirmation_prompt);
    }

    Ok(decision)
}
