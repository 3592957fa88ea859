//! Plan verification
//!
//! Cross-checks a routed decision against the live tool catalog before any
//! tool runs. Route/plan disagreements that can be resolved from the plan
//! itself are corrected; everything else clears the plan and turns the
//! turn into a question.

#[cfg(test)]
mod tests;

use crate::types::{Route, RouteDecision};
use bantz_tools::registry::tool_domain;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Generic question used for hard verification failures
pub const CLARIFICATION_QUESTION: &str =
    "Ne yapmamı istediğini tam anlayamadım, biraz daha açar mısın?";

/// A verification finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerificationError {
    /// Plan tools belong to a different route
    RouteToolMismatch {
        /// Decision route
        route: Route,
        /// Offending tool
        tool: String,
    },
    /// Smalltalk decision carries a tool plan
    SmalltalkWithTools,
    /// Tool is not in the catalog (or disabled)
    UnknownTool {
        /// Tool name
        tool: String,
    },
    /// Nothing in the utterance hints at the planned domain
    ToolPlanNoIndicators {
        /// Planned domain
        domain: String,
    },
    /// A slot the intent needs is absent
    MissingSlot {
        /// Intent key (`route.intent`)
        intent: String,
        /// Slot name
        slot: String,
    },
}

impl VerificationError {
    /// Stable code used in traces
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::RouteToolMismatch { .. } => "route_tool_mismatch",
            Self::SmalltalkWithTools => "smalltalk_with_tools",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::ToolPlanNoIndicators { .. } => "tool_plan_no_indicators",
            Self::MissingSlot { .. } => "missing_slot",
        }
    }

    /// Whether inferring the route from the plan can fix this
    #[must_use]
    pub fn is_correctable(&self) -> bool {
        matches!(
            self,
            Self::RouteToolMismatch { .. } | Self::SmalltalkWithTools
        )
    }

    /// Whether this is only logged
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ToolPlanNoIndicators { .. })
    }
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RouteToolMismatch { route, tool } => {
                write!(f, "route_tool_mismatch: {tool} on route {route}")
            }
            Self::SmalltalkWithTools => f.write_str("smalltalk_with_tools"),
            Self::UnknownTool { tool } => write!(f, "unknown_tool: {tool}"),
            Self::ToolPlanNoIndicators { domain } => {
                write!(f, "tool_plan_no_indicators: {domain}")
            }
            Self::MissingSlot { intent, slot } => write!(f, "missing_slot: {intent}.{slot}"),
        }
    }
}

/// Result of `verify`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// No blocking findings
    pub ok: bool,
    /// Every finding, warnings included
    pub errors: Vec<VerificationError>,
}

impl VerificationOutcome {
    /// Finding codes, for the trace
    #[must_use]
    pub fn codes(&self) -> Vec<&'static str> {
        self.errors.iter().map(VerificationError::code).collect()
    }
}

/// Verifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Required slots keyed by `route.intent`
    pub required_slots: BTreeMap<String, Vec<String>>,
    /// Utterance keywords hinting at each tool domain
    pub indicators: BTreeMap<String, Vec<String>>,
    /// Slot-specific questions
    pub slot_questions: BTreeMap<String, String>,
    /// Slots an earlier lookup step in the plan can supply
    pub lookup_slots: Vec<String>,
    /// Action prefixes of lookup tools (`list_events`, `search_messages`)
    pub lookup_prefixes: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

impl Default for VerifierConfig {
    fn default() -> Self {
        let required_slots = [
            ("calendar.create_event", owned(&["title", "start"])),
            ("calendar.update_event", owned(&["id"])),
            ("calendar.delete_event", owned(&["id"])),
            ("gmail.send", owned(&["to", "body"])),
            ("gmail.reply", owned(&["id", "body"])),
            ("browser.open", owned(&["url"])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let indicators = [
            (
                "calendar",
                owned(&[
                    "takvim", "toplantı", "etkinlik", "randevu", "ajanda", "bugün", "yarın",
                    "hafta", "saat", "calendar", "meeting", "event",
                ]),
            ),
            (
                "gmail",
                owned(&[
                    "mail", "e-posta", "eposta", "posta", "ileti", "mesaj", "gelen kutusu",
                    "gönder", "yanıtla", "inbox", "email",
                ]),
            ),
            (
                "system",
                owned(&["saat", "tarih", "sistem", "durum", "uptime", "status", "time"]),
            ),
            (
                "browser",
                owned(&["aç", "site", "sayfa", "tarayıcı", "ara", "browser", "open", "http"]),
            ),
            (
                "music",
                owned(&["müzik", "şarkı", "çal", "spotify", "albüm", "music", "play"]),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let slot_questions = [
            ("title", "Etkinliğin adı ne olsun?"),
            ("start", "Ne zaman başlasın?"),
            ("id", "Hangisini kastettiğini söyler misin?"),
            ("to", "Kime göndereyim?"),
            ("body", "Mesajda ne yazsın?"),
            ("url", "Hangi adresi açayım?"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            required_slots,
            indicators,
            slot_questions,
            lookup_slots: owned(&["id"]),
            lookup_prefixes: owned(&["list", "search", "find"]),
        }
    }
}

/// Verifies decisions against the tool catalog
#[derive(Debug, Clone, Default)]
pub struct PlanVerifier {
    config: VerifierConfig,
}

impl PlanVerifier {
    /// Create a verifier
    #[must_use]
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Route owning every tool of the plan
    ///
    /// Returns `None` for an empty plan, for tools outside any route, and
    /// when the plan spans several routes.
    #[must_use]
    pub fn infer_route_from_tools(plan: &[String]) -> Option<Route> {
        let routes: BTreeSet<Option<Route>> = plan
            .iter()
            .map(|tool| Route::from_domain(tool_domain(tool)))
            .collect();
        match routes.into_iter().collect::<Vec<_>>().as_slice() {
            [Some(route)] => Some(*route),
            _ => None,
        }
    }

    /// Check a decision without changing it
    #[must_use]
    pub fn verify(
        &self,
        decision: &RouteDecision,
        user_input: &str,
        known_tools: &[String],
    ) -> VerificationOutcome {
        let mut errors = Vec::new();

        for tool in &decision.tool_plan {
            if !known_tools.iter().any(|known| known == tool) {
                errors.push(VerificationError::UnknownTool { tool: tool.clone() });
            }
        }

        if !decision.tool_plan.is_empty() {
            if decision.route == Route::Smalltalk {
                errors.push(VerificationError::SmalltalkWithTools);
            } else {
                for tool in &decision.tool_plan {
                    if Route::from_domain(tool_domain(tool)) != Some(decision.route) {
                        errors.push(VerificationError::RouteToolMismatch {
                            route: decision.route,
                            tool: tool.clone(),
                        });
                    }
                }
            }

            errors.extend(self.missing_slots(decision));
            errors.extend(self.missing_indicators(&decision.tool_plan, user_input));
        }

        let ok = errors.iter().all(VerificationError::is_warning);
        VerificationOutcome { ok, errors }
    }

    fn has_lookup_step(&self, plan: &[String]) -> bool {
        plan.iter().any(|tool| {
            let action = tool.rsplit('.').next().unwrap_or_default();
            self.config
                .lookup_prefixes
                .iter()
                .any(|prefix| action.starts_with(prefix.as_str()))
        })
    }

    fn missing_slots(&self, decision: &RouteDecision) -> Vec<VerificationError> {
        let intent = format!("{}.{}", decision.route, decision.intent);
        let has_lookup = self.has_lookup_step(&decision.tool_plan);
        self.config
            .required_slots
            .get(&intent)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|slot| !decision.has_slot(slot))
                    .filter(|slot| !(has_lookup && self.config.lookup_slots.contains(slot)))
                    .map(|slot| VerificationError::MissingSlot {
                        intent: intent.clone(),
                        slot: slot.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn missing_indicators(&self, plan: &[String], user_input: &str) -> Vec<VerificationError> {
        let text = user_input.to_lowercase();
        let domains: BTreeSet<&str> = plan.iter().map(|tool| tool_domain(tool)).collect();
        domains
            .into_iter()
            .filter(|domain| {
                self.config
                    .indicators
                    .get(*domain)
                    .is_some_and(|words| !words.iter().any(|w| text.contains(w.as_str())))
            })
            .map(|domain| VerificationError::ToolPlanNoIndicators {
                domain: domain.to_string(),
            })
            .collect()
    }

    /// Verify and return the corrected decision
    pub fn apply(
        &self,
        decision: RouteDecision,
        user_input: &str,
        known_tools: &[String],
    ) -> (RouteDecision, VerificationOutcome) {
        let outcome = self.verify(&decision, user_input, known_tools);
        if outcome.errors.is_empty() {
            return (decision, outcome);
        }
        debug!(codes = ?outcome.codes(), "Verification findings");

        let mut decision = decision;

        if outcome
            .errors
            .iter()
            .any(|e| matches!(e, VerificationError::UnknownTool { .. }))
        {
            warn!(plan = ?decision.tool_plan, "Plan references unknown tools");
            let decision = decision
                .without_plan("unknown_tool")
                .with_question(CLARIFICATION_QUESTION);
            return (decision, outcome);
        }

        if outcome.errors.iter().any(VerificationError::is_correctable) {
            match Self::infer_route_from_tools(&decision.tool_plan) {
                Some(route) => {
                    debug!(from = %decision.route, to = %route, "Route inferred from plan");
                    decision = decision.with_route(route);
                }
                None => {
                    warn!(plan = ?decision.tool_plan, "Route could not be inferred from plan");
                    let decision = decision
                        .without_plan("ambiguous_plan")
                        .with_question(CLARIFICATION_QUESTION);
                    return (decision, outcome);
                }
            }
        }

        // slots are checked against the corrected route
        if let Some(VerificationError::MissingSlot { slot, .. }) =
            self.missing_slots(&decision).into_iter().next()
        {
            let question = self
                .config
                .slot_questions
                .get(&slot)
                .cloned()
                .unwrap_or_else(|| format!("'{slot}' bilgisini verir misin?"));
            decision = decision
                .without_plan(&format!("missing_slot: {slot}"))
                .with_question(question);
        }

        for warning in outcome.errors.iter().filter(|e| e.is_warning()) {
            decision = decision.with_note(warning.to_string());
        }

        (decision, outcome)
    }
}
