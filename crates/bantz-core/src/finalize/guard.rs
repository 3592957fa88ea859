//! Numeric fact guard
//!
//! Every number, time and date in a generated reply must come from the
//! turn's tool output: either literally, or as the length of an array in
//! that output ("3 toplantın var"). Anything else is a fabricated fact and
//! the reply is withheld.

use crate::types::{Route, ToolCallResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static FACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}|\d{1,2}:\d{2}|\d+(?:[.,]\d+)?").expect("static regex")
});

const MUTATING_PREFIXES: &[&str] = &[
    "create", "delete", "update", "reschedule", "move", "cancel", "send", "reply", "forward",
    "archive",
];

/// How literally reply facts must match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardStrictness {
    /// Exact literal match
    Strict,
    /// Normalized match (`9:00` == `09:00`)
    Balanced,
    /// Balanced, and lone single digits are exempt
    Lenient,
}

impl GuardStrictness {
    /// Strictness for a route and intent
    #[must_use]
    pub fn for_route(route: Route, intent: &str) -> Self {
        match route {
            Route::Calendar | Route::Gmail => {
                let intent = intent.to_lowercase();
                if MUTATING_PREFIXES.iter().any(|p| intent.starts_with(p)) {
                    Self::Strict
                } else {
                    Self::Balanced
                }
            }
            Route::Smalltalk => Self::Lenient,
            _ => Self::Balanced,
        }
    }
}

/// Outcome of a guard check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardVerdict {
    /// Whether the reply may be released
    pub passed: bool,
    /// Facts not backed by tool output
    pub new_facts: Vec<String>,
    /// Facts skipped under lenient rules
    pub exempted: Vec<String>,
    /// Why the reply failed
    pub reason: Option<String>,
}

fn fact_tokens(text: &str) -> Vec<String> {
    FACT_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn trim_zeros(part: &str) -> &str {
    let trimmed = part.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

/// Canonical form used by the balanced comparison
fn normalize(token: &str) -> String {
    if token.contains('-') {
        return token.split('-').map(trim_zeros).collect::<Vec<_>>().join("-");
    }
    if let Some((hours, minutes)) = token.split_once(':') {
        return format!("{}:{}", trim_zeros(hours), minutes);
    }
    let token = token.replace(',', ".");
    match token.split_once('.') {
        Some((int, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                trim_zeros(int).to_string()
            } else {
                format!("{}.{}", trim_zeros(int), frac)
            }
        }
        None => trim_zeros(&token).to_string(),
    }
}

fn collect_array_lengths(value: &Value, out: &mut BTreeSet<String>) {
    match value {
        Value::Array(items) => {
            out.insert(items.len().to_string());
            for item in items {
                collect_array_lengths(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                collect_array_lengths(item, out);
            }
        }
        _ => {}
    }
}

fn is_single_digit(token: &str) -> bool {
    token.len() == 1 && token.chars().all(|c| c.is_ascii_digit())
}

/// Checks replies against tool output
#[derive(Debug, Clone, Default)]
pub struct FactGuard;

impl FactGuard {
    /// Facts the reply may mention
    #[must_use]
    pub fn allowed_facts(results: &[ToolCallResult], extra_allowed: &[String]) -> BTreeSet<String> {
        let mut allowed = BTreeSet::new();
        for result in results.iter().filter(|r| r.success) {
            allowed.extend(fact_tokens(&result.result.to_string()));
            collect_array_lengths(&result.result, &mut allowed);
        }
        for text in extra_allowed {
            allowed.extend(fact_tokens(text));
        }
        allowed
    }

    /// Check a candidate reply
    #[must_use]
    pub fn check(
        reply: &str,
        results: &[ToolCallResult],
        extra_allowed: &[String],
        strictness: GuardStrictness,
    ) -> GuardVerdict {
        let allowed = Self::allowed_facts(results, extra_allowed);
        let normalized: BTreeSet<String> = allowed.iter().map(|t| normalize(t)).collect();

        let mut new_facts = Vec::new();
        let mut exempted = Vec::new();
        for token in fact_tokens(reply) {
            let backed = match strictness {
                GuardStrictness::Strict => allowed.contains(&token),
                GuardStrictness::Balanced | GuardStrictness::Lenient => {
                    normalized.contains(&normalize(&token))
                }
            };
            if backed {
                continue;
            }
            if strictness == GuardStrictness::Lenient && is_single_digit(&token) {
                exempted.push(token);
            } else {
                new_facts.push(token);
            }
        }

        let passed = new_facts.is_empty();
        let reason = (!passed).then(|| format!("unbacked facts: {}", new_facts.join(", ")));
        GuardVerdict {
            passed,
            new_facts,
            exempted,
            reason,
        }
    }
}
