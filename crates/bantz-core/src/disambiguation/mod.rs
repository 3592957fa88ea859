//! Disambiguation dialog
//!
//! When a lookup for a single-target operation ("delete the meeting")
//! comes back with several candidates, the turn ends with a numbered
//! question instead of picking one. The user's next utterance is resolved
//! against that list by number, `#N`, or ordinal word.

#[cfg(test)]
mod tests;

use crate::types::{RouteDecision, ToolCallResult};
use bantz_tools::registry::tool_domain;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static HASH_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\s*(\d{1,3})").expect("static regex"));

// "2", "2.", "2)", "2'yi", "3.'yü", "2yi"
static BARE_INDEX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(\d{1,3})[.)]?(?:['’]?\p{L}+)?(?:[\s,.!?]|$)").expect("static regex")
});

/// Question when a single-target lookup found nothing
pub const NO_MATCH_QUESTION: &str =
    "Bununla eşleşen bir kayıt bulamadım. Biraz daha açık söyler misin?";

const LIST_KEYS: &[&str] = &["items", "events", "messages", "results"];
const LABEL_KEYS: &[&str] = &["summary", "title", "subject", "name"];
const DETAIL_KEYS: &[&str] = &["start", "date", "from"];

/// Ordinal stems; a word matches when it starts with the stem
const ORDINAL_STEMS: &[(&str, Ordinal)] = &[
    ("sonuncu", Ordinal::Last),
    ("birinci", Ordinal::Nth(1)),
    ("ikinci", Ordinal::Nth(2)),
    ("üçüncü", Ordinal::Nth(3)),
    ("dördüncü", Ordinal::Nth(4)),
    ("beşinci", Ordinal::Nth(5)),
    ("altıncı", Ordinal::Nth(6)),
    ("first", Ordinal::Nth(1)),
    ("second", Ordinal::Nth(2)),
    ("third", Ordinal::Nth(3)),
    ("fourth", Ordinal::Nth(4)),
    ("fifth", Ordinal::Nth(5)),
];

/// Short ordinals matched as whole words only
const ORDINAL_WORDS: &[(&str, Ordinal)] = &[
    ("ilk", Ordinal::Nth(1)),
    ("ilki", Ordinal::Nth(1)),
    ("ilkini", Ordinal::Nth(1)),
    ("son", Ordinal::Last),
    ("sonu", Ordinal::Last),
    ("sonunu", Ordinal::Last),
    ("last", Ordinal::Last),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ordinal {
    Nth(usize),
    Last,
}

/// Dialog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisambiguationConfig {
    /// Fewest candidates that trigger a question
    pub min_items: usize,
    /// Most candidates listed in the question
    pub max_listed: usize,
    /// Intent prefixes naming single-target operations
    pub single_target_prefixes: Vec<String>,
}

impl Default for DisambiguationConfig {
    fn default() -> Self {
        Self {
            min_items: 2,
            max_listed: 5,
            single_target_prefixes: [
                "delete", "update", "reschedule", "move", "cancel", "edit", "reply", "archive",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// One referenceable candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisambiguationItem {
    /// 1-based position in the question
    pub index: usize,
    /// Identifier passed back to the tool
    pub id: Value,
    /// Display label
    pub label: String,
    /// Tool that produced the item
    pub source: String,
}

/// An open question waiting for a selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisambiguationRequest {
    /// Intent being disambiguated
    pub intent: String,
    /// Candidates, in question order
    pub items: Vec<DisambiguationItem>,
    /// Rendered question
    pub question: String,
    /// The decision the question interrupted
    pub decision: RouteDecision,
    /// Plan steps still to run after the selection
    pub remaining_plan: Vec<String>,
}

/// Outcome of resolving a reply
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The user picked this item
    Chosen(DisambiguationItem),
    /// Not understood; ask again with this question
    Reask(String),
}

/// What a lookup step found for a single-target intent
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Enough candidates to ask which one
    Ambiguous,
    /// Exactly one usable target
    Single(DisambiguationItem),
    /// The list was empty
    Empty,
}

/// Builds and resolves disambiguation questions
#[derive(Debug, Clone, Default)]
pub struct DisambiguationDialog {
    config: DisambiguationConfig,
}

impl DisambiguationDialog {
    /// Create a dialog
    #[must_use]
    pub fn new(config: DisambiguationConfig) -> Self {
        Self { config }
    }

    /// Whether the intent acts on exactly one target
    #[must_use]
    pub fn is_single_target(&self, intent: &str) -> bool {
        let intent = intent.trim().to_lowercase();
        let action = intent.rsplit('.').next().unwrap_or_default();
        !action.is_empty()
            && self
                .config
                .single_target_prefixes
                .iter()
                .any(|prefix| action.starts_with(prefix.as_str()))
    }

    /// Referenceable items in a tool payload
    #[must_use]
    pub fn extract_items(result: &Value, source: &str) -> Vec<DisambiguationItem> {
        candidate_list(result, source).unwrap_or_default()
    }

    /// Classify a lookup result for a single-target intent
    ///
    /// `None` when the call failed, the intent is not single-target, or
    /// the payload carries no candidate list at all.
    #[must_use]
    pub fn lookup_outcome(&self, intent: &str, result: &ToolCallResult) -> Option<LookupOutcome> {
        if !result.success || !self.is_single_target(intent) {
            return None;
        }
        let mut items = candidate_list(&result.result, &result.tool)?;
        let outcome = match items.len() {
            0 => LookupOutcome::Empty,
            n if n >= self.config.min_items => LookupOutcome::Ambiguous,
            _ => LookupOutcome::Single(items.remove(0)),
        };
        Some(outcome)
    }

    /// Whether this result should interrupt the plan
    #[must_use]
    pub fn triggers(&self, intent: &str, result: &ToolCallResult) -> bool {
        matches!(self.lookup_outcome(intent, result), Some(LookupOutcome::Ambiguous))
    }

    /// Build a question from the latest successful result, if needed
    #[must_use]
    pub fn check(
        &self,
        decision: &RouteDecision,
        results: &[ToolCallResult],
    ) -> Option<DisambiguationRequest> {
        let latest = results.iter().rev().find(|r| r.success)?;
        if !self.triggers(&decision.intent, latest) {
            return None;
        }

        let mut items = Self::extract_items(&latest.result, &latest.tool);
        items.truncate(self.config.max_listed);
        let question = Self::render_question(&items);

        let executed = results.len();
        let remaining_plan = decision
            .tool_plan
            .iter()
            .skip(executed)
            .cloned()
            .collect();

        debug!(intent = %decision.intent, candidates = items.len(), "Disambiguation needed");

        Some(DisambiguationRequest {
            intent: decision.intent.clone(),
            items,
            question,
            decision: decision.clone(),
            remaining_plan,
        })
    }

    fn render_question(items: &[DisambiguationItem]) -> String {
        let domain = items.first().map_or("", |item| tool_domain(&item.source));
        let mut question = format!(
            "{} {} sonuç buldum, hangisini kastediyorsun?",
            domain_phrase(domain),
            items.len()
        );
        for item in items {
            question.push_str(&format!("\n{}. {}", item.index, item.label));
        }
        question
    }

    /// Turn the interrupted decision into the question
    #[must_use]
    pub fn apply(decision: RouteDecision, request: &DisambiguationRequest) -> RouteDecision {
        decision
            .without_plan("disambiguation")
            .with_question(request.question.clone())
    }

    /// Resolve the user's reply against an open question
    #[must_use]
    pub fn resolve(&self, request: &DisambiguationRequest, text: &str) -> Selection {
        let count = request.items.len();
        let position = parse_position(text).map(|ordinal| match ordinal {
            Ordinal::Nth(n) => n,
            Ordinal::Last => count,
        });

        match position {
            Some(n) if (1..=count).contains(&n) => {
                Selection::Chosen(request.items[n - 1].clone())
            }
            _ => Selection::Reask(format!(
                "Lütfen 1 ile {count} arasında bir numara söyle.\n{}",
                request.question
            )),
        }
    }
}

fn domain_phrase(domain: &str) -> &'static str {
    match domain {
        "calendar" => "Takvimde",
        "gmail" => "E-postalarında",
        "files" | "file" => "Dosyalarda",
        "contacts" => "Kişilerde",
        _ => "Aramada",
    }
}

fn candidate_list(result: &Value, source: &str) -> Option<Vec<DisambiguationItem>> {
    let list = match result {
        Value::Array(items) => Some(items),
        Value::Object(map) => LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }?;

    Some(
        list.iter()
            .filter_map(item_parts)
            .enumerate()
            .map(|(i, (id, label))| DisambiguationItem {
                index: i + 1,
                id,
                label,
                source: source.to_string(),
            })
            .collect(),
    )
}

fn item_parts(item: &Value) -> Option<(Value, String)> {
    match item {
        Value::String(s) if !s.trim().is_empty() => {
            Some((Value::String(s.clone()), s.trim().to_string()))
        }
        Value::Object(map) => {
            let label = LABEL_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            let id = map.get("id").cloned().unwrap_or_else(|| Value::String(label.to_string()));
            let detail = DETAIL_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str));
            let label = match detail {
                Some(detail) => format!("{label} ({detail})"),
                None => label.to_string(),
            };
            Some((id, label))
        }
        _ => None,
    }
}

fn parse_position(text: &str) -> Option<Ordinal> {
    if let Some(caps) = HASH_INDEX_RE.captures(text) {
        return caps[1].parse().ok().map(Ordinal::Nth);
    }
    if let Some(caps) = BARE_INDEX_RE.captures(text.trim()) {
        return caps[1].parse().ok().map(Ordinal::Nth);
    }

    let lower = text.to_lowercase();
    for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        if let Some((_, ordinal)) = ORDINAL_WORDS.iter().find(|(w, _)| *w == word) {
            return Some(*ordinal);
        }
        if let Some((_, ordinal)) = ORDINAL_STEMS.iter().find(|(stem, _)| word.starts_with(stem)) {
            return Some(*ordinal);
        }
    }
    None
}
