//! Confirmation firewall
//!
//! Holds at most one pending `ConfirmationRequest` per session. A call runs
//! only after the user confirmed exactly that (tool, params) identity, and
//! each confirmation is consumed by the call it authorised.

use crate::types::ConfirmationRequest;
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info};

const AFFIRMATIVE: &[&str] = &[
    "evet",
    "onaylıyorum",
    "onayla",
    "tamam",
    "olur",
    "yap",
    "devam",
    "kesinlikle",
    "yes",
    "ok",
    "okay",
    "confirm",
];

const NEGATIVE: &[&str] = &[
    "hayır",
    "hayir",
    "iptal",
    "vazgeç",
    "vazgec",
    "dur",
    "yapma",
    "istemiyorum",
    "no",
    "cancel",
    "stop",
];

/// The user's answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationAnswer {
    /// Go ahead
    Confirm,
    /// Drop the pending call
    Deny,
    /// Neither; the call stays pending
    Unclear,
}

impl ConfirmationAnswer {
    /// Classify a reply by its words
    ///
    /// Negative words win over affirmative ones ("hayır, yapma").
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        if words.iter().any(|w| NEGATIVE.contains(w)) {
            Self::Deny
        } else if words.iter().any(|w| AFFIRMATIVE.contains(w)) {
            Self::Confirm
        } else {
            Self::Unclear
        }
    }
}

/// Render the question for a destructive call
#[must_use]
pub fn render_prompt(tool: &str, params: &Value) -> String {
    let details = params
        .as_object()
        .map(|map| {
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}: {s}"),
                    other => format!("{k}: {other}"),
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    if details.is_empty() {
        format!("'{tool}' işlemini onaylıyor musun? (evet/hayır)")
    } else {
        format!("'{tool}' işlemini onaylıyor musun? ({details}) (evet/hayır)")
    }
}

/// Per-session confirmation state
#[derive(Debug, Default)]
pub struct ConfirmationFirewall {
    pending: Option<ConfirmationRequest>,
    confirmed: HashSet<String>,
}

impl ConfirmationFirewall {
    /// Create an empty firewall
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The pending request, if any
    #[must_use]
    pub fn pending(&self) -> Option<&ConfirmationRequest> {
        self.pending.as_ref()
    }

    /// Whether a request is waiting for the user
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Hold a call for confirmation, replacing any earlier request
    pub fn request(&mut self, request: ConfirmationRequest) {
        info!(tool = %request.tool, risk = %request.risk_level, "Awaiting confirmation");
        self.pending = Some(request);
    }

    /// Approve the pending request; its key may run once
    pub fn confirm(&mut self) -> Option<ConfirmationRequest> {
        let request = self.pending.take()?;
        debug!(tool = %request.tool, "Confirmation granted");
        self.confirmed.insert(request.action_key.clone());
        Some(request)
    }

    /// Drop the pending request
    pub fn deny(&mut self) -> Option<ConfirmationRequest> {
        let request = self.pending.take()?;
        debug!(tool = %request.tool, "Confirmation denied");
        Some(request)
    }

    /// Whether `action_key` was confirmed and not yet used
    #[must_use]
    pub fn is_confirmed(&self, action_key: &str) -> bool {
        self.confirmed.contains(action_key)
    }

    /// Use up a confirmation; returns whether one existed
    pub fn consume(&mut self, action_key: &str) -> bool {
        self.confirmed.remove(action_key)
    }

    /// Forget everything (session reset)
    pub fn reset(&mut self) {
        self.pending = None;
        self.confirmed.clear();
    }
}
