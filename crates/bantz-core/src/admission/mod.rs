//! Admission - zero-LLM pre-router
//!
//! An ordered list of regex rules classifies trivial utterances (greetings,
//! thanks, "saat kaç") so they never reach the model, and flags destructive
//! phrasings. Destructive matches are never bypassed: they still go through
//! the intent router, and are excluded from the bypass-rate denominator.

mod rules;

#[cfg(test)]
mod tests;

pub use rules::default_rules;

use crate::error::{Error, Result};
use crate::types::{Route, RouteDecision};
use regex::Regex;
use serde::Serialize;
use std::sync::Mutex;
use tracing::debug;

/// A single pre-router rule
#[derive(Debug, Clone)]
pub struct PreRouterRule {
    /// Rule name (for logs and traces)
    pub name: String,
    /// Case-insensitive pattern
    pub pattern: Regex,
    /// Route assigned on match
    pub route: Route,
    /// Intent assigned on match
    pub intent: String,
    /// Confidence assigned on match
    pub confidence: f32,
    /// Whether the phrasing is destructive
    pub destructive: bool,
    /// Canned reply
    pub reply: Option<String>,
    /// Tool plan to run without routing
    pub tool_plan: Vec<String>,
}

impl PreRouterRule {
    /// Create a rule; the pattern is compiled case-insensitively
    pub fn new(name: impl Into<String>, pattern: &str, route: Route) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(&format!("(?i){pattern}")).map_err(|e| Error::InvalidConfig {
            field: format!("admission.rules.{name}"),
            message: e.to_string(),
        })?;
        Ok(Self {
            name,
            pattern,
            route,
            intent: String::new(),
            confidence: 1.0,
            destructive: false,
            reply: None,
            tool_plan: Vec::new(),
        })
    }

    /// Set the intent
    #[must_use]
    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = intent.into();
        self
    }

    /// Set the confidence
    #[must_use]
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// Mark as destructive
    #[must_use]
    pub fn destructive(mut self) -> Self {
        self.destructive = true;
        self
    }

    /// Set a canned reply
    #[must_use]
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Set a tool plan
    #[must_use]
    pub fn with_tool_plan(mut self, plan: &[&str]) -> Self {
        self.tool_plan = plan.iter().map(|s| (*s).to_string()).collect();
        self
    }
}

/// A successful rule match
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionMatch {
    /// Matching rule
    pub rule: String,
    /// Route
    pub route: Route,
    /// Intent
    pub intent: String,
    /// Confidence
    pub confidence: f32,
    /// Whether the phrasing is destructive
    pub destructive: bool,
    /// Canned reply
    pub reply: Option<String>,
    /// Tool plan
    pub tool_plan: Vec<String>,
}

impl AdmissionMatch {
    /// Whether the match may skip the intent router
    #[must_use]
    pub fn bypasses_router(&self) -> bool {
        !self.destructive
    }

    /// Decision for a bypassing match
    #[must_use]
    pub fn into_decision(self) -> RouteDecision {
        let mut decision = RouteDecision::new(self.route, self.intent)
            .with_confidence(self.confidence)
            .with_tool_plan(self.tool_plan)
            .with_note(format!("pre_router: {}", self.rule));
        if let Some(reply) = self.reply {
            decision = decision.with_reply(reply);
        }
        decision
    }
}

/// Pre-router counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    /// Queries routed
    pub total: u64,
    /// Queries answered without the intent router
    pub bypassed: u64,
    /// Destructive matches
    pub destructive: u64,
}

impl AdmissionStats {
    /// `bypassed / (total - destructive)`, 0 when nothing is eligible
    #[must_use]
    pub fn bypass_rate(&self) -> f64 {
        let eligible = self.total.saturating_sub(self.destructive);
        if eligible == 0 {
            0.0
        } else {
            self.bypassed as f64 / eligible as f64
        }
    }
}

/// Rule-based pre-router
pub struct PreRouter {
    rules: Vec<PreRouterRule>,
    stats: Mutex<AdmissionStats>,
}

impl PreRouter {
    /// Create a pre-router with explicit rules
    #[must_use]
    pub fn new(rules: Vec<PreRouterRule>) -> Self {
        Self {
            rules,
            stats: Mutex::new(AdmissionStats::default()),
        }
    }

    /// Create a pre-router with the built-in Turkish rules
    pub fn with_default_rules() -> Result<Self> {
        Ok(Self::new(default_rules()?))
    }

    fn find(&self, text: &str) -> Option<&PreRouterRule> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        self.rules.iter().find(|rule| rule.pattern.is_match(text))
    }

    /// Classify `text`, updating the counters
    pub fn route(&self, text: &str) -> Option<AdmissionMatch> {
        let found = self.find(text).map(|rule| AdmissionMatch {
            rule: rule.name.clone(),
            route: rule.route,
            intent: rule.intent.clone(),
            confidence: rule.confidence,
            destructive: rule.destructive,
            reply: rule.reply.clone(),
            tool_plan: rule.tool_plan.clone(),
        });

        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        stats.total += 1;
        match &found {
            Some(m) if m.destructive => stats.destructive += 1,
            Some(_) => stats.bypassed += 1,
            None => {}
        }

        if let Some(m) = &found {
            debug!(rule = %m.rule, route = %m.route, destructive = m.destructive, "Pre-router match");
        }
        found
    }

    /// Whether `text` would bypass the router; counters are untouched
    #[must_use]
    pub fn should_bypass(&self, text: &str) -> bool {
        self.find(text).is_some_and(|rule| !rule.destructive)
    }

    /// Counter snapshot
    #[must_use]
    pub fn stats(&self) -> AdmissionStats {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }
}
