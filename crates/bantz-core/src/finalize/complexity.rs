//! Input complexity scoring and tier selection
//!
//! The keyword table is tuned per deployment, so it lives in configuration.
//! A phrase matches when its words occur in order, not necessarily
//! adjacent ("haftalık ... plan"), and every word position is used by at
//! most one phrase: "adım adım" needs two separate occurrences of "adım",
//! and a bare "plan" is not counted again once "haftalık plan" took it.

use crate::types::ToolCallResult;
use serde::{Deserialize, Serialize};

/// Finalizer tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Local, low-latency model
    Fast,
    /// Slower, higher-quality model
    Quality,
}

impl Tier {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Quality => "quality",
        }
    }

    /// The other tier
    #[must_use]
    pub fn other(&self) -> Self {
        match self {
            Self::Fast => Self::Quality,
            Self::Quality => Self::Fast,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A weighted complexity phrase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexitySignal {
    /// One or more words
    pub phrase: String,
    /// Points added on match
    pub weight: u8,
}

impl ComplexitySignal {
    fn new(phrase: &str, weight: u8) -> Self {
        Self {
            phrase: phrase.to_string(),
            weight,
        }
    }
}

/// Complexity table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplexityConfig {
    /// Keyword signals
    pub signals: Vec<ComplexitySignal>,
    /// Verb stems that add the action bonus next to a signal
    pub action_verbs: Vec<String>,
    /// Points for an action verb co-occurring with a signal
    pub action_bonus: u8,
    /// Saturation point
    pub max_score: u8,
}

impl Default for ComplexityConfig {
    fn default() -> Self {
        Self {
            signals: vec![
                ComplexitySignal::new("adım adım", 2),
                ComplexitySignal::new("haftalık plan", 2),
                ComplexitySignal::new("strateji", 2),
                ComplexitySignal::new("step by step", 2),
                ComplexitySignal::new("weekly plan", 2),
                ComplexitySignal::new("strategy", 2),
                ComplexitySignal::new("plan", 1),
                ComplexitySignal::new("detaylı", 1),
                ComplexitySignal::new("karşılaştır", 1),
                ComplexitySignal::new("analiz", 1),
                ComplexitySignal::new("detailed", 1),
                ComplexitySignal::new("compare", 1),
                ComplexitySignal::new("analyze", 1),
            ],
            action_verbs: [
                "yap", "hazırla", "oluştur", "planla", "make", "create", "prepare",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            action_bonus: 1,
            max_score: 5,
        }
    }
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Claim unused positions for `phrase`, in order; all or nothing
fn claim(tokens: &[String], used: &mut [bool], phrase: &[String]) -> bool {
    let mut picked = Vec::with_capacity(phrase.len());
    let mut from = 0;
    for word in phrase {
        let found = (from..tokens.len()).find(|&i| !used[i] && tokens[i].starts_with(word.as_str()));
        match found {
            Some(i) => {
                picked.push(i);
                from = i + 1;
            }
            None => return false,
        }
    }
    for i in picked {
        used[i] = true;
    }
    true
}

impl ComplexityConfig {
    /// Score `text` in `0..=max_score`
    #[must_use]
    pub fn score(&self, text: &str) -> u8 {
        let tokens = words(text);
        let mut used = vec![false; tokens.len()];

        let mut signals: Vec<(Vec<String>, u8)> = self
            .signals
            .iter()
            .map(|s| (words(&s.phrase), s.weight))
            .filter(|(phrase, _)| !phrase.is_empty())
            .collect();
        // longer phrases claim their words first
        signals.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        let mut score: u32 = 0;
        let mut matched = false;
        for (phrase, weight) in &signals {
            if claim(&tokens, &mut used, phrase) {
                score += u32::from(*weight);
                matched = true;
            }
        }

        if matched
            && tokens
                .iter()
                .any(|t| self.action_verbs.iter().any(|v| t.starts_with(v.as_str())))
        {
            score += u32::from(self.action_bonus);
        }

        score.min(u32::from(self.max_score)) as u8
    }
}

/// Tier selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Complexity at which the quality tier is forced
    pub complexity_threshold: u8,
    /// Serialized tool output size above which the fast tier is too slow
    pub budget_chars: usize,
    /// Tool call count above which the fast tier is too slow
    pub budget_calls: usize,
    /// Always use this tier
    pub force_tier: Option<Tier>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: 4,
            budget_chars: 4_000,
            budget_calls: 3,
            force_tier: None,
        }
    }
}

/// A tier choice and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierDecision {
    /// Chosen tier
    pub tier: Tier,
    /// Reason code
    pub reason: String,
    /// Input complexity
    pub complexity: u8,
}

impl TierConfig {
    /// Pick a tier: override, then complexity, then the latency budget
    #[must_use]
    pub fn select(
        &self,
        complexity: &ComplexityConfig,
        user_input: &str,
        results: &[ToolCallResult],
    ) -> TierDecision {
        let score = complexity.score(user_input);
        let decide = |tier: Tier, reason: &str| TierDecision {
            tier,
            reason: reason.to_string(),
            complexity: score,
        };

        if let Some(tier) = self.force_tier {
            return decide(tier, "forced");
        }
        if score >= self.complexity_threshold {
            return decide(Tier::Quality, "component_threshold_exceeded");
        }

        let chars: usize = results.iter().map(|r| r.result.to_string().len()).sum();
        if chars > self.budget_chars || results.len() > self.budget_calls {
            decide(Tier::Quality, "budget_exceeded")
        } else {
            decide(Tier::Fast, "within_budget")
        }
    }
}
