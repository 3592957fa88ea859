//! Finalize - tiered reply generation behind the fact guard
//!
//! The reply source is decided in order:
//! 1. a pending question (`none(ask_user)`)
//! 2. a call held for confirmation (`none(confirmation)`)
//! 3. a grounded route without any successful call (`none(no_hallucination_gate)`)
//! 4. a direct reply proposed by the router, with no tool output (`none(router_reply)`)
//! 5. the fast or quality model, checked by the fact guard

mod complexity;
mod guard;


pub use complexity::{ComplexityConfig, ComplexitySignal, Tier, TierConfig, TierDecision};
pub use guard::{FactGuard, GuardStrictness, GuardVerdict};

use crate::error::{Error, Result};
use crate::types::{RouteDecision, ToolCallResult};
use bantz_llm::{CompletionRequest, Message, SharedProvider};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Reply when a grounded route has nothing to ground on
pub const NO_HALLUCINATION_REPLY: &str = "Şu anda buna erişemedim, lütfen tekrar dener misin?";

/// Reply when the guard rejects the generated prose
pub const GUARD_FALLBACK_REPLY: &str =
    "Sonuçlara baktım ama doğrulayabildiğim bir özet çıkaramadım. İstersen ayrıntıları tek tek sıralayabilirim.";

/// Reply when no finalizer produced text
pub const FINALIZER_ERROR_REPLY: &str = "Yanıtı hazırlarken bir sorun oluştu, lütfen tekrar dener misin?";

const FINALIZER_PROMPT: &str = "Sen Bantz adında Türkçe konuşan bir kişisel asistansın. \
Kullanıcının isteğini aşağıdaki araç sonuçlarına dayanarak kısa ve doğal bir dille yanıtla. \
Sonuçlarda olmayan hiçbir sayı, saat, tarih veya bilgi uydurma. \
Bir işlem başarısız olduysa bunu açıkça söyle.";

static PSEUDO_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<(thinking|think|tool_call|tool_response|function_call)>.*?</(thinking|think|tool_call|tool_response|function_call)>",
    )
    .expect("static regex")
});

static STRAY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"</?(?:thinking|think|tool_call|tool_response|function_call|function_response|system)>")
        .expect("static regex")
});

/// Strip model pseudo-tags and their content from prose
#[must_use]
pub fn sanitize_response(text: &str) -> String {
    let without_blocks = PSEUDO_TAG_RE.replace_all(text, "");
    let mut result = STRAY_TAG_RE.replace_all(&without_blocks, "").to_string();
    while result.contains("\n\n\n") {
        result = result.replace("\n\n\n", "\n\n");
    }
    result.trim().to_string()
}

/// Finalizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizerConfig {
    /// Tier selection
    pub tier: TierConfig,
    /// Complexity table
    pub complexity: ComplexityConfig,
    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
    /// Max tokens for the reply
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for FinalizerConfig {
    fn default() -> Self {
        Self {
            tier: TierConfig::default(),
            complexity: ComplexityConfig::default(),
            timeout_ms: 20_000,
            max_tokens: 512,
            temperature: 0.3,
        }
    }
}

/// The reply of a turn and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizeOutcome {
    /// Reply text
    pub reply: String,
    /// Model that wrote the reply, or `none(reason)`
    pub finalizer: String,
    /// Tier of that model
    pub tier: Option<Tier>,
    /// Tier reason, when a tier was selected
    pub tier_reason: Option<String>,
    /// Input complexity, when a tier was selected
    pub complexity: Option<u8>,
    /// Guard verdict, when generated prose was checked
    pub verdict: Option<GuardVerdict>,
}

impl FinalizeOutcome {
    /// A reply that did not come from a model
    #[must_use]
    pub fn none(reason: &str, reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            finalizer: format!("none({reason})"),
            tier: None,
            tier_reason: None,
            complexity: None,
            verdict: None,
        }
    }
}

/// Fast/quality finalizer with the fact guard
pub struct FinalizerPipeline {
    fast: SharedProvider,
    quality: Option<SharedProvider>,
    config: FinalizerConfig,
}

impl FinalizerPipeline {
    /// Create a pipeline; without a quality provider every turn uses fast
    #[must_use]
    pub fn new(fast: SharedProvider, quality: Option<SharedProvider>, config: FinalizerConfig) -> Self {
        Self {
            fast,
            quality,
            config,
        }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &FinalizerConfig {
        &self.config
    }

    /// Produce the reply for a turn
    #[instrument(skip_all, fields(turn_id = %turn_id, route = %decision.route))]
    pub async fn finalize(
        &self,
        turn_id: &str,
        user_input: &str,
        decision: &RouteDecision,
        results: &[ToolCallResult],
    ) -> FinalizeOutcome {
        if decision.ask_user {
            let question = decision
                .question
                .clone()
                .unwrap_or_else(|| FINALIZER_ERROR_REPLY.to_string());
            return FinalizeOutcome::none("ask_user", question);
        }

        if let Some(blocked) = results.iter().find(|r| r.pending_confirmation) {
            let prompt = blocked.result["confirmation_prompt"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            return FinalizeOutcome::none("confirmation", prompt);
        }

        if decision.route.requires_grounding() && !results.iter().any(|r| r.success) {
            info!(route = %decision.route, "No successful tool output, gating reply");
            return FinalizeOutcome::none("no_hallucination_gate", NO_HALLUCINATION_REPLY);
        }

        if results.is_empty() {
            if let Some(reply) = &decision.assistant_reply {
                return FinalizeOutcome::none("router_reply", reply.clone());
            }
        }

        let selection = self
            .config
            .tier
            .select(&self.config.complexity, user_input, results);
        let (tier, reason) = self.resolve_tier(selection.tier, &selection.reason).await;
        debug!(tier = %tier, reason = %reason, complexity = selection.complexity, "Tier selected");

        let (tier, prose) = match self.generate(turn_id, tier, user_input, results).await {
            Ok(prose) => (tier, prose),
            Err(e) => {
                warn!(tier = %tier, error = %e, "Finalizer failed, trying other tier");
                let other = tier.other();
                match self.provider(other) {
                    Some(_) => match self.generate(turn_id, other, user_input, results).await {
                        Ok(prose) => (other, prose),
                        Err(e) => {
                            warn!(tier = %other, error = %e, "Both finalizers failed");
                            return FinalizeOutcome::none("finalizer_error", FINALIZER_ERROR_REPLY);
                        }
                    },
                    None => return FinalizeOutcome::none("finalizer_error", FINALIZER_ERROR_REPLY),
                }
            }
        };

        let prose = sanitize_response(&prose);
        let strictness = GuardStrictness::for_route(decision.route, &decision.intent);
        let verdict = FactGuard::check(&prose, results, &[user_input.to_string()], strictness);

        let reply = if verdict.passed {
            prose
        } else {
            warn!(
                new_facts = ?verdict.new_facts,
                strictness = ?strictness,
                "Fact guard rejected reply"
            );
            GUARD_FALLBACK_REPLY.to_string()
        };

        let finalizer = self
            .provider(tier)
            .map_or_else(|| tier.as_str().to_string(), |p| p.default_model().to_string());

        FinalizeOutcome {
            reply,
            finalizer,
            tier: Some(tier),
            tier_reason: Some(reason),
            complexity: Some(selection.complexity),
            verdict: Some(verdict),
        }
    }

    fn provider(&self, tier: Tier) -> Option<&SharedProvider> {
        match tier {
            Tier::Fast => Some(&self.fast),
            Tier::Quality => self.quality.as_ref(),
        }
    }

    /// Fall back to fast when quality is missing or down
    async fn resolve_tier(&self, tier: Tier, reason: &str) -> (Tier, String) {
        if tier == Tier::Fast {
            return (tier, reason.to_string());
        }
        match &self.quality {
            Some(quality) if quality.is_available().await => (Tier::Quality, reason.to_string()),
            _ => (Tier::Fast, "quality_unavailable".to_string()),
        }
    }

    async fn generate(
        &self,
        turn_id: &str,
        tier: Tier,
        user_input: &str,
        results: &[ToolCallResult],
    ) -> Result<String> {
        let provider = self.provider(tier).ok_or_else(|| Error::BackendUnavailable {
            turn_id: turn_id.to_string(),
            phase: crate::error::Phase::Finalize,
            backend: tier.as_str().to_string(),
        })?;

        let payload = serde_json::to_string(
            &results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "tool": r.tool,
                        "success": r.success,
                        "result": r.result,
                        "error": r.error,
                    })
                })
                .collect::<Vec<_>>(),
        )?;

        let request = CompletionRequest::new("")
            .with_message(Message::system(FINALIZER_PROMPT))
            .with_message(Message::user(format!(
                "Kullanıcı: {user_input}\n\nAraç sonuçları (JSON):\n{payload}"
            )))
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let response = tokio::time::timeout(timeout, provider.complete(request))
            .await
            .map_err(|_| Error::Timeout {
                turn_id: turn_id.to_string(),
                phase: crate::error::Phase::Finalize,
                elapsed_ms: self.config.timeout_ms,
            })?
            .map_err(|source| Error::Model {
                turn_id: turn_id.to_string(),
                phase: crate::error::Phase::Finalize,
                source,
            })?;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(Error::Finalizer {
                turn_id: turn_id.to_string(),
                message: format!("{tier} finalizer returned empty text"),
            });
        }
        Ok(text.to_string())
    }
}
