//! Model tier construction

use crate::config::LlmConfig;
use anyhow::{Context, Result};
use bantz_llm::{
    MockProvider, OllamaConfig, OllamaProvider, OpenAiCompatConfig, OpenAiCompatProvider,
    SharedProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Reply of the offline `mock` fast tier: every utterance routes to smalltalk
const MOCK_ROUTE_REPLY: &str = r#"{"route": "smalltalk", "intent": "chat", "confidence": 0.9, "tool_plan": [], "assistant_reply": "Çevrimdışı moddayım, şu an yalnızca sohbet edebiliyorum."}"#;

/// Build the fast tier
pub fn build_fast(config: &LlmConfig) -> Result<SharedProvider> {
    let fast = &config.fast;
    match fast.provider.as_str() {
        "mock" => {
            info!("Using mock fast tier");
            Ok(Arc::new(
                MockProvider::new(fast.model.clone()).with_default_reply(MOCK_ROUTE_REPLY),
            ))
        }
        "ollama" => {
            let provider = OllamaProvider::new(
                OllamaConfig::new()
                    .with_base_url(fast.base_url.clone())
                    .with_model(fast.model.clone())
                    .with_max_tokens(fast.max_tokens)
                    .with_timeout(Duration::from_secs(fast.timeout_secs)),
            )
            .context("Failed to create Ollama provider")?;
            info!(base_url = %fast.base_url, model = %fast.model, "Registered Ollama fast tier");
            Ok(Arc::new(provider))
        }
        other => anyhow::bail!("Unknown fast tier provider: {other}"),
    }
}

/// Build the quality tier, if enabled and keyed
///
/// A missing API key disables the tier instead of failing startup; the
/// finalizer then answers from the fast tier.
pub fn build_quality(config: &LlmConfig) -> Result<Option<SharedProvider>> {
    let quality = &config.quality;
    if !quality.enabled {
        return Ok(None);
    }

    let api_key = match std::env::var(&quality.api_key_env) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            warn!(
                env = %quality.api_key_env,
                "Quality tier enabled but no API key found; using the fast tier only"
            );
            return Ok(None);
        }
    };

    let provider = OpenAiCompatProvider::new(
        OpenAiCompatConfig::new(quality.base_url.clone(), api_key)
            .with_model(quality.model.clone())
            .with_timeout(Duration::from_secs(quality.timeout_secs)),
    )
    .context("Failed to create quality tier provider")?;
    info!(base_url = %quality.base_url, model = %quality.model, "Registered quality tier");
    Ok(Some(Arc::new(provider)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[test]
    fn test_mock_fast_tier() {
        let mut config = LlmConfig::default();
        config.fast.provider = "mock".to_string();
        let provider = build_fast(&config).unwrap();
        assert_eq!(provider.name(), "mock");
    }

    #[test]
    fn test_quality_disabled_by_default() {
        assert!(build_quality(&LlmConfig::default()).unwrap().is_none());
    }

    #[test]
    fn test_quality_without_key_is_skipped() {
        let mut config = LlmConfig::default();
        config.quality.enabled = true;
        config.quality.api_key_env = "BANTZ_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(build_quality(&config).unwrap().is_none());
    }
}
