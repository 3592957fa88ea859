//! Application configuration
//!
//! Layering, lowest priority first:
//! 1. `config/default.toml`, embedded in the binary
//! 2. `config/default.toml` and `config/local.toml` next to the working directory
//! 3. `BANTZ_*` environment variables (`BANTZ_LLM__FAST__MODEL=...`)

use anyhow::{Context, Result};
use bantz_core::{LatencyBudgets, OrchestratorConfig};
use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model tiers
    #[serde(default)]
    pub llm: LlmConfig,
    /// Turn pipeline
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// Turn trace log
    #[serde(default)]
    pub trace: TraceConfig,
    /// p95 budgets for `latency-gate`
    #[serde(default)]
    pub latency_gate: LatencyBudgets,
}

/// Model tier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Fast tier, also used by the intent router
    #[serde(default)]
    pub fast: FastTierConfig,
    /// Optional quality tier
    #[serde(default)]
    pub quality: QualityTierConfig,
}

/// Fast (local) tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FastTierConfig {
    /// `ollama` or `mock`
    pub provider: String,
    /// Ollama base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Default max tokens
    pub max_tokens: u32,
}

impl Default for FastTierConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            timeout_secs: 30,
            max_tokens: 1024,
        }
    }
}

/// Quality (hosted) tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityTierConfig {
    /// Whether to build the tier at all
    pub enabled: bool,
    /// OpenAI-compatible base URL including `/v1`
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QualityTierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "BANTZ_QUALITY_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Turn trace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Whether to write trace records
    pub enabled: bool,
    /// JSONL file path
    pub path: PathBuf,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("data/traces/turns.jsonl"),
        }
    }
}

impl AppConfig {
    /// Check the pieces serde cannot
    pub fn validate(&self) -> Result<()> {
        match self.llm.fast.provider.as_str() {
            "ollama" | "mock" => {}
            other => anyhow::bail!("llm.fast.provider: unknown provider '{other}' (ollama, mock)"),
        }
        if self.llm.fast.model.trim().is_empty() {
            anyhow::bail!("llm.fast.model: must not be empty");
        }
        if self.llm.quality.enabled && self.llm.quality.model.trim().is_empty() {
            anyhow::bail!("llm.quality.model: must not be empty when the tier is enabled");
        }
        self.orchestrator
            .validate()
            .context("Invalid orchestrator configuration")?;
        Ok(())
    }
}

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let config = Config::builder()
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name("config/local").required(false))
        // single "_" after the prefix, "__" between levels
        .add_source(
            Environment::with_prefix("BANTZ")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
