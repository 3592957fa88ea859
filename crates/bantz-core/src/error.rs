//! Error types for bantz-core
//!
//! Pipeline failures carry the turn correlation id and the phase they came
//! from so a single log line is enough to place them. `process_turn` never
//! surfaces these to its caller; they are recovered into typed user-facing
//! states and only reach the trace and the logs.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Pipeline phase tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Zero-LLM pre-router
    Admission,
    /// Context/memory injection
    Memory,
    /// LLM intent routing
    Router,
    /// Plan verification
    Verify,
    /// Argument sanitization
    Sanitize,
    /// Tool execution
    Execute,
    /// Disambiguation dialog
    Disambiguate,
    /// Reply generation and guard
    Finalize,
}

impl Phase {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admission => "admission",
            Self::Memory => "memory",
            Self::Router => "router",
            Self::Verify => "verify",
            Self::Sanitize => "sanitize",
            Self::Execute => "execute",
            Self::Disambiguate => "disambiguate",
            Self::Finalize => "finalize",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Router output could not be parsed into a decision
    #[error("[{turn_id}] router parse error: {message}")]
    RouterParse {
        /// Turn correlation id
        turn_id: String,
        /// Parser message
        message: String,
    },

    /// A tool call failed
    #[error("[{turn_id}] tool '{tool}' failed: {message}")]
    ToolExecution {
        /// Turn correlation id
        turn_id: String,
        /// Tool name
        tool: String,
        /// Failure description
        message: String,
    },

    /// Reply generation failed
    #[error("[{turn_id}] finalizer error: {message}")]
    Finalizer {
        /// Turn correlation id
        turn_id: String,
        /// Failure description
        message: String,
    },

    /// Context injection failed (e.g. dialog summary over budget)
    #[error("[{turn_id}] memory error: {message}")]
    Memory {
        /// Turn correlation id
        turn_id: String,
        /// Failure description
        message: String,
    },

    /// Unsafe content or arguments were rejected
    #[error("[{turn_id}] safety violation in {phase}: {message}")]
    SafetyViolation {
        /// Turn correlation id
        turn_id: String,
        /// Phase that rejected the content
        phase: Phase,
        /// Description
        message: String,
    },

    /// A suspension point exceeded its budget
    #[error("[{turn_id}] {phase} timed out after {elapsed_ms}ms")]
    Timeout {
        /// Turn correlation id
        turn_id: String,
        /// Phase that timed out
        phase: Phase,
        /// Elapsed milliseconds
        elapsed_ms: u64,
    },

    /// A backend was skipped because it is known to be down
    #[error("[{turn_id}] {backend} unavailable in {phase}")]
    BackendUnavailable {
        /// Turn correlation id
        turn_id: String,
        /// Phase that skipped the call
        phase: Phase,
        /// Backend name (model tier or tool domain)
        backend: String,
    },

    /// A model call failed inside a turn
    #[error("[{turn_id}] {phase} model call failed: {source}")]
    Model {
        /// Turn correlation id
        turn_id: String,
        /// Phase that made the call
        phase: Phase,
        /// Provider error
        #[source]
        source: bantz_llm::Error,
    },

    /// The job running the turn was cancelled
    #[error("job {job_id} cancelled")]
    Cancelled {
        /// Cancelled job
        job_id: Uuid,
    },

    /// Invalid configuration
    #[error("invalid configuration: {field}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] bantz_llm::Error),

    /// Tool registry/runner error
    #[error("tool error: {0}")]
    Tool(#[from] bantz_tools::Error),

    /// Trace log I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (closed channel, poisoned state)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Phase tag, when the error originated inside the turn pipeline
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::RouterParse { .. } => Some(Phase::Router),
            Self::ToolExecution { .. } => Some(Phase::Execute),
            Self::Finalizer { .. } => Some(Phase::Finalize),
            Self::Memory { .. } => Some(Phase::Memory),
            Self::SafetyViolation { phase, .. }
            | Self::Timeout { phase, .. }
            | Self::BackendUnavailable { phase, .. }
            | Self::Model { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Turn correlation id, when the error belongs to a turn
    #[must_use]
    pub fn turn_id(&self) -> Option<&str> {
        match self {
            Self::RouterParse { turn_id, .. }
            | Self::ToolExecution { turn_id, .. }
            | Self::Finalizer { turn_id, .. }
            | Self::Memory { turn_id, .. }
            | Self::SafetyViolation { turn_id, .. }
            | Self::Timeout { turn_id, .. }
            | Self::BackendUnavailable { turn_id, .. }
            | Self::Model { turn_id, .. } => Some(turn_id),
            _ => None,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Messages are Turkish since they are spoken back to the user.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to recover
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::RouterParse { .. } => "Şu an seni tam anlayamadım.".to_string(),
            Error::ToolExecution { tool, .. } => {
                format!("'{tool}' işlemi şu anda tamamlanamadı.")
            }
            Error::Finalizer { .. } => "Yanıtı hazırlarken bir sorun oluştu.".to_string(),
            Error::Memory { .. } => "Konuşma geçmişi çok uzun, kısaltarak devam ediyorum.".to_string(),
            Error::SafetyViolation { .. } => {
                "Bu isteği güvenlik nedeniyle gerçekleştiremiyorum.".to_string()
            }
            Error::Timeout { .. } => "İşlem zaman aşımına uğradı.".to_string(),
            Error::BackendUnavailable { backend, .. } => {
                format!("'{backend}' servisine şu anda ulaşılamıyor.")
            }
            Error::InvalidConfig { field, message } => {
                format!("Yapılandırma hatası '{field}': {message}")
            }
            Error::Llm(_) | Error::Model { .. } => "Dil modeline şu an ulaşılamıyor.".to_string(),
            Error::Cancelled { .. } => "İşlem iptal edildi.".to_string(),
            Error::Tool(e) => format!("Araç hatası: {e}"),
            Error::Io(_) | Error::Serialization(_) | Error::Internal(_) => {
                "Beklenmeyen bir iç hata oluştu.".to_string()
            }
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::RouterParse { .. } => Some("Tekrar söyler misin?".to_string()),
            Error::ToolExecution { .. }
            | Error::Timeout { .. }
            | Error::BackendUnavailable { .. } => {
                Some("Biraz sonra tekrar dener misin?".to_string())
            }
            Error::SafetyViolation { .. } => {
                Some("İsteği farklı bir şekilde ifade etmeyi dene.".to_string())
            }
            Error::InvalidConfig { field, .. } => Some(format!(
                "config/default.toml veya BANTZ_ ortam değişkenlerinde '{field}' ayarını kontrol et."
            )),
            Error::Llm(_) | Error::Model { .. } => {
                Some("Model sunucusunun çalıştığından emin ol.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for a chat/voice reply
pub fn format_error_for_chat(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push(' ');
        output.push_str(&suggestion);
    }

    output
}
