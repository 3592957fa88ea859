//! Security - argument sanitization and injection patterns
//!
//! - `patterns`: prompt-injection phrases and chat-template delimiters
//! - `sanitizer`: per-field cleansing/blocking of tool arguments

pub mod patterns;
mod sanitizer;


pub use patterns::{detect_prompt_injection, InjectionPattern, ThreatLevel};
pub use sanitizer::{
    ArgumentSanitizer, IssueKind, SanitizationIssue, SanitizerConfig, Severity,
};
