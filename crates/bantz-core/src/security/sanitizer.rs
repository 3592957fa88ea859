//! Argument sanitizer
//!
//! Runs on the parameters of every tool call before execution:
//! 1. per-field length limits (truncate, warning)
//! 2. dangerous HTML tags and inline `on*=` handlers (strip, warning)
//! 3. recipient fields must be plain, valid addresses (block)
//! 4. outbound-communication tools reject prompt-injection text (block)
//! 5. shell-like tools reject metacharacters in command fields (block)

use super::patterns::detect_prompt_injection;
use bantz_tools::registry::tool_domain;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

static DANGEROUS_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|iframe|object)\b[^>]*>.*?</(script|style|iframe|object)\s*>")
        .expect("static regex")
});

static DANGEROUS_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(?:script|iframe|object|embed|form|input|link|meta|style)\b[^>]*>")
        .expect("static regex")
});

static EVENT_HANDLER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("static regex")
});

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("static regex")
});

static SQL_FRAGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(--|;|/\*|\b(?:union\s+select|drop\s+table|insert\s+into|delete\s+from|or\s+1\s*=\s*1)\b)")
        .expect("static regex")
});

static SHELL_META_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;&|`<>]|\$\(|\$\{|\n").expect("static regex"));

const RECIPIENT_FIELDS: &[&str] = &["to", "cc", "bcc", "recipient", "recipients", "email"];
const COMMUNICATION_FIELDS: &[&str] = &["body", "subject", "text", "message"];
const COMMAND_FIELDS: &[&str] = &["command", "cmd", "args", "script"];

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Value was cleaned; the call proceeds
    Warning,
    /// The call is rejected
    Block,
}

/// Issue kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Dangerous HTML tag or event handler
    HtmlInjection,
    /// Malformed or suspicious recipient
    EmailInvalid,
    /// Field longer than its limit
    TooLong,
    /// Prompt-injection phrase or template delimiter
    PromptInjection,
    /// Shell metacharacters in a command field
    ShellInjection,
}

impl IssueKind {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HtmlInjection => "html_injection",
            Self::EmailInvalid => "email_invalid",
            Self::TooLong => "too_long",
            Self::PromptInjection => "prompt_injection",
            Self::ShellInjection => "shell_injection",
        }
    }
}

/// A problem found in one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationIssue {
    /// Field name
    pub field: String,
    /// Kind
    pub kind: IssueKind,
    /// Severity
    pub severity: Severity,
    /// Short description
    pub detail: String,
}

/// Sanitizer limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Limit for fields without an explicit entry
    pub default_max_len: usize,
    /// Per-field limits
    pub field_limits: HashMap<String, usize>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            default_max_len: 10_000,
            field_limits: HashMap::from([
                ("subject".to_string(), 500),
                ("body".to_string(), 50_000),
                ("title".to_string(), 500),
            ]),
        }
    }
}

/// Per-field argument sanitizer
#[derive(Debug, Clone, Default)]
pub struct ArgumentSanitizer {
    config: SanitizerConfig,
}

impl ArgumentSanitizer {
    /// Create a sanitizer
    #[must_use]
    pub fn new(config: SanitizerConfig) -> Self {
        Self { config }
    }

    fn limit_for(&self, field: &str) -> usize {
        self.config
            .field_limits
            .get(field)
            .copied()
            .unwrap_or(self.config.default_max_len)
    }

    /// Clean `params` for `tool_name`, returning the cleaned copy and every issue found
    #[must_use]
    pub fn sanitize(&self, tool_name: &str, params: &Value) -> (Value, Vec<SanitizationIssue>) {
        let mut issues = Vec::new();
        let Value::Object(map) = params else {
            return (params.clone(), issues);
        };

        let outbound = is_outbound_tool(tool_name);
        let shell = is_shell_tool(tool_name);

        let mut cleaned = serde_json::Map::with_capacity(map.len());
        for (field, value) in map {
            let value = self.clean_value(field, value, &mut issues);

            if RECIPIENT_FIELDS.contains(&field.as_str()) {
                check_recipients(field, &value, &mut issues);
            }
            if outbound && COMMUNICATION_FIELDS.contains(&field.as_str()) {
                for text in strings_of(&value) {
                    if let Some(p) = detect_prompt_injection(text) {
                        issues.push(block(field, IssueKind::PromptInjection, p.id));
                    }
                }
            }
            if shell && COMMAND_FIELDS.contains(&field.as_str()) {
                for text in strings_of(&value) {
                    if SHELL_META_RE.is_match(text) {
                        issues.push(block(field, IssueKind::ShellInjection, "shell metacharacters"));
                    }
                }
            }

            cleaned.insert(field.clone(), value);
        }

        if !issues.is_empty() {
            debug!(tool = %tool_name, issues = issues.len(), "Sanitizer reported issues");
        }
        if Self::has_blocking_issues(&issues) {
            warn!(tool = %tool_name, summary = %Self::blocking_summary(&issues), "Tool call blocked by sanitizer");
        }

        (Value::Object(cleaned), issues)
    }

    fn clean_value(&self, field: &str, value: &Value, issues: &mut Vec<SanitizationIssue>) -> Value {
        match value {
            Value::String(s) => Value::String(self.clean_string(field, s, issues)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.clean_value(field, item, issues))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn clean_string(&self, field: &str, s: &str, issues: &mut Vec<SanitizationIssue>) -> String {
        let mut out = s.to_string();

        if out.contains('<') {
            let stripped = DANGEROUS_BLOCK_RE.replace_all(&out, "");
            let stripped = DANGEROUS_TAG_RE.replace_all(&stripped, "");
            let stripped = EVENT_HANDLER_RE.replace_all(&stripped, "").into_owned();
            if stripped != out {
                issues.push(SanitizationIssue {
                    field: field.to_string(),
                    kind: IssueKind::HtmlInjection,
                    severity: Severity::Warning,
                    detail: "dangerous HTML removed".to_string(),
                });
                out = stripped;
            }
        }

        let limit = self.limit_for(field);
        if out.chars().count() > limit {
            issues.push(SanitizationIssue {
                field: field.to_string(),
                kind: IssueKind::TooLong,
                severity: Severity::Warning,
                detail: format!("truncated to {limit} characters"),
            });
            out = out.chars().take(limit).collect();
        }

        out
    }

    /// Whether any issue rejects the call
    #[must_use]
    pub fn has_blocking_issues(issues: &[SanitizationIssue]) -> bool {
        issues.iter().any(|i| i.severity == Severity::Block)
    }

    /// One-line description of the blocking issues
    #[must_use]
    pub fn blocking_summary(issues: &[SanitizationIssue]) -> String {
        issues
            .iter()
            .filter(|i| i.severity == Severity::Block)
            .map(|i| format!("{}: {} ({})", i.field, i.kind.as_str(), i.detail))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn block(field: &str, kind: IssueKind, detail: &str) -> SanitizationIssue {
    SanitizationIssue {
        field: field.to_string(),
        kind,
        severity: Severity::Block,
        detail: detail.to_string(),
    }
}

fn strings_of(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn check_recipients(field: &str, value: &Value, issues: &mut Vec<SanitizationIssue>) {
    for raw in strings_of(value) {
        if raw.chars().any(char::is_control) {
            issues.push(block(field, IssueKind::EmailInvalid, "control characters"));
            continue;
        }
        if raw.contains('|') || raw.contains('`') {
            issues.push(block(field, IssueKind::EmailInvalid, "pipe or backtick"));
            continue;
        }
        if SQL_FRAGMENT_RE.is_match(raw) {
            issues.push(block(field, IssueKind::EmailInvalid, "sql fragment"));
            continue;
        }
        for address in raw.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            let address = display_name_address(address);
            if !EMAIL_RE.is_match(address) {
                issues.push(block(field, IssueKind::EmailInvalid, "invalid address"));
                break;
            }
        }
    }
}

/// `Ayşe <ayse@example.com>` → `ayse@example.com`
fn display_name_address(address: &str) -> &str {
    match (address.rfind('<'), address.rfind('>')) {
        (Some(open), Some(close)) if open < close => address[open + 1..close].trim(),
        _ => address,
    }
}

fn is_outbound_tool(tool_name: &str) -> bool {
    let action = tool_name.split_once('.').map_or(tool_name, |(_, a)| a);
    let gmail_outbound = tool_domain(tool_name) == "gmail"
        && ["send", "reply", "forward", "draft"]
            .iter()
            .any(|v| action.contains(v));
    gmail_outbound
        || ["send", "reply", "forward"]
            .iter()
            .any(|v| action.starts_with(v))
}

fn is_shell_tool(tool_name: &str) -> bool {
    let lower = tool_name.to_lowercase();
    ["shell", "exec", "command", "terminal", "run_"]
        .iter()
        .any(|v| lower.contains(v))
}
