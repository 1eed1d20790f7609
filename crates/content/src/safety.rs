//! Safety screening for blob content.
//!
//! Blob content is frequently model-generated, later re-embedded into
//! future prompts, and displayed verbatim. The screen rejects shapes that
//! would let a hostile generation carry an injection payload forward:
//! shell/command injection, code-execution call syntax, script-injection
//! markup, SQL-injection shapes, percent-encoded runs, path traversal,
//! raw control characters, and long base64-like runs.

use regex_lite::Regex;
use std::sync::OnceLock;
use storyloom_core::error::ContentError;

/// Deny-list patterns, compiled once.
fn deny_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (
                "shell command injection",
                r"(?i)([;&|]|\$\(|`)\s*(rm|curl|wget|nc|sh|bash|zsh|powershell|cmd)\b",
            ),
            (
                "code execution call",
                r"(?i)\b(eval|exec|execfile|system|popen|spawn|subprocess\.\w+)\s*\(",
            ),
            (
                "script injection markup",
                r"(?i)<\s*script\b|javascript\s*:|\bon(load|error|click|mouseover)\s*=",
            ),
            (
                "SQL injection shape",
                r"(?i)\b(union\s+(all\s+)?select|drop\s+table|truncate\s+table|delete\s+from|insert\s+into)\b",
            ),
            (
                "SQL tautology",
                r#"(?i)['"]\s*or\s+'?1'?\s*=\s*'?1"#,
            ),
            (
                "percent-encoded sequence",
                r"(%[0-9A-Fa-f]{2}){3,}",
            ),
            (
                "path traversal sequence",
                r"\.\./|\.\.\\",
            ),
            (
                "base64-like run",
                r"[A-Za-z0-9+/]{64,}={0,2}",
            ),
        ]
        .into_iter()
        .map(|(name, pattern)| {
            // Patterns are static and known-good; a failure here is a bug.
            (name, Regex::new(pattern).unwrap())
        })
        .collect()
    })
}

/// Screen content against the deny-list.
///
/// Returns the first matched pattern name as the rejection reason.
pub fn screen(content: &str) -> Result<(), ContentError> {
    if let Some(c) = content
        .chars()
        .find(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
    {
        return Err(ContentError::SafetyRejected {
            reason: format!("control character U+{:04X}", c as u32),
        });
    }

    for (name, pattern) in deny_patterns() {
        if pattern.is_match(content) {
            return Err(ContentError::SafetyRejected {
                reason: (*name).to_string(),
            });
        }
    }

    Ok(())
}
