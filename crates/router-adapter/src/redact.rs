//! Redaction of adapter-sourced data before it reaches the event store.
//!
//! Every value an adapter produces (or a caller passes to a subprocess
//! adapter as arguments) is scrubbed by a [`Redactor`] before it is attached
//! to an event payload or an error's `details` bag.

use serde_json::Value;

/// Key substrings (matched case-insensitively) that mark a field as sensitive.
const SENSITIVE_KEY_PATTERNS: &[&str] = &[
    "token", "secret", "password", "passwd", "api_key", "apikey", "credential", "authorization",
];

/// Literal text prefixes that mark an inline string as a probable credential.
const SENSITIVE_TEXT_PREFIXES: &[&str] = &["bearer ", "sk-", "ghp_", "gho_", "akia"];

const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Configurable redactor applied to adapter inputs/outputs.
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    extra_keys: Vec<String>,
}

impl Redactor {
    /// Create a redactor using only the standard key/text patterns.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a redactor with additional sensitive key substrings.
    #[must_use]
    pub fn with_extra_keys(extra_keys: Vec<String>) -> Self {
        Self { extra_keys }
    }

    fn key_is_sensitive(&self, key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        SENSITIVE_KEY_PATTERNS.iter().any(|p| lower.contains(p))
            || self
                .extra_keys
                .iter()
                .any(|p| lower.contains(&p.to_ascii_lowercase()))
    }

    fn text_is_sensitive(text: &str) -> bool {
        let lower = text.to_ascii_lowercase();
        SENSITIVE_TEXT_PREFIXES.iter().any(|p| lower.starts_with(p))
    }

    /// Redact a JSON value in place: object entries whose key looks
    /// sensitive are replaced wholesale; string leaves matching a known
    /// credential pattern are replaced regardless of key name.
    pub fn redact(&self, value: &mut Value) {
        match value {
            Value::Object(map) => {
                for (key, v) in map.iter_mut() {
                    if self.key_is_sensitive(key) {
                        *v = Value::String(REDACTED_PLACEHOLDER.to_string());
                    } else {
                        self.redact(v);
                    }
                }
            }
            Value::Array(items) => {
                for v in items.iter_mut() {
                    self.redact(v);
                }
            }
            Value::String(s) => {
                if Self::text_is_sensitive(s) {
                    *s = REDACTED_PLACEHOLDER.to_string();
                }
            }
            _ => {}
        }
    }

    /// Redact a plain string (used for error `details` text such as stderr).
    #[must_use]
    pub fn redact_text(&self, text: &str) -> String {
        if Self::text_is_sensitive(text) {
            REDACTED_PLACEHOLDER.to_string()
        } else {
            text.to_string()
        }
    }
}
