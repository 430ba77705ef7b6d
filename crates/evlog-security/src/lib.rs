//! Secret and PII redaction for log payloads
//!
//! [`Redactor`] scrubs every string inside an arbitrary JSON value using an
//! ordered list of regex rules. It is pure and total: it never mutates its
//! input, never fails, and `redact(redact(v)) == redact(v)`.

pub mod redactor;

pub use redactor::{RedactionInfo, Redactor};

/// Redact a JSON value with the built-in rule set.
pub fn redact(value: &serde_json::Value) -> serde_json::Value {
    Redactor::shared().redact(value)
}

/// Redact a single string with the built-in rule set.
pub fn redact_str(input: &str) -> String {
    Redactor::shared().redact_str(input)
}
