use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionInfo {
    pub redaction_type: String,
    pub count: usize,
}

#[derive(Debug, Clone)]
struct Rule {
    name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl Rule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).expect("built-in redaction pattern"),
            replacement,
        }
    }
}

lazy_static! {
    // Order matters - more specific first. Placeholders are bracketed so a
    // replacement can never join two word runs into a new match.
    static ref DEFAULT_RULES: Vec<Rule> = vec![
        Rule::new(
            "KEY",
            r"(?i)(?:sk|pk|api|key|token|secret|password|bearer)[-_]?[A-Za-z0-9_]{20,}",
            "[REDACTED_KEY]",
        ),
        Rule::new(
            "TOKEN",
            r"\b[A-Za-z0-9+/]{40,}={0,2}\b",
            "[REDACTED_TOKEN]",
        ),
        Rule::new(
            "EMAIL",
            r"[A-Za-z0-9_.+-]+@[A-Za-z0-9_.-]+\.[A-Za-z0-9_]{2,}",
            "[REDACTED_EMAIL]",
        ),
        Rule::new(
            "HOME_PATH",
            r"(/Users|/home)/[A-Za-z0-9_]+",
            "${1}/[USER]",
        ),
        Rule::new(
            "PRIVATE_IP",
            r"\b(?:192\.168|10\.[0-9]{1,3}|172\.(?:1[6-9]|2[0-9]|3[01]))\.[0-9]{1,3}\.[0-9]{1,3}\b",
            "[PRIVATE_IP]",
        ),
        Rule::new(
            "AMOUNT",
            r"\$[0-9,]+(?:\.[0-9]{2})?",
            "[AMOUNT]",
        ),
        Rule::new(
            "LOCALHOST_PORT",
            r"localhost:[0-9]+",
            "localhost:[PORT]",
        ),
        Rule::new(
            "ENV_ASSIGNMENT",
            r"(?i)(?:STRIPE|OPENAI|ANTHROPIC|SERPAPI|TAVILY|GOOGLE)_[A-Za-z0-9_]*(?:KEY|SECRET|TOKEN)\s*[=:]\s*\S+",
            "[REDACTED_ENV]",
        ),
    ];

    static ref SHARED: Redactor = Redactor::new();
}

/// Upper bound on rule passes over one string.
const MAX_PASSES: usize = 8;

/// Redaction engine for secrets and PII in structured values
#[derive(Debug, Clone)]
pub struct Redactor {
    rules: Vec<Rule>,
}

impl Redactor {
    pub fn new() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }

    /// Process-wide instance with the built-in rules.
    pub fn shared() -> &'static Redactor {
        &SHARED
    }

    /// Deep-copy `value`, redacting every string it contains.
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.redact_str(s)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.redact(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.redact(v)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    pub fn redact_str(&self, input: &str) -> String {
        self.apply(input, None)
    }

    /// Like [`Redactor::redact`], also reporting how many matches each
    /// rule replaced across the whole value.
    pub fn redact_with_report(&self, value: &Value) -> (Value, Vec<RedactionInfo>) {
        let mut report = Vec::new();
        let redacted = self.walk_with_report(value, &mut report);
        (redacted, report)
    }

    fn walk_with_report(&self, value: &Value, report: &mut Vec<RedactionInfo>) -> Value {
        match value {
            Value::String(s) => Value::String(self.apply(s, Some(report))),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.walk_with_report(v, report))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.walk_with_report(v, report)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Apply the rule list until the output stops changing. A replacement
    /// can open a word boundary next to text an earlier rule skipped.
    fn apply(&self, input: &str, mut report: Option<&mut Vec<RedactionInfo>>) -> String {
        let mut result = input.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.apply_once(&result, report.as_deref_mut());
            if next == result {
                break;
            }
            result = next;
        }
        result
    }

    fn apply_once(&self, input: &str, mut report: Option<&mut Vec<RedactionInfo>>) -> String {
        let mut result = input.to_string();

        for rule in &self.rules {
            if !rule.pattern.is_match(&result) {
                continue;
            }

            if let Some(report) = report.as_deref_mut() {
                let count = rule.pattern.find_iter(&result).count();
                match report.iter_mut().find(|r| r.redaction_type == rule.name) {
                    Some(existing) => existing.count += count,
                    None => report.push(RedactionInfo {
                        redaction_type: rule.name.to_string(),
                        count,
                    }),
                }
            }

            result = rule
                .pattern
                .replace_all(&result, rule.replacement)
                .into_owned();
        }

        result
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLES: &[&str] = &[
        "sk_abcd1234567890123456789012",
        "Authorization: bearer_abcdefghijklmnopqrstuvwxyz0123",
        "sha 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08 ok",
        "contact marcus@example.com for access",
        "reading /Users/marcus/secrets.txt and /home/ops/.bashrc",
        "db at 192.168.1.20, cache at 10.0.0.7, api at 172.20.3.4",
        "invoice total $1,250.00 paid",
        "dev server on localhost:3000",
        "OPENAI_API_KEY=sk-proj-abc123",
        "STRIPE_SECRET: whsec_live",
        "nothing sensitive here",
        "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA/Users/bob",
    ];

    #[test]
    fn test_api_key_redaction() {
        let redacted = redact_value(json!({"api_key": "sk_abcd1234567890123456789012"}));
        assert_eq!(redacted["api_key"], "[REDACTED_KEY]");
    }

    #[test]
    fn test_long_blob_redaction() {
        let redactor = Redactor::new();
        assert_eq!(
            redactor.redact_str("sha 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08 ok"),
            "sha [REDACTED_TOKEN] ok"
        );
    }

    #[test]
    fn test_email_redaction() {
        let redacted = redact_value(json!({"from": "test@example.com"}));
        assert_eq!(redacted["from"], "[REDACTED_EMAIL]");
    }

    #[test]
    fn test_home_path_redaction() {
        let redactor = Redactor::new();
        assert_eq!(
            redactor.redact_str("/Users/marcus/secrets.txt"),
            "/Users/[USER]/secrets.txt"
        );
        assert_eq!(redactor.redact_str("/home/ops/.ssh"), "/home/[USER]/.ssh");
    }

    #[test]
    fn test_private_ip_and_amounts() {
        let redactor = Redactor::new();
        assert_eq!(
            redactor.redact_str("db at 192.168.1.20 charged $99.50"),
            "db at [PRIVATE_IP] charged [AMOUNT]"
        );
        assert_eq!(redactor.redact_str("public 8.8.8.8"), "public 8.8.8.8");
    }

    #[test]
    fn test_env_assignment_redaction() {
        let redactor = Redactor::new();
        assert_eq!(
            redactor.redact_str("export ANTHROPIC_API_KEY=abc123"),
            "export [REDACTED_ENV]"
        );
    }

    #[test]
    fn test_localhost_port() {
        let redactor = Redactor::new();
        assert_eq!(
            redactor.redact_str("listening on localhost:8080"),
            "listening on localhost:[PORT]"
        );
    }

    #[test]
    fn test_non_strings_pass_through() {
        let input = json!({"n": 42, "ok": true, "none": null, "f": 1.5});
        assert_eq!(redact_value(input.clone()), input);
    }

    #[test]
    fn test_nested_structures_are_walked() {
        let input = json!({
            "user": {"email": "a@b.io", "tags": ["ok", "token_ABCDEFGHIJKLMNOPQRSTUVWXYZ"]},
            "count": 3
        });
        let redacted = redact_value(input.clone());
        assert_eq!(redacted["user"]["email"], "[REDACTED_EMAIL]");
        assert_eq!(redacted["user"]["tags"][0], "ok");
        assert_eq!(redacted["user"]["tags"][1], "[REDACTED_KEY]");
        assert_eq!(redacted["count"], 3);
        // input untouched
        assert_eq!(input["user"]["email"], "a@b.io");
    }

    #[test]
    fn test_idempotent() {
        let redactor = Redactor::new();
        for sample in SAMPLES {
            let once = redactor.redact_str(sample);
            let twice = redactor.redact_str(&once);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }

        let value = json!({"samples": SAMPLES, "nested": {"k": SAMPLES[0]}});
        let once = redactor.redact(&value);
        assert_eq!(redactor.redact(&once), once);
    }

    #[test]
    fn test_replacement_boundaries_are_rescanned() {
        let redactor = Redactor::new();
        let input = "10.192.168.0OPENAI_token=_110.abcdefghij.@";
        let once = redactor.redact_str(input);
        assert_eq!(once, "[PRIVATE_IP][REDACTED_ENV]");
        assert_eq!(redactor.redact_str(&once), once);
    }

    #[test]
    fn test_no_secret_match_survives() {
        let redactor = Redactor::new();
        let key_rule = &DEFAULT_RULES[0].pattern;
        for sample in SAMPLES {
            let redacted = redactor.redact_str(sample);
            assert!(
                !key_rule.is_match(&redacted),
                "secret survived in {redacted:?}"
            );
        }
    }

    #[test]
    fn test_report_counts() {
        let redactor = Redactor::new();
        let (redacted, info) =
            redactor.redact_with_report(&json!(["a@b.io", "c@d.io and $5", "plain"]));

        assert_eq!(redacted[2], "plain");
        assert_eq!(
            info,
            vec![
                RedactionInfo {
                    redaction_type: "EMAIL".to_string(),
                    count: 2
                },
                RedactionInfo {
                    redaction_type: "AMOUNT".to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_no_secrets() {
        let redactor = Redactor::new();
        let (redacted, info) = redactor.redact_with_report(&json!("Just some normal text here"));
        assert_eq!(redacted, "Just some normal text here");
        assert!(info.is_empty());
    }

    fn redact_value(value: Value) -> Value {
        Redactor::new().redact(&value)
    }
}
