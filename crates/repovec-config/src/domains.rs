//! Business-domain classification rules.
//!
//! A chunk is tagged with a single coarse-grained domain chosen by ordered
//! case-insensitive substring match, first against the file path and then
//! against the content. The first matching tag wins; the iteration order of
//! the rule list is therefore part of the contract.

use serde::{Deserialize, Serialize};

/// Tag assigned when no rule matches.
pub const UNKNOWN_DOMAIN: &str = "unknown";

/// One classification rule: a tag and its trigger substrings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRule {
    /// Domain tag (e.g. "auth")
    pub tag: String,
    /// Case-insensitive substrings that select this tag
    pub keywords: Vec<String>,
}

/// Ordered list of domain rules.
///
/// Rules are evaluated in list order so classification is deterministic for
/// a given `(path, content, rules)` triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRules {
    rules: Vec<DomainRule>,
}

impl Default for DomainRules {
    fn default() -> Self {
        let rule = |tag: &str, keywords: &[&str]| DomainRule {
            tag: tag.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };

        Self {
            rules: vec![
                rule("auth", &["auth", "login", "token", "oauth", "session", "credential"]),
                rule("finance", &["payment", "billing", "invoice", "ledger", "finance", "price"]),
                rule("api", &["api", "endpoint", "handler", "route", "controller"]),
                rule("data", &["database", "storage", "repository", "schema", "migration"]),
                rule("messaging", &["queue", "kafka", "event", "publish", "subscribe"]),
                rule("infra", &["deploy", "docker", "kubernetes", "terraform", "helm", "pipeline"]),
                rule("ui", &["component", "view", "page", "widget", "frontend", "render"]),
                rule("testing", &["test", "mock", "fixture", "assert"]),
            ],
        }
    }
}

impl DomainRules {
    /// Build from an explicit ordered rule list.
    pub fn new(rules: Vec<DomainRule>) -> Self {
        Self { rules }
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the rule list is empty.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Classify a chunk by its path and content.
    ///
    /// The path is searched before the content so a file under `svc/auth/`
    /// is tagged `auth` even when the body mentions billing.
    pub fn classify(&self, file_path: &str, content: &str) -> String {
        let path = file_path.to_lowercase();
        let body = content.to_lowercase();

        for rule in &self.rules {
            for keyword in &rule.keywords {
                if path.contains(keyword.as_str()) {
                    return rule.tag.clone();
                }
            }
        }
        for rule in &self.rules {
            for keyword in &rule.keywords {
                if body.contains(keyword.as_str()) {
                    return rule.tag.clone();
                }
            }
        }

        UNKNOWN_DOMAIN.to_string()
    }

    /// All tags in rule order, for stats reporting.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.tag.as_str())
    }
}
