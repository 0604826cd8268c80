//! Error classification: maps heterogeneous provider failures onto
//! [`ErrorKind`].
//!
//! Providers rarely expose a stable typed error taxonomy, so classification
//! is an ordered list of substring rules evaluated against the lower-cased
//! error text. The first matching rule wins; no match means
//! [`ErrorKind::Provider`].

use crate::error::{CallError, ErrorKind};

/// One classification rule: any needle found in the message selects `kind`.
#[derive(Debug, Clone)]
pub struct ClassifierRule {
    needles: Vec<String>,
    kind: ErrorKind,
}

impl ClassifierRule {
    pub fn new<I, S>(needles: I, kind: ErrorKind) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            needles: needles
                .into_iter()
                .map(|n| n.into().to_lowercase())
                .collect(),
            kind,
        }
    }

    fn matches(&self, haystack: &str) -> bool {
        self.needles.iter().any(|n| haystack.contains(n.as_str()))
    }
}

/// Ordered rule list used by an adapter to classify its failures.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: vec![
                ClassifierRule::new(["rate_limit", "quota", "429"], ErrorKind::RateLimited),
                ClassifierRule::new(["timeout"], ErrorKind::TimedOut),
                ClassifierRule::new(
                    ["authentication", "api_key", "401"],
                    ErrorKind::Unauthenticated,
                ),
            ],
        }
    }
}

impl ErrorClassifier {
    /// A classifier with no rules; everything is [`ErrorKind::Provider`].
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule, evaluated after the existing ones.
    pub fn rule(mut self, rule: ClassifierRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Insert a rule ahead of the existing ones.
    pub fn prepend(mut self, rule: ClassifierRule) -> Self {
        self.rules.insert(0, rule);
        self
    }

    /// Classify a raw message.
    pub fn classify_message(&self, message: &str) -> ErrorKind {
        let lowered = message.to_lowercase();
        self.rules
            .iter()
            .find(|r| r.matches(&lowered))
            .map(|r| r.kind)
            .unwrap_or(ErrorKind::Provider)
    }

    /// Classify a provider failure, trusting a known HTTP status first.
    pub fn classify(&self, err: &CallError) -> ErrorKind {
        match err.status {
            Some(429) => ErrorKind::RateLimited,
            Some(401) | Some(403) => ErrorKind::Unauthenticated,
            Some(408) | Some(504) => ErrorKind::TimedOut,
            _ => self.classify_message(&err.message),
        }
    }
}
