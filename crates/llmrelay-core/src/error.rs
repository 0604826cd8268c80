//! Error types for backends and the router.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four ways a backend call can fail, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Provider refused the request due to rate limits or exhausted quota.
    RateLimited,
    /// The call did not complete within the adapter's timeout.
    TimedOut,
    /// The credential was rejected.
    Unauthenticated,
    /// Any other provider-side or transport failure.
    Provider,
}

impl ErrorKind {
    /// Whether a repeated attempt against the same backend could succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::TimedOut | ErrorKind::Provider)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::RateLimited => write!(f, "rate limit"),
            ErrorKind::TimedOut => write!(f, "timeout"),
            ErrorKind::Unauthenticated => write!(f, "auth error"),
            ErrorKind::Provider => write!(f, "error"),
        }
    }
}

/// A classified failure reported by a single backend adapter.
#[derive(Debug, Clone, Error)]
#[error("{backend} {kind}: {message}")]
pub struct BackendError {
    /// Name of the backend that failed.
    pub backend: String,
    /// Classification used by the router's status machine.
    pub kind: ErrorKind,
    /// Raw provider message.
    pub message: String,
}

impl BackendError {
    pub fn new(backend: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == ErrorKind::RateLimited
    }
}

/// Unclassified failure straight out of a provider client.
///
/// Adapters turn these into [`BackendError`]s through their
/// [`ErrorClassifier`](crate::classify::ErrorClassifier).
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CallError {
    /// HTTP status, when the failure came back from the wire.
    pub status: Option<u16>,
    pub message: String,
}

impl CallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        // The URL may carry credentials and must not reach logs or classifiers.
        let err = err.without_url();
        // reqwest's Display for timeouts does not always say "timeout".
        let message = if err.is_timeout() {
            format!("request timeout: {err}")
        } else {
            err.to_string()
        };
        Self { status, message }
    }
}

/// One failed attempt inside an aggregate router failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub backend: String,
    pub message: String,
}

/// Errors surfaced by configuration resolution and by the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// No backend is both enabled and holding a credential.
    #[error("no usable backends: at least one enabled backend with an API key is required")]
    NoUsableBackends,

    /// Every attempted backend failed (skipped backends are not listed).
    #[error("all LLM backends failed. Errors: {}", summarize(.failures))]
    AllBackendsFailed { failures: Vec<AttemptFailure> },

    /// An enabled backend names a credential source that is not set.
    #[error("backend {backend}: API key environment variable {env_var} not set")]
    MissingCredential { backend: String, env_var: String },

    /// A configuration value is out of range or otherwise unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend type tag has no registered factory.
    #[error("unsupported backend type: {0}")]
    UnsupportedBackend(String),

    /// Named configuration preset does not exist.
    #[error("configuration preset '{name}' not found. Available: {available}")]
    UnknownPreset { name: String, available: String },

    /// Reading a configuration file failed.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing a configuration file failed.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn summarize(failures: &[AttemptFailure]) -> String {
    if failures.is_empty() {
        return "no backend was eligible".into();
    }
    failures
        .iter()
        .map(|f| format!("{}: {}", f.backend, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Router result type alias.
pub type RouterResult<T> = Result<T, RouterError>;

/// Backend result type alias.
pub type BackendResult<T> = Result<T, BackendError>;
