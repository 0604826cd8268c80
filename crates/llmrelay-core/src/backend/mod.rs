//! Backend adapters, one per remote text-generation provider.
//!
//! A [`BackendAdapter`] composes a provider client (anything implementing
//! [`ModelProviderClient`]) with the bookkeeping every backend shares:
//! timeout, retries, error classification and a [`BackendHealth`] block.
//! The router only ever talks to adapters.

pub mod anthropic;
pub mod google;
mod http;
pub mod openai;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;

use crate::classify::ErrorClassifier;
use crate::error::{BackendError, BackendResult, CallError, ErrorKind};
use crate::health::{BackendHealth, DEFAULT_FAILURE_THRESHOLD};
use crate::request::GenerateRequest;

pub use anthropic::AnthropicClient;
pub use google::GoogleClient;
pub use openai::OpenAiClient;

/// Fixed timeout for health probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Trait for model provider implementations.
///
/// Implementations perform exactly one remote call per invocation and
/// report raw failures; timeouts, retries, classification and counters are
/// handled by [`BackendAdapter`].
#[async_trait]
pub trait ModelProviderClient: Send + Sync {
    /// Send a completion request for `request.prompt` against `model`.
    async fn chat_completion(
        &self,
        request: &GenerateRequest,
        model: &str,
    ) -> Result<String, CallError>;

    /// Minimal, low-cost liveness probe.
    async fn health_check(&self) -> Result<bool, CallError>;
}

/// A provider client plus its health bookkeeping.
pub struct BackendAdapter {
    name: String,
    client: Box<dyn ModelProviderClient>,
    default_model: String,
    max_retries: u32,
    timeout: Duration,
    retry_backoff: Duration,
    classifier: ErrorClassifier,
    health: BackendHealth,
}

impl std::fmt::Debug for BackendAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendAdapter")
            .field("name", &self.name)
            .field("default_model", &self.default_model)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("status", &self.health.status())
            .finish_non_exhaustive()
    }
}

impl BackendAdapter {
    pub fn builder(
        name: impl Into<String>,
        client: impl ModelProviderClient + 'static,
    ) -> BackendAdapterBuilder {
        BackendAdapterBuilder {
            name: name.into(),
            client: Box::new(client),
            default_model: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            classifier: ErrorClassifier::default(),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn health(&self) -> &BackendHealth {
        &self.health
    }

    /// Generate a completion, recording exactly one outcome in the counters.
    ///
    /// Timeouts and generic provider errors are retried up to `max_retries`
    /// times with exponential backoff; rate limits and auth failures return
    /// immediately so the router can move on.
    pub async fn generate(&self, request: &GenerateRequest) -> BackendResult<String> {
        let model = request
            .model
            .as_deref()
            .unwrap_or(self.default_model.as_str());
        let mut attempt: u32 = 0;

        loop {
            match self.call_once(request, model).await {
                Ok(text) => {
                    self.health.record_success();
                    return Ok(text);
                }
                Err(err) if err.kind.is_retryable() && attempt < self.max_retries => {
                    let delay = self.retry_backoff.saturating_mul(1u32 << attempt.min(16));
                    tracing::debug!(
                        backend = %self.name,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "Retrying backend call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    self.health.record_failure(err.kind);
                    return Err(err);
                }
            }
        }
    }

    async fn call_once(&self, request: &GenerateRequest, model: &str) -> BackendResult<String> {
        let call = AssertUnwindSafe(self.client.chat_completion(request, model)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(BackendError::new(
                &self.name,
                ErrorKind::TimedOut,
                format!("request timeout after {:?}", self.timeout),
            )),
            Ok(Err(panic)) => Err(BackendError::new(
                &self.name,
                ErrorKind::Provider,
                format!("provider client panicked: {}", panic_message(&*panic)),
            )),
            Ok(Ok(Err(err))) => Err(BackendError::new(
                &self.name,
                self.classifier.classify(&err),
                err.message,
            )),
            Ok(Ok(Ok(text))) => Ok(text),
        }
    }

    /// Probe the backend. Errors, timeouts and panics all count as `false`.
    ///
    /// Leaves the health block untouched; the router applies the outcome.
    pub async fn health_check(&self) -> bool {
        let probe = AssertUnwindSafe(self.client.health_check()).catch_unwind();
        match tokio::time::timeout(PROBE_TIMEOUT, probe).await {
            Ok(Ok(Ok(healthy))) => healthy,
            Ok(Ok(Err(err))) => {
                tracing::error!(backend = %self.name, error = %err, "Health check failed");
                false
            }
            Ok(Err(panic)) => {
                tracing::error!(
                    backend = %self.name,
                    panic = %panic_message(&*panic),
                    "Health check panicked"
                );
                false
            }
            Err(_) => {
                tracing::error!(backend = %self.name, "Health check timed out");
                false
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

/// Builder for [`BackendAdapter`].
pub struct BackendAdapterBuilder {
    name: String,
    client: Box<dyn ModelProviderClient>,
    default_model: String,
    max_retries: u32,
    timeout: Duration,
    retry_backoff: Duration,
    classifier: ErrorClassifier,
    failure_threshold: u32,
}

impl BackendAdapterBuilder {
    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn build(self) -> BackendAdapter {
        BackendAdapter {
            health: BackendHealth::with_threshold(self.name.clone(), self.failure_threshold),
            name: self.name,
            client: self.client,
            default_model: self.default_model,
            max_retries: self.max_retries,
            timeout: self.timeout,
            retry_backoff: self.retry_backoff,
            classifier: self.classifier,
        }
    }
}
