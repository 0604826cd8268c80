//! Model Router: ordered failover across backends.
//!
//! The router owns an ordered list of [`BackendAdapter`]s. Each request walks
//! the list once, skipping backends that are unavailable or cooling down
//! after a rate limit, and returns the first success. A background probe
//! loop moves backends in and out of rotation.

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::backend::BackendAdapter;
use crate::config::RouterConfig;
use crate::error::{AttemptFailure, RouterError, RouterResult};
use crate::health::BackendStats;
use crate::registry::BackendRegistry;
use crate::request::{GenerateRequest, Generation, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(300);

/// Routes generation requests across an ordered set of backends.
///
/// `Router` is `Send + Sync`; share it behind an `Arc` to run the health
/// monitor alongside request traffic.
#[derive(Debug)]
pub struct Router {
    backends: Vec<Arc<BackendAdapter>>,
    failover_enabled: bool,
    health_check_interval: Duration,
    rate_limit_cooldown: Duration,
    default_max_tokens: u32,
    default_temperature: f32,
    last_backend: Mutex<Option<String>>,
    last_health_check: Mutex<Option<DateTime<Utc>>>,
}

impl Router {
    /// Router over `backends`, tried in the given order.
    ///
    /// Names must be unique: results and probe maps are keyed by name.
    pub fn new(backends: Vec<BackendAdapter>) -> RouterResult<Self> {
        if backends.is_empty() {
            return Err(RouterError::NoUsableBackends);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = backends.iter().find(|b| !seen.insert(b.name())) {
            return Err(RouterError::InvalidConfig(format!(
                "duplicate backend name '{}'",
                dup.name()
            )));
        }
        Ok(Self {
            backends: backends.into_iter().map(Arc::new).collect(),
            failover_enabled: true,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            default_temperature: DEFAULT_TEMPERATURE,
            last_backend: Mutex::new(None),
            last_health_check: Mutex::new(None),
        })
    }

    /// Resolve `config` with the built-in backend types and the process env.
    pub fn from_config(config: &RouterConfig) -> RouterResult<Self> {
        Self::from_config_with(config, &BackendRegistry::default())
    }

    pub fn from_config_with(config: &RouterConfig, registry: &BackendRegistry) -> RouterResult<Self> {
        let backends = registry.resolve(config)?;
        Self::new(backends)?.with_config(config)
    }

    fn with_config(self, config: &RouterConfig) -> RouterResult<Self> {
        Ok(self
            .with_failover(config.failover_enabled)
            .with_health_check_interval(config.health_check_interval())?
            .with_rate_limit_cooldown(config.rate_limit_cooldown())
            .with_defaults(config.default_max_tokens, config.default_temperature))
    }

    pub fn with_failover(mut self, enabled: bool) -> Self {
        self.failover_enabled = enabled;
        self
    }

    /// Period of [`Router::auto_health_check`]. Must be non-zero.
    pub fn with_health_check_interval(mut self, interval: Duration) -> RouterResult<Self> {
        if interval.is_zero() {
            return Err(RouterError::InvalidConfig(
                "health check interval must be greater than zero".into(),
            ));
        }
        self.health_check_interval = interval;
        Ok(self)
    }

    pub fn with_rate_limit_cooldown(mut self, cooldown: Duration) -> Self {
        self.rate_limit_cooldown = cooldown;
        self
    }

    /// Defaults applied by [`Router::request`].
    pub fn with_defaults(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }

    pub fn failover_enabled(&self) -> bool {
        self.failover_enabled
    }

    pub fn health_check_interval(&self) -> Duration {
        self.health_check_interval
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        self.rate_limit_cooldown
    }

    /// A request for `prompt` seeded with this router's defaults.
    pub fn request(&self, prompt: impl Into<String>) -> GenerateRequest {
        GenerateRequest::new(prompt)
            .max_tokens(self.default_max_tokens)
            .temperature(self.default_temperature)
    }

    /// Route a request through the backends in order.
    ///
    /// Returns the first successful completion together with the name of the
    /// backend that produced it. Fails with [`RouterError::AllBackendsFailed`]
    /// when every backend was skipped or failed.
    pub async fn generate(&self, request: &GenerateRequest) -> RouterResult<Generation> {
        let span = tracing::info_span!(
            "generate",
            request_id = %Uuid::new_v4(),
            prompt_chars = request.prompt.chars().count()
        );
        self.route(request).instrument(span).await
    }

    async fn route(&self, request: &GenerateRequest) -> RouterResult<Generation> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            let health = backend.health();
            if !health.is_eligible(self.rate_limit_cooldown) {
                tracing::debug!(
                    backend = backend.name(),
                    status = %health.status(),
                    "Skipping ineligible backend"
                );
                continue;
            }

            tracing::debug!(
                backend = backend.name(),
                attempt = failures.len() + 1,
                "Trying backend"
            );
            match backend.generate(request).await {
                Ok(text) => {
                    tracing::info!(backend = backend.name(), "Generated response");
                    *self.last_backend.lock() = Some(backend.name().to_string());
                    return Ok(Generation {
                        text,
                        backend: backend.name().to_string(),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        backend = backend.name(),
                        kind = %err.kind,
                        error = %err.message,
                        "Backend failed"
                    );
                    failures.push(AttemptFailure {
                        backend: err.backend,
                        message: format!("{}: {}", err.kind, err.message),
                    });
                }
            }

            if !self.failover_enabled {
                break;
            }
        }

        tracing::error!(attempted = failures.len(), "All backends failed");
        Err(RouterError::AllBackendsFailed { failures })
    }

    /// Probe every backend concurrently and apply the outcomes.
    ///
    /// Never fails: a probe that errors, panics or times out counts as
    /// `false` and marks the backend unavailable.
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let probes = self.backends.iter().map(|backend| async move {
            let healthy = backend.health_check().await;
            backend.health().record_probe(healthy);
            (backend.name().to_string(), healthy)
        });
        let results: BTreeMap<String, bool> = join_all(probes).await.into_iter().collect();

        *self.last_health_check.lock() = Some(Utc::now());
        tracing::info!(
            healthy = results.values().filter(|ok| **ok).count(),
            total = results.len(),
            "Health check completed"
        );
        results
    }

    /// Probe one backend by name. `None` if no such backend exists.
    pub async fn health_check(&self, name: &str) -> Option<bool> {
        let backend = self.backend(name)?;
        let healthy = backend.health_check().await;
        backend.health().record_probe(healthy);
        Some(healthy)
    }

    /// Probe all backends every `health_check_interval`, forever.
    ///
    /// Stops only when the future is dropped or its task aborted.
    pub async fn auto_health_check(&self) {
        let mut interval = tokio::time::interval(self.health_check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; wait a full period first.
        interval.tick().await;

        loop {
            interval.tick().await;
            let cycle = AssertUnwindSafe(self.health_check_all()).catch_unwind();
            if cycle.await.is_err() {
                tracing::error!("Health check cycle panicked; continuing");
            }
        }
    }

    /// Spawn [`Router::auto_health_check`] on the current runtime.
    pub fn spawn_health_monitor(self: &Arc<Self>) -> JoinHandle<()> {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = router.health_check_interval.as_secs(),
                "Starting health monitor"
            );
            router.auto_health_check().await;
        })
    }

    /// Counters for every backend, in routing order.
    pub fn provider_stats(&self) -> Vec<BackendStats> {
        self.backends.iter().map(|b| b.health().snapshot()).collect()
    }

    /// Backends whose status is exactly `Healthy`.
    pub fn healthy_backends(&self) -> Vec<Arc<BackendAdapter>> {
        self.backends
            .iter()
            .filter(|b| b.health().is_healthy())
            .cloned()
            .collect()
    }

    pub fn backends(&self) -> &[Arc<BackendAdapter>] {
        &self.backends
    }

    pub fn backend(&self, name: &str) -> Option<&Arc<BackendAdapter>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// Name of the backend that served the most recent successful request.
    pub fn last_backend(&self) -> Option<String> {
        self.last_backend.lock().clone()
    }

    /// When the last probe cycle finished.
    pub fn last_health_check(&self) -> Option<DateTime<Utc>> {
        *self.last_health_check.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use crate::error::ErrorKind;
    use crate::health::BackendStatus;
    use crate::testing::{MockProvider, Probe, Step};
    use pretty_assertions::assert_eq;

    fn router(backends: Vec<BackendAdapter>) -> Router {
        Router::new(backends).unwrap()
    }

    #[test]
    fn test_empty_router_rejected() {
        assert!(matches!(
            Router::new(vec![]).unwrap_err(),
            RouterError::NoUsableBackends
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Router::new(vec![
            MockProvider::ok("a").adapter("same"),
            MockProvider::ok("b").adapter("other"),
            MockProvider::ok("c").adapter("same"),
        ])
        .unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfig(ref msg) if msg.contains("'same'")));
    }

    #[test]
    fn test_zero_health_check_interval_rejected() {
        let err = router(vec![MockProvider::ok("x").adapter("a")])
            .with_health_check_interval(Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, RouterError::InvalidConfig(_)));

        let router = router(vec![MockProvider::ok("x").adapter("a")])
            .with_health_check_interval(Duration::from_secs(5))
            .unwrap();
        assert_eq!(router.health_check_interval(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_failover_to_secondary() {
        let primary = MockProvider::failing("connection refused");
        let secondary = MockProvider::ok("from secondary");
        let router = router(vec![primary.adapter("Primary"), secondary.adapter("Secondary")]);

        let generation = router.generate(&router.request("hello")).await.unwrap();
        assert_eq!(generation.text, "from secondary");
        assert_eq!(generation.backend, "Secondary");
        assert_eq!(router.backends()[0].health().total_requests(), 1);
        assert_eq!(router.backends()[1].health().total_requests(), 1);
        assert_eq!(router.last_backend().as_deref(), Some("Secondary"));
    }

    #[tokio::test]
    async fn test_all_backends_failed_names_each_attempt() {
        let router = router(vec![
            MockProvider::failing("boom").adapter("A"),
            MockProvider::failing("quota exceeded").adapter("B"),
        ]);

        let err = router.generate(&router.request("hello")).await.unwrap_err();
        let RouterError::AllBackendsFailed { failures } = &err else {
            panic!("unexpected error: {err}");
        };
        let names: Vec<&str> = failures.iter().map(|f| f.backend.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(
            err.to_string(),
            "all LLM backends failed. Errors: A: error: boom; B: rate limit: quota exceeded"
        );
        assert!(router.last_backend().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_skipped() {
        let x = MockProvider::ok("from x");
        let router = router(vec![x.adapter("X"), MockProvider::ok("from y").adapter("Y")]);
        router.backends()[0]
            .health()
            .force_status(BackendStatus::Unavailable);

        let generation = router.generate(&router.request("hello")).await.unwrap();
        assert_eq!(generation.backend, "Y");
        assert_eq!(router.backends()[0].health().total_requests(), 0);
        assert_eq!(x.calls(), 0);
    }

    #[tokio::test]
    async fn test_stop_on_first_success() {
        let first = MockProvider::failing("boom");
        let second = MockProvider::ok("two");
        let third = MockProvider::ok("three");
        let router = router(vec![
            first.adapter("first"),
            second.adapter("second"),
            third.adapter("third"),
        ]);

        let generation = router.generate(&router.request("hello")).await.unwrap();
        assert_eq!(generation.backend, "second");
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[tokio::test]
    async fn test_skipped_backends_not_listed() {
        let router = router(vec![
            MockProvider::ok("never").adapter("down"),
            MockProvider::failing("boom").adapter("tried"),
        ]);
        router.backends()[0]
            .health()
            .force_status(BackendStatus::Unavailable);

        let err = router.generate(&router.request("hello")).await.unwrap_err();
        let RouterError::AllBackendsFailed { failures } = err else {
            panic!("expected AllBackendsFailed");
        };
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].backend, "tried");
    }

    #[tokio::test]
    async fn test_everything_skipped_is_all_failed_with_no_attempts() {
        let router = router(vec![MockProvider::ok("never").adapter("down")]);
        router.backends()[0]
            .health()
            .force_status(BackendStatus::Unavailable);

        let err = router.generate(&router.request("hello")).await.unwrap_err();
        assert!(matches!(
            err,
            RouterError::AllBackendsFailed { ref failures } if failures.is_empty()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_cooldown_window() {
        let limited = MockProvider::scripted(vec![
            Step::Fail("429 too many requests".into()),
            Step::Reply("back again".into()),
        ]);
        let router = router(vec![
            limited.adapter("limited"),
            MockProvider::ok("fallback").adapter("fallback"),
        ]);

        // T: rate limited, served by the fallback.
        let first = router.generate(&router.request("1")).await.unwrap();
        assert_eq!(first.backend, "fallback");
        assert_eq!(
            router.backends()[0].health().status(),
            BackendStatus::RateLimited
        );

        // Still inside the window.
        tokio::time::advance(Duration::from_secs(299)).await;
        let second = router.generate(&router.request("2")).await.unwrap();
        assert_eq!(second.backend, "fallback");
        assert_eq!(limited.calls(), 1);

        // Exactly T + 5 min: eligible again, no probe needed.
        tokio::time::advance(Duration::from_secs(1)).await;
        let third = router.generate(&router.request("3")).await.unwrap();
        assert_eq!(third.backend, "limited");
        assert_eq!(third.text, "back again");
        assert_eq!(
            router.backends()[0].health().status(),
            BackendStatus::Healthy
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_cooldown() {
        let limited = MockProvider::failing("rate_limit_exceeded");
        let router = router(vec![
            limited.adapter("limited"),
            MockProvider::ok("fallback").adapter("fallback"),
        ])
        .with_rate_limit_cooldown(Duration::from_secs(10));

        router.generate(&router.request("1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        router.generate(&router.request("2")).await.unwrap();
        assert_eq!(limited.calls(), 2);
    }

    #[tokio::test]
    async fn test_success_recovers_degraded_backend() {
        let router = router(vec![MockProvider::ok("fine").adapter("b")]);
        let health = router.backends()[0].health();
        health.record_failure(ErrorKind::Provider);
        assert_eq!(health.status(), BackendStatus::Degraded);

        router.generate(&router.request("x")).await.unwrap();
        assert_eq!(health.status(), BackendStatus::Healthy);
    }

    #[tokio::test]
    async fn test_probe_recovers_rate_limited_backend_early() {
        let router = router(vec![MockProvider::ok("fine").adapter("b")]);
        let health = router.backends()[0].health();
        health.record_failure(ErrorKind::RateLimited);
        assert!(health.in_cooldown(router.rate_limit_cooldown()));

        assert_eq!(router.health_check("b").await, Some(true));
        assert_eq!(health.status(), BackendStatus::Healthy);
        let generation = router.generate(&router.request("x")).await.unwrap();
        assert_eq!(generation.backend, "b");
    }

    #[tokio::test]
    async fn test_failover_disabled_tries_only_first_eligible() {
        let first = MockProvider::failing("boom");
        let second = MockProvider::ok("unused");
        let router = router(vec![first.adapter("first"), second.adapter("second")])
            .with_failover(false);

        let err = router.generate(&router.request("hello")).await.unwrap_err();
        assert!(err.to_string().contains("first"));
        assert_eq!(second.calls(), 0);

        // A skipped backend does not use up the single attempt.
        router.backends()[0]
            .health()
            .force_status(BackendStatus::Unavailable);
        let generation = router.generate(&router.request("hello")).await.unwrap();
        assert_eq!(generation.backend, "second");
    }

    #[tokio::test]
    async fn test_health_check_all_captures_each_probe() {
        let router = router(vec![
            MockProvider::ok("x").adapter("A"),
            MockProvider::ok("x").with_probe(Probe::Error).adapter("B"),
            MockProvider::ok("x").with_probe(Probe::Panic).adapter("C"),
            MockProvider::ok("x").with_probe(Probe::Unhealthy).adapter("D"),
        ]);
        assert!(router.last_health_check().is_none());

        let results = router.health_check_all().await;
        let expected: BTreeMap<String, bool> = [("A", true), ("B", false), ("C", false), ("D", false)]
            .into_iter()
            .map(|(name, ok)| (name.to_string(), ok))
            .collect();
        assert_eq!(results, expected);

        assert_eq!(router.backends()[0].health().status(), BackendStatus::Healthy);
        for backend in &router.backends()[1..] {
            assert_eq!(backend.health().status(), BackendStatus::Unavailable);
            assert_eq!(backend.health().total_requests(), 0);
        }
        assert!(router.last_health_check().is_some());

        let healthy: Vec<String> = router
            .healthy_backends()
            .iter()
            .map(|b| b.name().to_string())
            .collect();
        assert_eq!(healthy, vec!["A".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_recovers_unavailable_backend() {
        let mock = MockProvider::failing("boom").with_probe(Probe::Healthy);
        let router = router(vec![mock.adapter("flaky")]);
        for _ in 0..3 {
            let _ = router.generate(&router.request("x")).await;
        }
        let health = router.backends()[0].health();
        assert_eq!(health.status(), BackendStatus::Unavailable);

        router.health_check_all().await;
        assert_eq!(health.status(), BackendStatus::Healthy);
        assert_eq!(health.consecutive_failures(), 0);
        assert_eq!(health.total_requests(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_concurrently() {
        let router = router(vec![
            MockProvider::ok("x").with_probe(Probe::Hang).adapter("slow-1"),
            MockProvider::ok("x").with_probe(Probe::Hang).adapter("slow-2"),
            MockProvider::ok("x").adapter("fast"),
        ]);

        let started = tokio::time::Instant::now();
        let results = router.health_check_all().await;
        // Two hanging probes each time out after 5s; sequentially that
        // would be 10s.
        assert!(started.elapsed() < Duration::from_secs(6));
        assert_eq!(results["fast"], true);
        assert_eq!(results["slow-1"], false);
        assert_eq!(results["slow-2"], false);
    }

    #[tokio::test]
    async fn test_single_backend_probe() {
        let router = router(vec![MockProvider::ok("x")
            .with_probe(Probe::Unhealthy)
            .adapter("only")]);

        assert_eq!(router.health_check("missing").await, None);
        assert_eq!(router.health_check("only").await, Some(false));
        assert_eq!(
            router.backends()[0].health().status(),
            BackendStatus::Unavailable
        );
        // Single probes do not count as a full cycle.
        assert!(router.last_health_check().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_monitor_runs_on_interval() {
        let mock = MockProvider::ok("x");
        let router = Arc::new(
            router(vec![mock.adapter("watched")])
                .with_health_check_interval(Duration::from_secs(60))
                .unwrap(),
        );
        let handle = router.spawn_health_monitor();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(mock.probes(), 0);

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(mock.probes(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(mock.probes(), 2);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(mock.probes(), 2);
    }

    #[tokio::test]
    async fn test_provider_stats() {
        let router = router(vec![
            MockProvider::failing("boom").adapter("bad"),
            MockProvider::ok("fine").adapter("good"),
        ]);
        router.generate(&router.request("x")).await.unwrap();

        let stats = router.provider_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "bad");
        assert_eq!(stats[0].status, BackendStatus::Degraded);
        assert_eq!(stats[0].success_rate, 0.0);
        assert_eq!(stats[1].name, "good");
        assert_eq!(stats[1].success_rate, 1.0);
        assert_eq!(stats[1].successful_requests, 1);
    }

    #[tokio::test]
    async fn test_request_uses_router_defaults() {
        let router = router(vec![MockProvider::ok("x").adapter("a")]).with_defaults(256, 0.2);
        let request = router.request("hi");
        assert_eq!(request.max_tokens, 256);
        assert_eq!(request.temperature, 0.2);
        assert!(request.model.is_none());
    }

    #[test]
    fn test_from_config_with_registry() {
        let mut registry = BackendRegistry::empty();
        registry.register("mock", |name, _config, _key| {
            Ok(BackendAdapter::builder(name, MockProvider::ok(name)))
        });
        let mut config = RouterConfig::new(vec![
            BackendConfig::new("mock").name("second").api_key("k").priority(1),
            BackendConfig::new("mock").name("first").api_key("k").priority(2),
        ]);
        config.failover_enabled = false;
        config.rate_limit_cooldown_secs = 42;

        let router = Router::from_config_with(&config, &registry).unwrap();
        let names: Vec<&str> = router.backends().iter().map(|b| b.name()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert!(!router.failover_enabled());
        assert_eq!(router.rate_limit_cooldown(), Duration::from_secs(42));
        assert_eq!(router.health_check_interval(), Duration::from_secs(60));
    }
}
