//! Backend registry: turns declared configurations into ordered adapters.

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{
    anthropic, google, openai, AnthropicClient, BackendAdapter, BackendAdapterBuilder,
    GoogleClient, OpenAiClient,
};
use crate::config::{BackendConfig, RouterConfig};
use crate::error::{RouterError, RouterResult};

/// Builds an adapter skeleton for one backend type.
///
/// Receives the backend name, its configuration and the resolved API key.
/// The registry applies the shared knobs (model override, retries, timeout,
/// failure threshold) afterwards.
pub type BackendFactory =
    Arc<dyn Fn(&str, &BackendConfig, &str) -> RouterResult<BackendAdapterBuilder> + Send + Sync>;

/// Map from backend type tag to factory.
#[derive(Clone)]
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl Default for BackendRegistry {
    /// Registry with the built-in `openai`, `anthropic` and `google` types.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("openai", |name, config, key| {
            let mut client = OpenAiClient::new(key);
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url).map_err(|e| bad_url(name, e))?;
            }
            Ok(BackendAdapter::builder(name, client).default_model(openai::DEFAULT_MODEL))
        });
        registry.register("anthropic", |name, config, key| {
            let mut client = AnthropicClient::new(key);
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url).map_err(|e| bad_url(name, e))?;
            }
            Ok(BackendAdapter::builder(name, client).default_model(anthropic::DEFAULT_MODEL))
        });
        registry.register("google", |name, config, key| {
            let mut client = GoogleClient::new(key);
            if let Some(url) = &config.base_url {
                client = client.with_base_url(url).map_err(|e| bad_url(name, e))?;
            }
            Ok(BackendAdapter::builder(name, client)
                .default_model(google::DEFAULT_MODEL)
                .classifier(google::classifier()))
        });
        registry
    }
}

fn bad_url(name: &str, err: url::ParseError) -> RouterError {
    RouterError::InvalidConfig(format!("backend {name}: invalid base_url: {err}"))
}

impl BackendRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for a type tag.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str, &BackendConfig, &str) -> RouterResult<BackendAdapterBuilder>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(kind.into().to_lowercase(), Arc::new(factory));
        self
    }

    /// Registered type tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Instantiate one backend.
    pub fn create(
        &self,
        config: &BackendConfig,
        api_key: &str,
        failure_threshold: u32,
    ) -> RouterResult<BackendAdapter> {
        let factory = self
            .factories
            .get(&config.kind.to_lowercase())
            .ok_or_else(|| RouterError::UnsupportedBackend(config.kind.clone()))?;

        let mut builder = factory(config.display_name(), config, api_key)?
            .max_retries(config.max_retries)
            .timeout(config.timeout())
            .failure_threshold(failure_threshold);
        if let Some(model) = &config.default_model {
            builder = builder.default_model(model.as_str());
        }
        Ok(builder.build())
    }

    /// Resolve against the process environment.
    pub fn resolve(&self, config: &RouterConfig) -> RouterResult<Vec<BackendAdapter>> {
        self.resolve_with(config, |var| std::env::var(var).ok())
    }

    /// Validate, filter, order and instantiate the configured backends.
    ///
    /// Enabled backends with a credential are kept and stably sorted by
    /// descending priority. An enabled backend whose key variable is unset
    /// fails the whole resolution. Backends that cannot be instantiated are
    /// logged and dropped.
    pub fn resolve_with<F>(
        &self,
        config: &RouterConfig,
        lookup: F,
    ) -> RouterResult<Vec<BackendAdapter>>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;

        let mut candidates = Vec::new();
        for backend in config.backends.iter().filter(|b| b.enabled) {
            match backend.resolve_credential(&lookup)? {
                Some(key) => candidates.push((backend, key)),
                None => tracing::debug!(
                    backend = backend.display_name(),
                    "Skipping backend without credential"
                ),
            }
        }
        if candidates.is_empty() {
            return Err(RouterError::NoUsableBackends);
        }

        // Stable: equal priorities keep declaration order.
        candidates.sort_by(|a, b| b.0.priority.cmp(&a.0.priority));

        let mut adapters = Vec::with_capacity(candidates.len());
        for (backend, key) in candidates {
            match self.create(backend, &key, config.failure_threshold) {
                Ok(adapter) => {
                    tracing::info!(
                        backend = adapter.name(),
                        priority = backend.priority,
                        model = adapter.default_model(),
                        "Backend configured"
                    );
                    adapters.push(adapter);
                }
                Err(err) => tracing::warn!(
                    backend = backend.display_name(),
                    error = %err,
                    "Failed to create backend, dropping it"
                ),
            }
        }

        if adapters.is_empty() {
            return Err(RouterError::NoUsableBackends);
        }
        Ok(adapters)
    }
}
