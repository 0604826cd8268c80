//! Configuration for the router and its backends.
//!
//! Typically stored at `~/.llmrelay/config.toml`:
//!
//! ```toml
//! failover_enabled = true
//! health_check_interval_secs = 60
//!
//! [[backends]]
//! type = "openai"
//! api_key_env = "OPENAI_API_KEY"
//! priority = 2
//!
//! [[backends]]
//! type = "anthropic"
//! api_key_env = "ANTHROPIC_API_KEY"
//! priority = 1
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RouterError, RouterResult};
use crate::health::DEFAULT_FAILURE_THRESHOLD;
use crate::request::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "LLMRELAY_CONFIG";

/// Names accepted by [`RouterConfig::preset`].
pub const PRESET_NAMES: &[&str] = &["openai-only", "openai-anthropic-failover", "multi-provider"];

/// Configuration for a single backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type tag (e.g. "openai", "anthropic", "google").
    #[serde(rename = "type")]
    pub kind: String,

    /// Display name; defaults to the type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// API key supplied inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Higher priority is tried first.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,

    /// Override the provider endpoint (proxies, gateways).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_secs() -> f64 {
    30.0
}

impl BackendConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            api_key: None,
            api_key_env: None,
            priority: 0,
            enabled: true,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            default_model: None,
            base_url: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.api_key_env = Some(var.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn timeout_secs(mut self, secs: f64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Name the backend will carry in the router.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    /// Resolve the credential: inline key first, then the named variable.
    ///
    /// Returns `Ok(None)` when neither is configured and
    /// [`RouterError::MissingCredential`] when the named variable is unset.
    pub fn resolve_credential<F>(&self, lookup: F) -> RouterResult<Option<String>>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(Some(key.clone()));
        }
        match &self.api_key_env {
            Some(var) => match lookup(var).filter(|k| !k.is_empty()) {
                Some(key) => Ok(Some(key)),
                None => Err(RouterError::MissingCredential {
                    backend: self.display_name().to_string(),
                    env_var: var.clone(),
                }),
            },
            None => Ok(None),
        }
    }

    fn validate(&self) -> RouterResult<()> {
        if self.kind.trim().is_empty() {
            return Err(RouterError::InvalidConfig("backend type must not be empty".into()));
        }
        if self.max_retries > 10 {
            return Err(RouterError::InvalidConfig(format!(
                "backend {}: max_retries must be <= 10, got {}",
                self.display_name(),
                self.max_retries
            )));
        }
        if !(self.timeout_secs > 0.0 && self.timeout_secs <= 300.0) {
            return Err(RouterError::InvalidConfig(format!(
                "backend {}: timeout_secs must be in (0, 300], got {}",
                self.display_name(),
                self.timeout_secs
            )));
        }
        Ok(())
    }
}

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Emit JSON log lines instead of human-readable ones.
    #[serde(default)]
    pub json: bool,

    /// Log filter directive; `RUST_LOG` takes precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    /// Export spans over OTLP.
    #[serde(default)]
    pub otlp_enabled: bool,

    /// OTLP exporter endpoint.
    #[serde(default = "default_otlp_endpoint")]
    pub otlp_endpoint: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json: false,
            filter: None,
            otlp_enabled: false,
            otlp_endpoint: default_otlp_endpoint(),
        }
    }
}

fn default_otlp_endpoint() -> String {
    "http://localhost:4317".into()
}

/// Complete router configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// When false only the first eligible backend is tried.
    #[serde(default = "default_true")]
    pub failover_enabled: bool,

    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// How long a rate-limited backend is skipped.
    #[serde(default = "default_rate_limit_cooldown")]
    pub rate_limit_cooldown_secs: u64,

    /// Consecutive failures before a backend is marked unavailable.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_health_check_interval() -> u64 {
    60
}

fn default_rate_limit_cooldown() -> u64 {
    300
}

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            failover_enabled: true,
            health_check_interval_secs: default_health_check_interval(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown(),
            failure_threshold: default_failure_threshold(),
            default_max_tokens: default_max_tokens(),
            default_temperature: default_temperature(),
            backends: Vec::new(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl RouterConfig {
    pub fn new(backends: Vec<BackendConfig>) -> Self {
        Self {
            backends,
            ..Self::default()
        }
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    /// Check value ranges and name uniqueness.
    ///
    /// Credential availability is checked later, during resolution.
    pub fn validate(&self) -> RouterResult<()> {
        if !(10..=3600).contains(&self.health_check_interval_secs) {
            return Err(RouterError::InvalidConfig(format!(
                "health_check_interval_secs must be in 10..=3600, got {}",
                self.health_check_interval_secs
            )));
        }
        if !(1..=32000).contains(&self.default_max_tokens) {
            return Err(RouterError::InvalidConfig(format!(
                "default_max_tokens must be in 1..=32000, got {}",
                self.default_max_tokens
            )));
        }
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(RouterError::InvalidConfig(format!(
                "default_temperature must be in 0.0..=2.0, got {}",
                self.default_temperature
            )));
        }
        if self.failure_threshold == 0 {
            return Err(RouterError::InvalidConfig(
                "failure_threshold must be at least 1".into(),
            ));
        }

        let mut names = HashSet::new();
        for backend in &self.backends {
            backend.validate()?;
            if backend.enabled && !names.insert(backend.display_name()) {
                return Err(RouterError::InvalidConfig(format!(
                    "duplicate backend name '{}'; set `name` to tell them apart",
                    backend.display_name()
                )));
            }
        }
        Ok(())
    }

    /// Parse from TOML text.
    pub fn from_toml_str(text: &str) -> RouterResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> RouterResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RouterError::InvalidConfig(format!("cannot serialize config: {e}")))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> RouterResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// `$LLMRELAY_CONFIG`, else `~/.llmrelay/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs_next::home_dir().map(|home| home.join(".llmrelay").join("config.toml"))
    }

    /// Build a configuration from the process environment.
    ///
    /// Reads `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GOOGLE_API_KEY`,
    /// `LLM_PROVIDER_PRIORITY` and `LLM_FAILOVER_ENABLED`.
    pub fn from_env() -> Self {
        Self::from_env_with(|var| std::env::var(var).ok())
    }

    /// [`RouterConfig::from_env`] with an injectable variable lookup.
    ///
    /// Backends whose key variable is unset are left out; earlier entries
    /// in `LLM_PROVIDER_PRIORITY` get higher priority.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let order = lookup("LLM_PROVIDER_PRIORITY")
            .unwrap_or_else(|| "openai,anthropic,google".into());
        // Repeated entries keep their first position.
        let mut deduped: Vec<String> = Vec::new();
        for kind in order.split(',').map(|s| s.trim().to_lowercase()) {
            if !kind.is_empty() && !deduped.contains(&kind) {
                deduped.push(kind);
            }
        }
        let order = deduped;

        let mut backends = Vec::new();
        for (idx, kind) in order.iter().enumerate() {
            let var = match kind.as_str() {
                "openai" => "OPENAI_API_KEY",
                "anthropic" => "ANTHROPIC_API_KEY",
                "google" => "GOOGLE_API_KEY",
                other => {
                    tracing::warn!(backend = other, "Unknown backend in LLM_PROVIDER_PRIORITY");
                    continue;
                }
            };
            if let Some(key) = lookup(var).filter(|k| !k.is_empty()) {
                let priority = (order.len() - idx) as i32;
                backends.push(BackendConfig::new(kind.as_str()).api_key(key).priority(priority));
            }
        }

        let failover_enabled = lookup("LLM_FAILOVER_ENABLED")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Self {
            failover_enabled,
            ..Self::new(backends)
        }
    }

    /// A named example configuration reading keys from the usual variables.
    pub fn preset(name: &str) -> RouterResult<Self> {
        let config = match name {
            "openai-only" => Self {
                failover_enabled: false,
                ..Self::new(vec![BackendConfig::new("openai")
                    .api_key_env("OPENAI_API_KEY")
                    .priority(1)])
            },
            "openai-anthropic-failover" => Self::new(vec![
                BackendConfig::new("openai")
                    .api_key_env("OPENAI_API_KEY")
                    .priority(2),
                BackendConfig::new("anthropic")
                    .api_key_env("ANTHROPIC_API_KEY")
                    .priority(1),
            ]),
            "multi-provider" => Self::new(vec![
                BackendConfig::new("openai")
                    .api_key_env("OPENAI_API_KEY")
                    .priority(3)
                    .max_retries(3)
                    .timeout_secs(30.0),
                BackendConfig::new("anthropic")
                    .api_key_env("ANTHROPIC_API_KEY")
                    .priority(2)
                    .max_retries(3)
                    .timeout_secs(30.0),
                BackendConfig::new("google")
                    .api_key_env("GOOGLE_API_KEY")
                    .priority(1)
                    .max_retries(2)
                    .timeout_secs(20.0),
            ]),
            other => {
                return Err(RouterError::UnknownPreset {
                    name: other.to_string(),
                    available: PRESET_NAMES.join(", "),
                })
            }
        };
        Ok(config)
    }
}
