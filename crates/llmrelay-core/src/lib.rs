//! # llmrelay-core
//!
//! Multi-backend LLM request routing with ordered failover.
//!
//! This crate provides the building blocks for:
//! - Adapters for OpenAI, Anthropic and Google text-generation APIs
//! - Per-backend health tracking (status, counters, cooldowns)
//! - Priority-ordered failover across backends
//! - Concurrent background health probes
//! - TOML / environment configuration with named presets
//! - Observability via `tracing` and OpenTelemetry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llmrelay_core::{BackendConfig, Router, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RouterConfig::new(vec![
//!         BackendConfig::new("openai").api_key_env("OPENAI_API_KEY").priority(2),
//!         BackendConfig::new("anthropic").api_key_env("ANTHROPIC_API_KEY").priority(1),
//!     ]);
//!     let router = std::sync::Arc::new(Router::from_config(&config)?);
//!     let _monitor = router.spawn_health_monitor();
//!
//!     let generation = router.generate(&router.request("Summarize RFC 9110")).await?;
//!     println!("{} (via {})", generation.text, generation.backend);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod classify;
pub mod config;
pub mod error;
pub mod health;
pub mod registry;
pub mod request;
pub mod router;
pub mod telemetry;

#[cfg(test)]
mod testing;

// Re-exports
pub use backend::{BackendAdapter, BackendAdapterBuilder, ModelProviderClient};
pub use classify::{ClassifierRule, ErrorClassifier};
pub use config::{BackendConfig, RouterConfig, TelemetryConfig};
pub use error::{AttemptFailure, BackendError, CallError, ErrorKind, RouterError, RouterResult};
pub use health::{BackendHealth, BackendStats, BackendStatus};
pub use registry::{BackendFactory, BackendRegistry};
pub use request::{GenerateRequest, Generation};
pub use router::Router;
