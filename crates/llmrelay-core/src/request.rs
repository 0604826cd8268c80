//! Generation requests and results.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A single logical "generate text" request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// The input prompt, sent as a single user message.
    pub prompt: String,

    /// Model identifier; `None` lets each backend use its default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Additional provider-specific parameters, merged into the request body.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            extra: serde_json::Map::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Add a provider-specific parameter (e.g. `top_p`).
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// A successful generation and the backend that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub backend: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req = GenerateRequest::new("hello");
        assert_eq!(req.max_tokens, 4000);
        assert_eq!(req.temperature, 0.7);
        assert!(req.model.is_none());
        assert!(req.extra.is_empty());
    }

    #[test]
    fn test_request_deserialize_fills_defaults() {
        let req: GenerateRequest =
            serde_json::from_str(r#"{"prompt": "hi", "model": "gpt-4"}"#).unwrap();
        assert_eq!(req.model.as_deref(), Some("gpt-4"));
        assert_eq!(req.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(req.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_builder_collects_extras() {
        let req = GenerateRequest::new("hi")
            .max_tokens(16)
            .temperature(0.0)
            .extra("top_p", serde_json::json!(0.9));
        assert_eq!(req.max_tokens, 16);
        assert_eq!(req.extra["top_p"], serde_json::json!(0.9));
    }
}
