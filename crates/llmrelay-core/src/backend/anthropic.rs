//! Anthropic messages backend.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::http::{base_url, endpoint, merge_extra, send_json, text_at};
use super::ModelProviderClient;
use crate::error::CallError;
use crate::request::GenerateRequest;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/";
pub const DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
const PROBE_MODEL: &str = "claude-3-haiku-20240307";
const API_VERSION: &str = "2023-06-01";

/// Client for the Anthropic `/v1/messages` API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    base_url: Url,
    http: Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default URL"),
            http: Client::new(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self, url::ParseError> {
        self.base_url = base_url(url)?;
        Ok(self)
    }

    async fn messages(&self, body: serde_json::Value) -> Result<String, CallError> {
        let url = endpoint(&self.base_url, "v1/messages")?;
        let request = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION);
        let response = send_json(request, &body).await?;
        text_at(&response, "/content/0/text")
    }
}

#[async_trait]
impl ModelProviderClient for AnthropicClient {
    async fn chat_completion(
        &self,
        request: &GenerateRequest,
        model: &str,
    ) -> Result<String, CallError> {
        let mut body = json!({
            "model": model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        merge_extra(&mut body, &request.extra);

        tracing::debug!(model, "Sending Anthropic message");
        self.messages(body).await
    }

    async fn health_check(&self) -> Result<bool, CallError> {
        let body = json!({
            "model": PROBE_MODEL,
            "max_tokens": 5,
            "messages": [{"role": "user", "content": "test"}],
        });
        self.messages(body).await.map(|_| true)
    }
}
