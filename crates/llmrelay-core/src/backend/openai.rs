//! OpenAI chat completions backend.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::http::{base_url, endpoint, merge_extra, send_json, text_at};
use super::ModelProviderClient;
use crate::error::CallError;
use crate::request::GenerateRequest;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
const PROBE_MODEL: &str = "gpt-3.5-turbo";

/// Client for the OpenAI `/v1/chat/completions` API.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    base_url: Url,
    http: Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("valid default URL"),
            http: Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Point the client at a compatible endpoint (proxy, Azure gateway, mock).
    pub fn with_base_url(mut self, url: &str) -> Result<Self, url::ParseError> {
        self.base_url = base_url(url)?;
        Ok(self)
    }

    async fn complete(&self, body: serde_json::Value) -> Result<String, CallError> {
        let url = endpoint(&self.base_url, "v1/chat/completions")?;
        let request = self.http.post(url).bearer_auth(&self.api_key);
        let response = send_json(request, &body).await?;
        text_at(&response, "/choices/0/message/content")
    }
}

#[async_trait]
impl ModelProviderClient for OpenAiClient {
    async fn chat_completion(
        &self,
        request: &GenerateRequest,
        model: &str,
    ) -> Result<String, CallError> {
        let mut body = json!({
            "model": model,
            "messages": [{"role": "user", "content": request.prompt}],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });
        merge_extra(&mut body, &request.extra);

        tracing::debug!(model, "Sending OpenAI chat completion");
        self.complete(body).await
    }

    async fn health_check(&self) -> Result<bool, CallError> {
        let body = json!({
            "model": PROBE_MODEL,
            "messages": [{"role": "user", "content": "test"}],
            "max_tokens": 5,
        });
        self.complete(body).await.map(|_| true)
    }
}
