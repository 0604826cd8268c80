//! Google Gemini `generateContent` backend.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use url::Url;

use super::http::{base_url, endpoint, merge_extra, send_json, text_at};
use super::ModelProviderClient;
use crate::classify::{ClassifierRule, ErrorClassifier};
use crate::error::{CallError, ErrorKind};
use crate::request::GenerateRequest;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_MODEL: &str = "gemini-pro";

/// Client for the Gemini REST API.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    base_url: Url,
    http: Client,
    api_key: String,
}

/// Gemini reports throttling as "Rate exceeded" or `RESOURCE_EXHAUSTED`.
pub fn classifier() -> ErrorClassifier {
    ErrorClassifier::default().rule(ClassifierRule::new(
        ["rate exceeded", "rate limit", "resource_exhausted"],
        ErrorKind::RateLimited,
    ))
}

impl GoogleClient {
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

    async fn generate_content(
        &self,
        model: &str,
        body: serde_json::Value,
    ) -> Result<String, CallError> {
        let url = endpoint(&self.base_url, &format!("v1beta/models/{model}:generateContent"))?;
        let request = self.http.post(url).header("x-goog-api-key", &self.api_key);
        let response = send_json(request, &body).await?;
        text_at(&response, "/candidates/0/content/parts/0/text")
    }
}

#[async_trait]
impl ModelProviderClient for GoogleClient {
    async fn chat_completion(
        &self,
        request: &GenerateRequest,
        model: &str,
    ) -> Result<String, CallError> {
        let mut generation_config = json!({
            "maxOutputTokens": request.max_tokens,
            "temperature": request.temperature,
        });
        merge_extra(&mut generation_config, &request.extra);
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": request.prompt}]}],
            "generationConfig": generation_config,
        });

        tracing::debug!(model, "Sending Gemini generateContent");
        self.generate_content(model, body).await
    }

    async fn health_check(&self) -> Result<bool, CallError> {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"text": "test"}]}],
        });
        self.generate_content(DEFAULT_MODEL, body).await.map(|_| true)
    }
}
