//! Shared reqwest plumbing for the HTTP provider clients.

use reqwest::RequestBuilder;
use serde_json::Value;
use url::Url;

use crate::error::CallError;

/// Parse a base URL, making sure relative joins append to its path.
pub(crate) fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, CallError> {
    base.join(path)
        .map_err(|e| CallError::new(format!("invalid endpoint {path}: {e}")))
}

/// Merge caller-supplied parameters into a JSON request body.
pub(crate) fn merge_extra(body: &mut Value, extra: &serde_json::Map<String, Value>) {
    if let Value::Object(map) = body {
        for (key, value) in extra {
            map.insert(key.clone(), value.clone());
        }
    }
}

/// Send a JSON request and decode a JSON response.
///
/// Non-2xx responses become a [`CallError`] carrying the status and the
/// provider's own error message when the body has one.
pub(crate) async fn send_json(request: RequestBuilder, body: &Value) -> Result<Value, CallError> {
    let response = request.json(body).send().await?;
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| error_message(&v))
            .unwrap_or(text);
        return Err(CallError::with_status(
            status.as_u16(),
            format!("HTTP {}: {}", status.as_u16(), detail),
        ));
    }

    Ok(response.json::<Value>().await?)
}

/// Pull `error.message` (OpenAI, Anthropic, Google all use this shape).
fn error_message(body: &Value) -> Option<String> {
    let error = body.get("error")?;
    let message = error.get("message").and_then(Value::as_str)?;
    match error.get("type").or_else(|| error.get("status")).and_then(Value::as_str) {
        Some(kind) => Some(format!("{kind}: {message}")),
        None => Some(message.to_string()),
    }
}

/// Walk a JSON pointer to a string, or explain what was missing.
pub(crate) fn text_at(body: &Value, pointer: &str) -> Result<String, CallError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CallError::new(format!("malformed response: missing {pointer}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_keeps_path_prefix() {
        let base = base_url("https://proxy.example.com/openai").unwrap();
        let url = endpoint(&base, "v1/chat/completions").unwrap();
        assert_eq!(url.as_str(), "https://proxy.example.com/openai/v1/chat/completions");
    }

    #[test]
    fn test_error_message_shapes() {
        let openai = json!({"error": {"message": "Rate limit reached", "type": "rate_limit_error"}});
        assert_eq!(
            error_message(&openai).as_deref(),
            Some("rate_limit_error: Rate limit reached")
        );

        let google = json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}});
        assert_eq!(
            error_message(&google).as_deref(),
            Some("RESOURCE_EXHAUSTED: Quota exceeded")
        );

        assert!(error_message(&json!({"ok": true})).is_none());
    }

    #[test]
    fn test_merge_extra_overrides() {
        let mut body = json!({"model": "a", "temperature": 0.7});
        let mut extra = serde_json::Map::new();
        extra.insert("temperature".into(), json!(0.1));
        extra.insert("top_p".into(), json!(0.5));
        merge_extra(&mut body, &extra);
        assert_eq!(body["temperature"], json!(0.1));
        assert_eq!(body["top_p"], json!(0.5));
    }

    #[test]
    fn test_text_at() {
        let body = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(text_at(&body, "/choices/0/message/content").unwrap(), "hi");
        let err = text_at(&body, "/choices/1/message/content").unwrap_err();
        assert!(err.message.contains("malformed response"));
    }
}
