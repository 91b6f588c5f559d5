use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{OcrTranslatorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One outgoing API call, fully described so the transport can be swapped out
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: Value, timeout: Duration) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
            timeout,
        }
    }

    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// Header values are credentials; print names only
impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends exactly one HTTP request; never retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport used outside of tests
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("ocr-translator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OcrTranslatorError::Network(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("Sending {:?} request to: {}", request.method, request.url);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(describe_send_error)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| OcrTranslatorError::Network(format!("Failed to read response body: {}", e)))?;

        debug!("Received HTTP {} ({} bytes)", status, body.len());
        Ok(HttpResponse { status, body })
    }
}

fn describe_send_error(e: reqwest::Error) -> OcrTranslatorError {
    if e.is_timeout() {
        OcrTranslatorError::Network(format!("Request timed out: {}", e))
    } else if e.is_connect() {
        OcrTranslatorError::Network(format!("Failed to connect: {}", e))
    } else {
        OcrTranslatorError::Network(format!("HTTP request failed: {}", e))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<Value>,
}

/// Map a non-2xx response to a classified error; 2xx passes through.
///
/// 401/403 are credential failures and 429 is throttling regardless of body.
/// Gemini answers a bad key with 400 and reason API_KEY_INVALID.
pub fn check_status(provider: &str, response: &HttpResponse) -> Result<()> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }

    let detail = describe_error_body(response);
    let message = format!("{} API error {}: {}", provider, response.status, detail);

    Err(match response.status {
        401 | 403 => OcrTranslatorError::Auth(message),
        429 => OcrTranslatorError::RateLimit(message),
        400 if is_invalid_key_body(&response.body) => OcrTranslatorError::Auth(message),
        _ => OcrTranslatorError::Provider(message),
    })
}

fn describe_error_body(response: &HttpResponse) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&response.body) {
        let message = envelope
            .error
            .and_then(|e| e.message)
            .or(envelope.message)
            .unwrap_or_default();
        if !message.trim().is_empty() {
            return message;
        }
    }

    let text = response.body.trim();
    if text.is_empty() {
        "<empty response body>".to_string()
    } else {
        text.chars().take(500).collect()
    }
}

fn is_invalid_key_body(body: &str) -> bool {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return false;
    };
    let Some(error) = envelope.error else {
        return false;
    };

    let reason_matches = error
        .details
        .iter()
        .any(|d| d.get("reason").and_then(Value::as_str) == Some("API_KEY_INVALID"));
    let message_matches = error.status.as_deref() == Some("INVALID_ARGUMENT")
        && error
            .message
            .as_deref()
            .map(|m| m.contains("API key not valid"))
            .unwrap_or(false);

    reason_matches || message_matches
}
