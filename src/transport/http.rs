//! Chat-completions transport
//!
//! One blocking POST per call with a bearer credential and a fixed timeout.
//! No retries.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ChatMessage, Transport};
use crate::error::{DaxError, Result};

/// xAI chat completions endpoint
pub const DEFAULT_API_URL: &str = "https://api.x.ai/v1/chat/completions";

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Low temperature keeps successive layers converging instead of drifting
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Endpoint and sampling settings
#[derive(Debug, Clone, PartialEq)]
pub struct HttpTransportConfig {
    pub api_url: String,
    pub timeout_ms: u64,
    pub temperature: f32,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Default network transport
pub struct HttpTransport {
    api_key: String,
    model: String,
    config: HttpTransportConfig,
}

impl HttpTransport {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_config(api_key, model, HttpTransportConfig::default())
    }

    pub fn with_config(api_key: &str, model: &str, config: HttpTransportConfig) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    fn request_body<'a>(&'a self, messages: &'a [ChatMessage]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.config.temperature,
        }
    }

    #[cfg(feature = "http")]
    fn post(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_millis(self.config.timeout_ms))
            .build()
            .map_err(|e| DaxError::Transport {
                message: "cannot build HTTP client".to_string(),
                status: None,
                body: None,
                source: Some(Box::new(e)),
            })?;

        let response = client
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages))
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    DaxError::TransportTimeout {
                        timeout_ms: self.config.timeout_ms,
                    }
                } else if e.is_connect() {
                    DaxError::TransportUnavailable {
                        endpoint: self.config.api_url.clone(),
                        message: e.to_string(),
                    }
                } else {
                    DaxError::Transport {
                        message: "request failed".to_string(),
                        status: None,
                        body: None,
                        source: Some(Box::new(e)),
                    }
                }
            })?;

        let status = response.status();
        let body = response.text().map_err(|e| DaxError::Transport {
            message: format!("cannot read response body (HTTP {})", status.as_u16()),
            status: Some(status.as_u16()),
            body: None,
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            return Err(DaxError::Transport {
                message: format!("HTTP {}: {}", status.as_u16(), body),
                status: Some(status.as_u16()),
                body: Some(body),
                source: None,
            });
        }

        extract_content(&body).map_err(|err| match err {
            DaxError::Transport {
                message, source, ..
            } => DaxError::Transport {
                message,
                status: Some(status.as_u16()),
                body: Some(body.clone()),
                source,
            },
            other => other,
        })
    }

    #[cfg(not(feature = "http"))]
    fn post(&self, _messages: &[ChatMessage]) -> Result<String> {
        Err(DaxError::transport(
            "HTTP transport not compiled. Build with --features http",
        ))
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("config", &self.config)
            .finish()
    }
}

impl Transport for HttpTransport {
    fn send(&self, messages: &[ChatMessage]) -> Result<String> {
        tracing::debug!(
            "POST {} (model {}, {} message(s))",
            self.config.api_url,
            self.model,
            messages.len()
        );
        self.post(messages)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Pull `choices[0].message.content` out of a completion body, trimmed
fn extract_content(body: &str) -> Result<String> {
    let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| DaxError::Transport {
        message: format!("malformed response body: {}", e),
        status: None,
        body: Some(body.to_string()),
        source: Some(Box::new(e)),
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| DaxError::Transport {
            message: "response contains no choices".to_string(),
            status: None,
            body: Some(body.to_string()),
            source: None,
        })?;

    let content = choice.message.content.ok_or_else(|| DaxError::Transport {
        message: "first choice has no message content".to_string(),
        status: None,
        body: Some(body.to_string()),
        source: None,
    })?;

    Ok(content.trim().to_string())
}
