//! HTTP generation backend.
//!
//! Posts each [`Descriptor`] as JSON to `{base_url}/generate` and expects a
//! [`BackendResponse`] body:
//!
//! ```json
//! { "artifact": { ... }, "cost": 0.018, "model": "story-large" }
//! ```
//!
//! `cost` and `model` are optional.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};

use super::backend::{BackendResponse, Descriptor, GenerationBackend};
use crate::{GenerationError, GenerationResult, Result, SkaldError};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for a JSON-over-HTTP generation service.
#[derive(Clone)]
pub struct HttpBackend {
    api_key: Option<String>,
    http: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a backend for the service at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a backend whose requests give up after `timeout`.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SkaldError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            api_key: None,
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn map_send_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.timeout)
        } else {
            GenerationError::Http(err.to_string())
        }
    }

    async fn handle_response_errors(&self, response: Response) -> GenerationResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status.as_u16() {
            401 | 403 => Err(GenerationError::AuthenticationFailed),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .map(Duration::from_secs);
                Err(GenerationError::RateLimited { retry_after })
            }
            503 => Err(GenerationError::Api {
                status: 503,
                message: "generation service unavailable, please retry".to_string(),
            }),
            code => {
                let body = response.text().await.unwrap_or_default();
                let message = if body.trim().is_empty() {
                    format!("generation service error: {status}")
                } else {
                    body
                };
                Err(GenerationError::Api {
                    status: code,
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn generate(&self, descriptor: &Descriptor) -> GenerationResult<BackendResponse> {
        let url = format!("{}/generate", self.base_url);
        let mut request = self.http.post(&url).json(descriptor);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request.send().await.map_err(|e| self.map_send_error(e))?;
        let response = self.handle_response_errors(response).await?;

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        serde_json::from_str(&text)
            .map_err(|e| GenerationError::Backend(format!("malformed backend response: {e}")))
    }
}
