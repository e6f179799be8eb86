use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::Config;
use crate::types::RequestParameters;

#[cfg(any(test, feature = "test-util"))]
mod scripted;
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedTransport;

/// What the normalizer needs from an HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Informational only; the requested format drives parsing.
    pub content_type: Option<String>,
    pub body: String,
}

/// GET with query parameters. Implementations must fail on non-2xx.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, params: &RequestParameters) -> Result<HttpResponse>;
}

/// Production transport backed by a shared `reqwest::Client`.
pub struct ReqwestTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            timeout: Duration::from_secs(config.http_timeout_s),
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, params: &RequestParameters) -> Result<HttpResponse> {
        let resp = self
            .http
            .get(url)
            .query(params.pairs())
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().await?;
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
