use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::transport::Transport;
use crate::types::{Payload, RequestParameters, ResponseFormat};
use crate::xml;

/// Upper bound on the raw-body excerpt carried by parse failures.
pub const RAW_SNIPPET_CHARS: usize = 500;
const LOG_PREVIEW_CHARS: usize = 100;

/// Failure side of normalization. Every variant is terminal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Timeout, connection failure or non-2xx status.
    #[error("{0}")]
    Transport(String),
    #[error("empty response")]
    EmptyResponse,
    #[error("XML parse error: {message}")]
    XmlParse { message: String, raw_snippet: String },
    #[error("unsupported response format: {format}")]
    UnsupportedFormat { format: String, raw_snippet: String },
    /// A fault below the normalizer, such as a panicking transport.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NormalizeError {
    /// First characters of the offending body, when there was one.
    pub fn raw_snippet(&self) -> Option<&str> {
        match self {
            Self::XmlParse { raw_snippet, .. } | Self::UnsupportedFormat { raw_snippet, .. } => {
                Some(raw_snippet)
            }
            Self::Transport(_) | Self::EmptyResponse | Self::Internal(_) => None,
        }
    }
}

pub type NormalizedResult = Result<Payload, NormalizeError>;

/// Why a JSON attempt is abandoned in favour of XML.
#[derive(Debug)]
enum JsonMismatch {
    EmptyObject,
    Unparseable(String),
}

impl std::fmt::Display for JsonMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyObject => f.write_str("empty JSON object"),
            Self::Unparseable(e) => write!(f, "JSON parse error: {e}"),
        }
    }
}

/// Fetches a backend response and shapes it into a [`Payload`].
///
/// JSON requests whose body is exactly `{}` or unparseable are re-issued
/// once as XML. The retry path goes straight to the XML extractor, so an
/// XML attempt can never bounce back to JSON. Any other JSON value, object
/// or not, is handed back as-is.
#[derive(Clone)]
pub struct Normalizer {
    transport: Arc<dyn Transport>,
}

impl Normalizer {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn normalize(&self, url: &str, params: &RequestParameters) -> NormalizedResult {
        match AssertUnwindSafe(self.attempt(url, params)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(url, "normalization aborted: {message}");
                Err(NormalizeError::Internal(message))
            }
        }
    }

    async fn attempt(&self, url: &str, params: &RequestParameters) -> NormalizedResult {
        let requested = params.requested_format();
        let body = self.fetch(url, params).await?;

        match requested.parse::<ResponseFormat>() {
            Ok(ResponseFormat::Json) => match parse_json(&body) {
                Ok(value) => Ok(Payload::Json(value)),
                Err(reason) => {
                    warn!(%reason, "JSON response unusable, retrying as XML");
                    let retry = params.with_format(ResponseFormat::Xml);
                    let body = self.fetch(url, &retry).await?;
                    parse_xml(&body)
                }
            },
            Ok(ResponseFormat::Xml) => parse_xml(&body),
            Ok(ResponseFormat::Html) | Err(_) => {
                warn!(format = %requested, "unsupported response format");
                Err(NormalizeError::UnsupportedFormat {
                    format: requested,
                    raw_snippet: snippet(&body, RAW_SNIPPET_CHARS),
                })
            }
        }
    }

    /// One HTTP attempt. Empty bodies stop here; nothing is retried.
    async fn fetch(&self, url: &str, params: &RequestParameters) -> Result<String, NormalizeError> {
        let resp = match self.transport.get(url, params).await {
            Ok(r) => r,
            Err(e) => {
                error!(url, "API request failed: {e:#}");
                return Err(NormalizeError::Transport(format!("{e:#}")));
            }
        };
        if !(200..300).contains(&resp.status) {
            error!(url, status = resp.status, "API returned non-success status");
            return Err(NormalizeError::Transport(format!("HTTP status {}", resp.status)));
        }

        info!(
            url,
            format = %params.requested_format(),
            len = resp.body.len(),
            content_type = resp.content_type.as_deref().unwrap_or(""),
            preview = %snippet(&resp.body, LOG_PREVIEW_CHARS),
            "API response received"
        );

        if resp.body.trim().is_empty() {
            error!(url, "API returned an empty body");
            return Err(NormalizeError::EmptyResponse);
        }
        Ok(resp.body)
    }
}

fn parse_json(body: &str) -> Result<Value, JsonMismatch> {
    let body = body.trim();
    if body == "{}" {
        return Err(JsonMismatch::EmptyObject);
    }
    serde_json::from_str(body).map_err(|e| JsonMismatch::Unparseable(e.to_string()))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn parse_xml(body: &str) -> NormalizedResult {
    let payload = xml::extract_payload(body).map_err(|e| {
        error!("XML parse error: {e}");
        NormalizeError::XmlParse {
            message: e.to_string(),
            raw_snippet: snippet(body, RAW_SNIPPET_CHARS),
        }
    })?;
    if let Payload::Unrecognized { root_tag, .. } = &payload {
        warn!(root_tag = %root_tag, "unhandled XML root tag");
    }
    Ok(payload)
}

/// First `max` characters of `s` (not bytes; bodies are mostly Hangul).
pub fn snippet(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
