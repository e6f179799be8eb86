pub mod precedent;
pub mod statute;

use std::sync::Arc;

use korlaw_core::{
    config::Config,
    normalize::{snippet, NormalizeError, Normalizer},
    transport::Transport,
    Payload, RequestParameters, ResponseFormat,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

pub use precedent::{PrecedentDetailArgs, PrecedentSearchArgs, PrecedentSort};
pub use statute::{ArticleDetailArgs, StatuteSearchArgs, StatuteSort};

pub const UNEXPECTED_STRUCTURE: &str = "Unexpected response structure from the law service.";
const FORMAT_MISMATCH_HINT: &str = "The server response did not match the expected format (JSON/XML). \
     Check the service status.";
const LOG_PAYLOAD_CHARS: usize = 2000;

/// The four law.go.kr tools. Each call builds its own parameters and
/// shares nothing mutable with any other call.
#[derive(Clone)]
pub struct LawTools {
    config: Arc<Config>,
    normalizer: Normalizer,
}

impl LawTools {
    pub fn new(config: Arc<Config>, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            normalizer: Normalizer::new(transport),
        }
    }

    /// `OC`, `target` and `type`, the parameters every endpoint takes.
    pub(crate) fn base_params(&self, target: &str, format: ResponseFormat) -> RequestParameters {
        let mut params = RequestParameters::new();
        params
            .set("OC", self.config.api_key.as_str())
            .set("target", target)
            .set("type", format.as_str());
        params
    }
}

/// `"search_type"`: 1 searches titles, 2 searches full text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "i64")]
pub enum SearchScope {
    #[default]
    Title,
    FullText,
}

impl SearchScope {
    pub fn code(self) -> &'static str {
        match self {
            Self::Title => "1",
            Self::FullText => "2",
        }
    }
}

impl TryFrom<i64> for SearchScope {
    type Error = String;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::Title),
            2 => Ok(Self::FullText),
            other => Err(format!("search_type must be 1 (title) or 2 (full text), got {other}")),
        }
    }
}

/// Resolve a caller-supplied `response_type`, falling back to `default`.
pub(crate) fn response_format(
    value: Option<&str>,
    default: ResponseFormat,
) -> Result<ResponseFormat, String> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|bad| format!("response_type must be JSON, XML or HTML, got {bad}")),
    }
}

/// Validation failures go back as a JSON object, never as prose.
pub(crate) fn validation_error(message: &str) -> String {
    json!({ "error": message }).to_string()
}

pub(crate) fn failure_message(operation: &str, err: &NormalizeError) -> String {
    match err.raw_snippet() {
        Some(raw) => {
            error!(operation, raw, "raw response excerpt");
            format!("Error during {operation}: {err}\n\n{FORMAT_MISMATCH_HINT}")
        }
        None => format!("Error during {operation}: {err}"),
    }
}

pub(crate) fn render(payload: &Payload) -> String {
    payload.to_json().to_string()
}

pub(crate) fn unexpected(operation: &str, payload: &Payload) -> String {
    warn!(
        operation,
        response = %snippet(&render(payload), LOG_PAYLOAD_CHARS),
        "unexpected success response structure"
    );
    UNEXPECTED_STRUCTURE.to_string()
}
