use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{HttpResponse, Transport};
use crate::types::RequestParameters;

/// In-memory transport that answers by the request's `type` parameter and
/// records every call. Answers repeat, so the same script can serve
/// several calls.
#[derive(Default)]
pub struct ScriptedTransport {
    answers: Mutex<HashMap<String, std::result::Result<HttpResponse, String>>>,
    calls: Mutex<Vec<(String, RequestParameters)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests for `format` with a 200 carrying `body`.
    pub fn respond(self, format: &str, body: &str) -> Self {
        self.respond_with(
            format,
            HttpResponse {
                status: 200,
                content_type: None,
                body: body.to_string(),
            },
        )
    }

    pub fn respond_with(self, format: &str, resp: HttpResponse) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.insert(format.to_ascii_uppercase(), Ok(resp));
        }
        self
    }

    /// Fail requests for `format` the way a dead connection would.
    pub fn fail(self, format: &str, message: &str) -> Self {
        if let Ok(mut answers) = self.answers.lock() {
            answers.insert(format.to_ascii_uppercase(), Err(message.to_string()));
        }
        self
    }

    /// Every `(url, params)` seen so far, in call order.
    pub fn calls(&self) -> Vec<(String, RequestParameters)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, params: &RequestParameters) -> Result<HttpResponse> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((url.to_string(), params.clone()));
        }
        let format = params.requested_format();
        let answer = self
            .answers
            .lock()
            .ok()
            .and_then(|answers| answers.get(&format).cloned());
        match answer {
            Some(Ok(resp)) if (200..300).contains(&resp.status) => Ok(resp),
            Some(Ok(resp)) => bail!("HTTP status {}", resp.status),
            Some(Err(message)) => bail!("{message}"),
            None => bail!("no scripted response for type={format}"),
        }
    }
}
