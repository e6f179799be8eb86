use std::collections::HashMap;

use anyhow::{bail, Result};

pub const DEFAULT_SEARCH_URL: &str = "http://www.law.go.kr/DRF/lawSearch.do";
pub const DEFAULT_SERVICE_URL: &str = "http://www.law.go.kr/DRF/lawService.do";
pub const DEFAULT_TIMEOUT_S: u64 = 30;
pub const DEFAULT_STATUTE_JSON_KEY: &str = "법령";

/// Runtime configuration for the law.go.kr tools.
/// Loaded once at startup and handed to the transport and interpreters;
/// nothing below the binary reads the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential substituted into every request's `OC` parameter.
    pub api_key: String,
    /// `lawSearch.do` endpoint (precedent and statute listings).
    pub search_url: String,
    /// `lawService.do` endpoint (precedent and article detail).
    pub service_url: String,
    /// Per-attempt HTTP timeout. A fallback retry gets its own budget.
    pub http_timeout_s: u64,
    /// Top-level key the backend uses for statute data in JSON mode.
    pub statute_json_key: String,
    pub user_agent: String,
}

impl Config {
    /// Config with default endpoints for the given credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            search_url: DEFAULT_SEARCH_URL.into(),
            service_url: DEFAULT_SERVICE_URL.into(),
            http_timeout_s: DEFAULT_TIMEOUT_S,
            statute_json_key: DEFAULT_STATUTE_JSON_KEY.into(),
            user_agent: default_user_agent(),
        }
    }

    /// Load from the process environment, falling back to `./.env`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(&parse_dotenv())
    }

    fn from_lookup(dotenv: &HashMap<String, String>) -> Result<Self> {
        let api_key = get_str("LAW_API_KEY", dotenv, "");
        if api_key.trim().is_empty() {
            bail!("LAW_API_KEY is not set (environment or .env)");
        }
        Ok(Self {
            api_key,
            search_url: get_str("LAW_SEARCH_URL", dotenv, DEFAULT_SEARCH_URL),
            service_url: get_str("LAW_SERVICE_URL", dotenv, DEFAULT_SERVICE_URL),
            http_timeout_s: get_u64("LAW_HTTP_TIMEOUT_S", dotenv, DEFAULT_TIMEOUT_S),
            statute_json_key: get_str("LAW_STATUTE_JSON_KEY", dotenv, DEFAULT_STATUTE_JSON_KEY),
            user_agent: get_str("LAW_USER_AGENT", dotenv, &default_user_agent()),
        })
    }

    pub fn with_endpoints(mut self, search_url: &str, service_url: &str) -> Self {
        self.search_url = search_url.to_string();
        self.service_url = service_url.to_string();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.http_timeout_s = secs;
        self
    }
}

fn default_user_agent() -> String {
    format!("korlaw/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_dotenv() -> HashMap<String, String> {
    let Ok(contents) = std::fs::read_to_string(".env") else {
        return HashMap::new();
    };
    parse_dotenv_str(&contents)
}

fn parse_dotenv_str(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let v = v.trim().trim_matches('"');
            map.insert(k.trim().to_string(), v.to_string());
        }
    }
    map
}

fn get(key: &str, dotenv: &HashMap<String, String>) -> Option<String> {
    std::env::var(key).ok().or_else(|| dotenv.get(key).cloned())
}

fn get_str(key: &str, dotenv: &HashMap<String, String>, default: &str) -> String {
    get(key, dotenv)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn get_u64(key: &str, dotenv: &HashMap<String, String>, default: u64) -> u64 {
    get(key, dotenv)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
