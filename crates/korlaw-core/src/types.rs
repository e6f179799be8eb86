use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

// ── Request side ─────────────────────────────────────────────────────────

/// Representation the backend is asked to answer in (`type` parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Xml,
    /// Accepted by the backend, but has no structured rendition here.
    Html,
}

impl ResponseFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Html => "HTML",
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JSON" => Ok(Self::Json),
            "XML" => Ok(Self::Xml),
            "HTML" => Ok(Self::Html),
            other => Err(other.to_string()),
        }
    }
}

/// Query arguments for one backend request, kept in insertion order.
/// Every value is already text by the time it lands here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParameters {
    pairs: Vec<(String, String)>,
}

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing an existing value in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
        self
    }

    /// Set `key` only when `value` is non-empty.
    pub fn set_nonempty(&mut self, key: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.set(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Raw `type` value, upper-cased; absent means JSON.
    pub fn requested_format(&self) -> String {
        self.get("type")
            .map(|t| t.trim().to_ascii_uppercase())
            .unwrap_or_else(|| "JSON".into())
    }

    /// Copy of these parameters with `type` replaced.
    pub fn with_format(&self, format: ResponseFormat) -> Self {
        let mut next = self.clone();
        next.set("type", format.as_str());
        next
    }
}

// ── Response side ────────────────────────────────────────────────────────

/// Element name → CDATA-stripped text, in document order.
pub type FieldMap = Map<String, Value>;

/// A list-bearing search response (`PrecSearch` / `LawSearch`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub total_count: u64,
    pub items: Vec<FieldMap>,
}

impl Listing {
    fn to_json(&self, item_key: &str) -> Value {
        json!({
            "totalCnt": self.total_count.to_string(),
            item_key: self.items,
        })
    }
}

/// Successful outcome of normalization: one variant per recognized shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed JSON body, passed through as the backend sent it. Usually an
    /// object; arrays and scalars are kept so callers can reject them.
    Json(Value),
    PrecSearch(Listing),
    PrecService(FieldMap),
    LawJosubService(FieldMap),
    LawSearch(Listing),
    /// Well-formed XML with a root tag no extractor knows about.
    Unrecognized { root_tag: String, xml_content: String },
}

impl Payload {
    /// Root tag for XML-derived payloads; `None` for JSON.
    pub fn root_tag(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::PrecSearch(_) => Some("PrecSearch"),
            Self::PrecService(_) => Some("PrecService"),
            Self::LawJosubService(_) => Some("LawJosubService"),
            Self::LawSearch(_) => Some("LawSearch"),
            Self::Unrecognized { root_tag, .. } => Some(root_tag),
        }
    }

    /// Canonical nested-mapping rendition handed back to callers.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::PrecSearch(listing) => json!({ "PrecSearch": listing.to_json("prec") }),
            Self::PrecService(fields) => json!({ "PrecService": fields }),
            Self::LawJosubService(fields) => json!({ "LawJosubService": fields }),
            Self::LawSearch(listing) => json!({ "LawSearch": listing.to_json("law") }),
            Self::Unrecognized {
                root_tag,
                xml_content,
            } => json!({ "xml_content": xml_content, "root_tag": root_tag }),
        }
    }
}

/// Truthiness for dynamic JSON values: null, false, 0,
/// and empty strings/arrays/objects all count as absent.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
