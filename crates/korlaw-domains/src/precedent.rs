//! Court precedents: `target=prec` on the search and service endpoints.

use korlaw_core::{is_present, Payload, RequestParameters, ResponseFormat};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    failure_message, render, response_format, unexpected, validation_error, LawTools, SearchScope,
};

const TARGET: &str = "prec";
const MAX_LIMIT: i64 = 100;
/// Present on every real precedent detail record.
const SERIAL_FIELD: &str = "판례정보일련번호";

pub const NO_PRECEDENTS: &str = "No precedents matched the search.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecedentSort {
    /// Newest decisions first.
    #[default]
    Ddes,
    /// Oldest decisions first.
    Dasc,
    /// Case name order.
    Lasc,
}

impl PrecedentSort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ddes => "ddes",
            Self::Dasc => "dasc",
            Self::Lasc => "lasc",
        }
    }
}

fn default_limit() -> i64 {
    10
}

/// Arguments of `search_precedents`. Empty strings mean "not given".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrecedentSearchArgs {
    pub query: String,
    /// Court name, e.g. 대법원.
    pub court: String,
    /// 400201 for the Supreme Court, 400202 for lower courts.
    pub court_type: String,
    pub sort: PrecedentSort,
    /// Decision date range, `YYYYMMDD~YYYYMMDD`.
    pub date_range: String,
    pub search_type: SearchScope,
    pub case_number: String,
    /// Clamped to 1..=100.
    pub limit: i64,
    /// Defaults to XML; the JSON mode of this endpoint is unreliable.
    pub response_type: Option<String>,
}

impl Default for PrecedentSearchArgs {
    fn default() -> Self {
        Self {
            query: String::new(),
            court: String::new(),
            court_type: String::new(),
            sort: PrecedentSort::default(),
            date_range: String::new(),
            search_type: SearchScope::default(),
            case_number: String::new(),
            limit: default_limit(),
            response_type: None,
        }
    }
}

impl PrecedentSearchArgs {
    pub fn query(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Default::default()
        }
    }

    fn to_params(&self, tools: &LawTools) -> Result<RequestParameters, String> {
        let format = response_format(self.response_type.as_deref(), ResponseFormat::Xml)?;
        let date_range = self.date_range.trim();
        if !date_range.is_empty() && !is_date_range(date_range) {
            return Err(format!("date_range must look like YYYYMMDD~YYYYMMDD, got {date_range}"));
        }

        let mut params = tools.base_params(TARGET, format);
        params
            .set_nonempty("query", &self.query)
            .set_nonempty("curt", &self.court)
            .set_nonempty("org", &self.court_type)
            .set("sort", self.sort.as_str())
            .set_nonempty("prncYd", date_range)
            .set("search", self.search_type.code())
            .set_nonempty("nb", &self.case_number)
            .set("display", self.limit.clamp(1, MAX_LIMIT).to_string());
        Ok(params)
    }
}

fn is_date_range(s: &str) -> bool {
    let is_date = |d: &str| d.len() == 8 && d.bytes().all(|b| b.is_ascii_digit());
    s.split_once('~')
        .is_some_and(|(from, to)| is_date(from) && is_date(to))
}

/// Arguments of `get_precedent_detail`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrecedentDetailArgs {
    /// Precedent serial number (판례일련번호) from a search result.
    pub precedent_id: String,
    pub response_type: Option<String>,
}

impl PrecedentDetailArgs {
    pub fn id(precedent_id: &str) -> Self {
        Self {
            precedent_id: precedent_id.to_string(),
            response_type: None,
        }
    }
}

impl LawTools {
    /// Search court precedents.
    pub async fn search_precedents(&self, args: &PrecedentSearchArgs) -> String {
        const OP: &str = "precedent search";
        let params = match args.to_params(self) {
            Ok(p) => p,
            Err(msg) => return validation_error(&msg),
        };
        info!(query = %args.query, "searching precedents");

        let payload = match self.normalizer.normalize(&self.config.search_url, &params).await {
            Ok(p) => p,
            Err(e) => return failure_message(OP, &e),
        };
        match &payload {
            Payload::PrecSearch(listing) if listing.items.is_empty() => NO_PRECEDENTS.to_string(),
            Payload::PrecSearch(_) => render(&payload),
            Payload::Json(value) => match value.get("PrecSearch") {
                Some(section) if section.get("prec").is_some_and(is_present) => render(&payload),
                Some(_) => NO_PRECEDENTS.to_string(),
                None => unexpected(OP, &payload),
            },
            _ => unexpected(OP, &payload),
        }
    }

    /// Fetch one precedent's full record by serial number.
    pub async fn get_precedent_detail(&self, args: &PrecedentDetailArgs) -> String {
        const OP: &str = "precedent detail lookup";
        let id = args.precedent_id.trim();
        if id.is_empty() {
            return validation_error("precedent_id is required.");
        }
        let format = match response_format(args.response_type.as_deref(), ResponseFormat::Xml) {
            Ok(f) => f,
            Err(msg) => return validation_error(&msg),
        };
        let mut params = self.base_params(TARGET, format);
        params.set("ID", id);

        let payload = match self.normalizer.normalize(&self.config.service_url, &params).await {
            Ok(p) => p,
            Err(e) => return failure_message(OP, &e),
        };
        let fields = match &payload {
            Payload::PrecService(fields) => Some(fields),
            Payload::Json(value) => match value.get("PrecService") {
                Some(section) => section.as_object(),
                None => return unexpected(OP, &payload),
            },
            _ => return unexpected(OP, &payload),
        };
        if fields.and_then(|f| f.get(SERIAL_FIELD)).is_some_and(is_present) {
            render(&payload)
        } else {
            warn!(precedent_id = id, "precedent record is empty or missing {SERIAL_FIELD}");
            format!("No precedent found for ID {id}.")
        }
    }
}
