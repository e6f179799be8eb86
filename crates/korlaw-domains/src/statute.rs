//! Statutes: `target=law` listings and `target=lawjosub` article text.

use korlaw_core::{is_present, Payload, RequestParameters, ResponseFormat};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    failure_message, render, response_format, unexpected, validation_error, LawTools, SearchScope,
};

const SEARCH_TARGET: &str = "law";
const ARTICLE_TARGET: &str = "lawjosub";
const MAX_DISPLAY: i64 = 100;

pub const NO_STATUTES: &str = "No statutes matched the search.";
pub const ARTICLE_INFO_NOT_FOUND: &str = "No information found for the requested article.";
pub const ARTICLE_CONTENT_NOT_FOUND: &str = "No content found for the requested article.";

// JSON article nesting and content fields, most specific last.
const ARTICLE_KEY: &str = "조문";
const ARTICLE_UNIT_KEY: &str = "조문단위";
const ARTICLE_CONTENT: &str = "조문내용";
const PARAGRAPH_CONTENT: &str = "항내용";
const ITEM_CONTENT: &str = "호내용";
const SUB_ITEM_CONTENT: &str = "목내용";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatuteSort {
    /// Statute name, ascending.
    #[default]
    Lasc,
    /// Statute name, descending.
    Ldes,
    /// Promulgation date, ascending.
    Dasc,
    /// Promulgation date, descending.
    Ddes,
}

impl StatuteSort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lasc => "lasc",
            Self::Ldes => "ldes",
            Self::Dasc => "dasc",
            Self::Ddes => "ddes",
        }
    }
}

/// Arguments of `search_laws`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatuteSearchArgs {
    pub query: String,
    pub search_type: SearchScope,
    /// Page size, clamped to 1..=100.
    pub display: i64,
    /// 1-based.
    pub page: i64,
    pub sort: StatuteSort,
    pub response_type: Option<String>,
}

impl Default for StatuteSearchArgs {
    fn default() -> Self {
        Self {
            query: String::new(),
            search_type: SearchScope::default(),
            display: 10,
            page: 1,
            sort: StatuteSort::default(),
            response_type: None,
        }
    }
}

impl StatuteSearchArgs {
    pub fn query(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Default::default()
        }
    }

    fn to_params(&self, tools: &LawTools) -> Result<RequestParameters, String> {
        let format = response_format(self.response_type.as_deref(), ResponseFormat::Json)?;
        let mut params = tools.base_params(SEARCH_TARGET, format);
        params
            .set("query", self.query.as_str())
            .set("search", self.search_type.code())
            .set("display", self.display.clamp(1, MAX_DISPLAY).to_string())
            .set("page", self.page.max(1).to_string())
            .set("sort", self.sort.as_str());
        Ok(params)
    }
}

/// Arguments of `get_law_article_detail`. Numbers are the backend's
/// six-digit codes: 제2조 is `000200`, 제10조의2 is `001002`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArticleDetailArgs {
    /// 법령ID from a statute search result.
    pub law_id: String,
    /// 법령일련번호; wins over `law_id` when both are given.
    pub law_mst: String,
    pub article: String,
    pub paragraph: String,
    pub item: String,
    /// A single Hangul letter such as 가, 나, 다.
    pub sub_item: String,
    pub response_type: Option<String>,
}

impl ArticleDetailArgs {
    fn to_params(&self, tools: &LawTools) -> Result<RequestParameters, String> {
        let law_mst = self.law_mst.trim();
        let law_id = self.law_id.trim();
        let article = self.article.trim();
        if law_mst.is_empty() && law_id.is_empty() {
            return Err("law_id or law_mst is required.".into());
        }
        if article.is_empty() {
            return Err("article is required.".into());
        }
        let format = response_format(self.response_type.as_deref(), ResponseFormat::Json)?;

        let mut params = tools.base_params(ARTICLE_TARGET, format);
        if !law_mst.is_empty() {
            params.set("MST", law_mst);
        } else {
            params.set("ID", law_id);
        }
        params
            .set("JO", article)
            .set_nonempty("HANG", self.paragraph.trim())
            .set_nonempty("HO", self.item.trim());
        let sub_item = self.sub_item.trim();
        if !sub_item.is_empty() {
            // The backend expects MOK pre-encoded; the query string encodes it again.
            params.set("MOK", urlencoding::encode(sub_item));
        }
        Ok(params)
    }

    /// Content field for the most specific unit that was requested.
    fn content_field(&self) -> &'static str {
        if !self.sub_item.trim().is_empty() {
            SUB_ITEM_CONTENT
        } else if !self.item.trim().is_empty() {
            ITEM_CONTENT
        } else if !self.paragraph.trim().is_empty() {
            PARAGRAPH_CONTENT
        } else {
            ARTICLE_CONTENT
        }
    }
}

impl LawTools {
    /// Search statutes by name or body text.
    pub async fn search_laws(&self, args: &StatuteSearchArgs) -> String {
        const OP: &str = "statute search";
        let params = match args.to_params(self) {
            Ok(p) => p,
            Err(msg) => return validation_error(&msg),
        };
        info!(query = %args.query, "searching statutes");

        let payload = match self.normalizer.normalize(&self.config.search_url, &params).await {
            Ok(p) => p,
            Err(e) => return failure_message(OP, &e),
        };
        match &payload {
            Payload::LawSearch(listing) if listing.items.is_empty() => NO_STATUTES.to_string(),
            Payload::LawSearch(_) => render(&payload),
            Payload::Json(value) => {
                if let Some(statutes) = value.get(&self.config.statute_json_key) {
                    match statutes {
                        Value::Array(list) if !list.is_empty() => render(&payload),
                        _ => NO_STATUTES.to_string(),
                    }
                } else if let Some(section) = value.get("LawSearch") {
                    if section.get("law").is_some_and(is_present) {
                        render(&payload)
                    } else {
                        NO_STATUTES.to_string()
                    }
                } else {
                    unexpected(OP, &payload)
                }
            }
            _ => unexpected(OP, &payload),
        }
    }

    /// Fetch the text of one article, or of a paragraph/item/sub-item in it.
    pub async fn get_law_article_detail(&self, args: &ArticleDetailArgs) -> String {
        const OP: &str = "statute article lookup";
        let params = match args.to_params(self) {
            Ok(p) => p,
            Err(msg) => return validation_error(&msg),
        };
        info!(
            law_id = %args.law_id,
            law_mst = %args.law_mst,
            article = %args.article,
            "fetching statute article"
        );

        let payload = match self.normalizer.normalize(&self.config.service_url, &params).await {
            Ok(p) => p,
            Err(e) => return failure_message(OP, &e),
        };
        match &payload {
            Payload::Json(value) => match value.get(&self.config.statute_json_key) {
                Some(statute) => {
                    let Some(unit) = article_unit(statute) else {
                        warn!("JSON response has no article unit");
                        return ARTICLE_INFO_NOT_FOUND.to_string();
                    };
                    if unit.get(ARTICLE_CONTENT).is_some_and(is_present) {
                        render(&payload)
                    } else {
                        warn!(field = ARTICLE_CONTENT, "article content missing from JSON response");
                        ARTICLE_CONTENT_NOT_FOUND.to_string()
                    }
                }
                None => unexpected(OP, &payload),
            },
            Payload::LawJosubService(fields) => {
                let field = args.content_field();
                if fields.get(field).is_some_and(is_present) {
                    render(&payload)
                } else {
                    warn!(field, "article content missing from XML response");
                    ARTICLE_CONTENT_NOT_FOUND.to_string()
                }
            }
            _ => unexpected(OP, &payload),
        }
    }
}

/// `statute → 조문 → 조문단위`. A list of units resolves to its first entry.
fn article_unit(statute: &Value) -> Option<&Value> {
    let unit = statute.get(ARTICLE_KEY)?.get(ARTICLE_UNIT_KEY)?;
    let unit = match unit {
        Value::Array(units) => units.first()?,
        other => other,
    };
    is_present(unit).then_some(unit)
}
