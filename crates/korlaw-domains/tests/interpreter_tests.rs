// End-to-end interpreter behaviour: argument → parameters → normalizer →
// caller-facing text, against a scripted transport.

use std::sync::Arc;

use korlaw_core::config::Config;
use korlaw_core::transport::ScriptedTransport;
use korlaw_domains::precedent::NO_PRECEDENTS;
use korlaw_domains::statute::{ARTICLE_CONTENT_NOT_FOUND, ARTICLE_INFO_NOT_FOUND, NO_STATUTES};
use korlaw_domains::{
    ArticleDetailArgs, LawTools, PrecedentDetailArgs, PrecedentSearchArgs, StatuteSearchArgs,
    UNEXPECTED_STRUCTURE,
};
use serde_json::Value;

const SEARCH_URL: &str = "http://law.test/DRF/lawSearch.do";
const SERVICE_URL: &str = "http://law.test/DRF/lawService.do";

fn tools(transport: ScriptedTransport) -> (LawTools, Arc<ScriptedTransport>) {
    let transport = Arc::new(transport);
    let config = Config::new("test-key").with_endpoints(SEARCH_URL, SERVICE_URL);
    (LawTools::new(Arc::new(config), transport.clone()), transport)
}

fn parse(out: &str) -> Value {
    serde_json::from_str(out).unwrap_or_else(|e| panic!("not JSON ({e}): {out}"))
}

const PREC_SEARCH_TWO: &str = r#"<PrecSearch>
  <totalCnt>2</totalCnt>
  <prec><판례일련번호>100</판례일련번호><사건명><![CDATA[첫 번째 사건]]></사건명></prec>
  <prec><판례일련번호>200</판례일련번호><사건명>&lt;![CDATA[두 번째 사건]]&gt;</사건명></prec>
</PrecSearch>"#;

const PREC_SEARCH_EMPTY: &str = "<PrecSearch><totalCnt>0</totalCnt></PrecSearch>";

const ARTICLE_ALL_LEVELS: &str = r#"<LawJosubService>
  <조문내용>&lt;![CDATA[제2조(정의)]]&gt;</조문내용>
  <항내용>&lt;![CDATA[① 항]]&gt;</항내용>
  <호내용>&lt;![CDATA[1. 호]]&gt;</호내용>
  <목내용>&lt;![CDATA[가. 목 내용]]&gt;</목내용>
</LawJosubService>"#;

// ── precedent search ────────────────────────────────────────────────────

#[tokio::test]
async fn precedent_search_serializes_both_entries_in_order() {
    let (tools, transport) = tools(ScriptedTransport::new().respond("XML", PREC_SEARCH_TWO));
    let out = tools.search_precedents(&PrecedentSearchArgs::query("사건")).await;

    let v = parse(&out);
    let prec = v["PrecSearch"]["prec"].as_array().unwrap();
    assert_eq!(prec.len(), 2);
    assert_eq!(prec[0]["판례일련번호"], "100");
    assert_eq!(prec[1]["판례일련번호"], "200");
    assert_eq!(prec[1]["사건명"], "두 번째 사건");
    assert_eq!(v["PrecSearch"]["totalCnt"], "2");
    assert!(!out.contains("CDATA"));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, SEARCH_URL);
}

#[tokio::test]
async fn precedent_search_without_hits_says_so() {
    let (tools, _) = tools(ScriptedTransport::new().respond("XML", PREC_SEARCH_EMPTY));
    let out = tools.search_precedents(&PrecedentSearchArgs::query("없음")).await;
    assert_eq!(out, NO_PRECEDENTS);
}

#[tokio::test]
async fn precedent_search_builds_typed_parameters() {
    let (tools, transport) = tools(ScriptedTransport::new().respond("XML", PREC_SEARCH_EMPTY));
    let args: PrecedentSearchArgs = serde_json::from_value(serde_json::json!({
        "query": "임대차",
        "court": "대법원",
        "court_type": "400201",
        "sort": "dasc",
        "date_range": "20200101~20201231",
        "search_type": 2,
        "case_number": "2020다12345",
        "limit": 500
    }))
    .unwrap();
    tools.search_precedents(&args).await;

    let (_, p) = &transport.calls()[0];
    let pairs: Vec<(&str, &str)> = p.pairs().iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    assert_eq!(
        pairs,
        [
            ("OC", "test-key"),
            ("target", "prec"),
            ("type", "XML"),
            ("query", "임대차"),
            ("curt", "대법원"),
            ("org", "400201"),
            ("sort", "dasc"),
            ("prncYd", "20200101~20201231"),
            ("search", "2"),
            ("nb", "2020다12345"),
            ("display", "100"),
        ]
    );
}

#[tokio::test]
async fn precedent_search_limit_floor_is_one() {
    let (tools, transport) = tools(ScriptedTransport::new().respond("XML", PREC_SEARCH_EMPTY));
    let args = PrecedentSearchArgs {
        limit: 0,
        ..PrecedentSearchArgs::query("x")
    };
    tools.search_precedents(&args).await;
    assert_eq!(transport.calls()[0].1.get("display"), Some("1"));
}

#[tokio::test]
async fn precedent_search_bad_date_range_skips_network() {
    let (tools, transport) = tools(ScriptedTransport::new());
    let args = PrecedentSearchArgs {
        date_range: "2020".into(),
        ..PrecedentSearchArgs::query("x")
    };
    let out = tools.search_precedents(&args).await;
    assert!(parse(&out)["error"].as_str().unwrap().contains("date_range"));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn precedent_search_parse_failure_carries_format_hint() {
    let (tools, _) = tools(ScriptedTransport::new().respond("XML", "<html><body>점검 중"));
    let out = tools.search_precedents(&PrecedentSearchArgs::query("x")).await;
    assert!(out.starts_with("Error during precedent search: XML parse error"));
    assert!(out.contains("did not match the expected format"));
}

#[tokio::test]
async fn precedent_search_transport_failure_has_no_hint() {
    let (tools, _) = tools(ScriptedTransport::new().fail("XML", "connection reset"));
    let out = tools.search_precedents(&PrecedentSearchArgs::query("x")).await;
    assert_eq!(out, "Error during precedent search: connection reset");
}

#[tokio::test]
async fn precedent_search_unknown_root_is_unexpected() {
    let (tools, _) = tools(ScriptedTransport::new().respond("XML", "<LawSearch><totalCnt>0</totalCnt></LawSearch>"));
    let out = tools.search_precedents(&PrecedentSearchArgs::query("x")).await;
    assert_eq!(out, UNEXPECTED_STRUCTURE);
}

#[tokio::test]
async fn precedent_search_json_mode_falls_back_to_xml() {
    let (tools, transport) = tools(
        ScriptedTransport::new()
            .respond("JSON", "{}")
            .respond("XML", PREC_SEARCH_TWO),
    );
    let args = PrecedentSearchArgs {
        response_type: Some("json".into()),
        ..PrecedentSearchArgs::query("x")
    };
    let out = tools.search_precedents(&args).await;
    assert_eq!(transport.call_count(), 2);
    assert_eq!(parse(&out)["PrecSearch"]["prec"].as_array().unwrap().len(), 2);
}

// ── precedent detail ────────────────────────────────────────────────────

#[tokio::test]
async fn precedent_detail_returns_record() {
    let body = "<PrecService><판례정보일련번호>228541</판례정보일련번호><사건명>손해배상</사건명></PrecService>";
    let (tools, transport) = tools(ScriptedTransport::new().respond("XML", body));
    let out = tools.get_precedent_detail(&PrecedentDetailArgs::id("228541")).await;

    assert_eq!(parse(&out)["PrecService"]["사건명"], "손해배상");
    let (url, p) = &transport.calls()[0];
    assert_eq!(url, SERVICE_URL);
    assert_eq!(p.get("ID"), Some("228541"));
    assert_eq!(p.get("target"), Some("prec"));
}

#[tokio::test]
async fn precedent_detail_without_serial_is_not_found() {
    let body = "<PrecService><사건명>손해배상</사건명></PrecService>";
    let (tools, _) = tools(ScriptedTransport::new().respond("XML", body));
    let out = tools.get_precedent_detail(&PrecedentDetailArgs::id("999")).await;
    assert_eq!(out, "No precedent found for ID 999.");
}

#[tokio::test]
async fn precedent_detail_requires_id() {
    let (tools, transport) = tools(ScriptedTransport::new());
    let out = tools.get_precedent_detail(&PrecedentDetailArgs::id("  ")).await;
    assert_eq!(parse(&out)["error"], "precedent_id is required.");
    assert_eq!(transport.call_count(), 0);
}

// ── statute search ──────────────────────────────────────────────────────

#[tokio::test]
async fn statute_search_json_list_is_serialized() {
    let body = r#"{"법령": [{"법령명한글": "민법", "법령ID": "001706"}]}"#;
    let (tools, transport) = tools(ScriptedTransport::new().respond("JSON", body));
    let out = tools.search_laws(&StatuteSearchArgs::query("민법")).await;

    assert_eq!(parse(&out)["법령"][0]["법령ID"], "001706");
    let (_, p) = &transport.calls()[0];
    assert_eq!(p.get("target"), Some("law"));
    assert_eq!(p.get("sort"), Some("lasc"));
    assert_eq!(p.get("display"), Some("10"));
    assert_eq!(p.get("page"), Some("1"));
    assert_eq!(p.get("search"), Some("1"));
}

#[tokio::test]
async fn statute_search_empty_json_list_is_no_results() {
    let (tools, _) = tools(ScriptedTransport::new().respond("JSON", r#"{"법령": []}"#));
    let out = tools.search_laws(&StatuteSearchArgs::query("없는법")).await;
    assert_eq!(out, NO_STATUTES);
}

#[tokio::test]
async fn statute_search_xml_shape_after_fallback() {
    let xml = "<LawSearch><totalCnt>1</totalCnt><law><법령명한글>&lt;![CDATA[민법]]&gt;</법령명한글></law></LawSearch>";
    let (tools, _) = tools(ScriptedTransport::new().respond("JSON", "not json").respond("XML", xml));
    let out = tools.search_laws(&StatuteSearchArgs::query("민법")).await;
    assert_eq!(parse(&out)["LawSearch"]["law"][0]["법령명한글"], "민법");
}

#[tokio::test]
async fn statute_search_empty_xml_listing_is_no_results() {
    let xml = "<LawSearch><totalCnt>0</totalCnt></LawSearch>";
    let (tools, _) = tools(ScriptedTransport::new().respond("XML", xml));
    let args = StatuteSearchArgs {
        response_type: Some("XML".into()),
        ..StatuteSearchArgs::query("x")
    };
    assert_eq!(tools.search_laws(&args).await, NO_STATUTES);
}

#[tokio::test]
async fn statute_search_unknown_json_is_unexpected() {
    let (tools, _) = tools(ScriptedTransport::new().respond("JSON", r#"{"result": "fail"}"#));
    let out = tools.search_laws(&StatuteSearchArgs::query("x")).await;
    assert_eq!(out, UNEXPECTED_STRUCTURE);
}

#[tokio::test]
async fn non_object_json_is_unexpected_without_fallback() {
    let (tools, transport) = tools(
        ScriptedTransport::new()
            .respond("JSON", "[]")
            .respond("XML", "<LawSearch><totalCnt>0</totalCnt></LawSearch>"),
    );
    let out = tools.search_laws(&StatuteSearchArgs::query("민법")).await;
    assert_eq!(out, UNEXPECTED_STRUCTURE);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test]
async fn statute_search_clamps_page_size() {
    let (tools, transport) = tools(ScriptedTransport::new().respond("JSON", r#"{"법령": []}"#));
    let args = StatuteSearchArgs {
        display: 1000,
        page: 0,
        ..StatuteSearchArgs::query("x")
    };
    tools.search_laws(&args).await;
    let (_, p) = &transport.calls()[0];
    assert_eq!(p.get("display"), Some("100"));
    assert_eq!(p.get("page"), Some("1"));
}

// ── article detail ──────────────────────────────────────────────────────

#[tokio::test]
async fn article_detail_requires_law_identifier_without_network() {
    let (tools, transport) = tools(ScriptedTransport::new());
    let args = ArticleDetailArgs {
        article: "000200".into(),
        ..Default::default()
    };
    let out = tools.get_law_article_detail(&args).await;
    assert_eq!(parse(&out)["error"], "law_id or law_mst is required.");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn article_detail_requires_article_number() {
    let (tools, transport) = tools(ScriptedTransport::new());
    let args = ArticleDetailArgs {
        law_id: "001823".into(),
        ..Default::default()
    };
    let out = tools.get_law_article_detail(&args).await;
    assert_eq!(parse(&out)["error"], "article is required.");
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test]
async fn article_detail_master_number_wins_and_sub_item_is_encoded() {
    let (tools, transport) = tools(ScriptedTransport::new().respond("XML", ARTICLE_ALL_LEVELS));
    let args = ArticleDetailArgs {
        law_id: "001823".into(),
        law_mst: "253527".into(),
        article: "000200".into(),
        paragraph: "000100".into(),
        item: "000100".into(),
        sub_item: "가".into(),
        response_type: Some("XML".into()),
    };
    tools.get_law_article_detail(&args).await;

    let (url, p) = &transport.calls()[0];
    assert_eq!(url, SERVICE_URL);
    assert_eq!(p.get("target"), Some("lawjosub"));
    assert_eq!(p.get("MST"), Some("253527"));
    assert_eq!(p.get("ID"), None);
    assert_eq!(p.get("JO"), Some("000200"));
    assert_eq!(p.get("HANG"), Some("000100"));
    assert_eq!(p.get("HO"), Some("000100"));
    assert_eq!(p.get("MOK"), Some("%EA%B0%80"));
}

#[tokio::test]
async fn article_detail_sub_item_selects_sub_item_content() {
    let body = r#"<LawJosubService>
  <조문내용>&lt;![CDATA[제2조(정의)]]&gt;</조문내용>
  <항내용>&lt;![CDATA[① 항]]&gt;</항내용>
  <호내용>&lt;![CDATA[1. 호]]&gt;</호내용>
</LawJosubService>"#;
    let args = ArticleDetailArgs {
        law_id: "001823".into(),
        article: "000200".into(),
        item: "000100".into(),
        sub_item: "가".into(),
        response_type: Some("XML".into()),
        ..Default::default()
    };

    // Item content alone does not satisfy a sub-item request.
    let (without, _) = tools(ScriptedTransport::new().respond("XML", body));
    assert_eq!(without.get_law_article_detail(&args).await, ARTICLE_CONTENT_NOT_FOUND);

    let (with, _) = tools(ScriptedTransport::new().respond("XML", ARTICLE_ALL_LEVELS));
    let out = with.get_law_article_detail(&args).await;
    assert_eq!(parse(&out)["LawJosubService"]["목내용"], "가. 목 내용");
}

#[tokio::test]
async fn article_detail_json_shape() {
    let args = ArticleDetailArgs {
        law_id: "001823".into(),
        article: "000200".into(),
        ..Default::default()
    };

    let found = r#"{"법령": {"조문": {"조문단위": {"조문내용": "제2조(정의)"}}}}"#;
    let (tools_found, _) = tools(ScriptedTransport::new().respond("JSON", found));
    let out = tools_found.get_law_article_detail(&args).await;
    assert_eq!(parse(&out)["법령"]["조문"]["조문단위"]["조문내용"], "제2조(정의)");

    let no_unit = r#"{"법령": {"기본정보": {}}}"#;
    let (tools_no_unit, _) = tools(ScriptedTransport::new().respond("JSON", no_unit));
    assert_eq!(tools_no_unit.get_law_article_detail(&args).await, ARTICLE_INFO_NOT_FOUND);

    let no_content = r#"{"법령": {"조문": {"조문단위": {"조문번호": "2"}}}}"#;
    let (tools_no_content, _) = tools(ScriptedTransport::new().respond("JSON", no_content));
    assert_eq!(tools_no_content.get_law_article_detail(&args).await, ARTICLE_CONTENT_NOT_FOUND);
}

#[tokio::test]
async fn article_detail_other_shape_is_unexpected() {
    let (tools, _) = tools(ScriptedTransport::new().respond("XML", PREC_SEARCH_EMPTY));
    let args = ArticleDetailArgs {
        law_id: "001823".into(),
        article: "000200".into(),
        response_type: Some("XML".into()),
        ..Default::default()
    };
    assert_eq!(tools.get_law_article_detail(&args).await, UNEXPECTED_STRUCTURE);
}

// ── idempotence ─────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_calls_are_byte_identical() {
    let (tools, transport) = tools(
        ScriptedTransport::new()
            .respond("XML", PREC_SEARCH_TWO)
            .respond("JSON", r#"{"법령": [{"법령ID": "001706"}]}"#),
    );
    let prec = PrecedentSearchArgs::query("사건");
    let laws = StatuteSearchArgs::query("민법");
    let detail = PrecedentDetailArgs::id("1");
    let article = ArticleDetailArgs {
        law_id: "001706".into(),
        article: "000100".into(),
        ..Default::default()
    };

    assert_eq!(tools.search_precedents(&prec).await, tools.search_precedents(&prec).await);
    assert_eq!(tools.search_laws(&laws).await, tools.search_laws(&laws).await);
    assert_eq!(tools.get_precedent_detail(&detail).await, tools.get_precedent_detail(&detail).await);
    assert_eq!(
        tools.get_law_article_detail(&article).await,
        tools.get_law_article_detail(&article).await
    );
    assert_eq!(transport.call_count(), 8);
}
