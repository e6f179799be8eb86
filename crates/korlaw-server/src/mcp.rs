//! Model Context Protocol over stdio: newline-delimited JSON-RPC 2.0.

use std::sync::Arc;

use anyhow::Result;
use korlaw_domains::{
    ArticleDetailArgs, LawTools, PrecedentDetailArgs, PrecedentSearchArgs, StatuteSearchArgs,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::logging::LogThreshold;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "korea-law";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

// ── JSON-RPC types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// Absent on notifications.
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn err(id: Value, code: i64, message: String) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

fn tool_text(text: String, is_error: bool) -> Value {
    let mut result = json!({ "content": [{ "type": "text", "text": text }] });
    if is_error {
        result["isError"] = Value::Bool(true);
    }
    result
}

// ── Tools ─────────────────────────────────────────────────────────────────

fn response_type_schema(default: &str) -> Value {
    json!({
        "type": "string",
        "enum": ["JSON", "XML", "HTML"],
        "default": default,
        "description": "Format requested from law.go.kr. JSON falls back to XML once when the body is `{}` or unparseable."
    })
}

fn search_type_schema() -> Value {
    json!({
        "type": "integer",
        "enum": [1, 2],
        "default": 1,
        "description": "1 searches titles, 2 searches full text."
    })
}

pub fn tool_definitions() -> Value {
    json!({
        "tools": [
            {
                "name": "search_precedents",
                "description": "Search Korean court precedents (판례) on law.go.kr.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Search keywords." },
                        "court": { "type": "string", "description": "Court name, e.g. 대법원." },
                        "court_type": { "type": "string", "description": "400201 for the Supreme Court, 400202 for lower courts." },
                        "sort": { "type": "string", "enum": ["ddes", "dasc", "lasc"], "default": "ddes" },
                        "date_range": { "type": "string", "description": "Decision date range, YYYYMMDD~YYYYMMDD." },
                        "search_type": search_type_schema(),
                        "case_number": { "type": "string", "description": "Case number, e.g. 2020다12345." },
                        "limit": { "type": "integer", "minimum": 1, "maximum": 100, "default": 10 },
                        "response_type": response_type_schema("XML")
                    }
                }
            },
            {
                "name": "get_precedent_detail",
                "description": "Fetch the full record of one precedent by its serial number.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "precedent_id": { "type": "string", "description": "판례일련번호 from a search result." },
                        "response_type": response_type_schema("XML")
                    },
                    "required": ["precedent_id"]
                }
            },
            {
                "name": "search_laws",
                "description": "Search Korean statutes (법령) by name or body text.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "query": { "type": "string", "description": "Statute name or keywords." },
                        "search_type": search_type_schema(),
                        "display": { "type": "integer", "minimum": 1, "maximum": 100, "default": 10 },
                        "page": { "type": "integer", "minimum": 1, "default": 1 },
                        "sort": { "type": "string", "enum": ["lasc", "ldes", "dasc", "ddes"], "default": "lasc" },
                        "response_type": response_type_schema("JSON")
                    }
                }
            },
            {
                "name": "get_law_article_detail",
                "description": "Fetch the text of a statute article, or of one paragraph, item or sub-item in it. Numbers are six-digit codes: 제2조 is 000200.",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "law_id": { "type": "string", "description": "법령ID from a statute search." },
                        "law_mst": { "type": "string", "description": "법령일련번호; wins over law_id." },
                        "article": { "type": "string", "description": "Article number, e.g. 000200." },
                        "paragraph": { "type": "string", "description": "Paragraph number, e.g. 000100." },
                        "item": { "type": "string", "description": "Item number, e.g. 000100." },
                        "sub_item": { "type": "string", "description": "Sub-item letter, e.g. 가." },
                        "response_type": response_type_schema("JSON")
                    },
                    "required": ["article"]
                }
            }
        ]
    })
}

/// A `tools/call` with its arguments already deserialized.
enum ToolCall {
    SearchPrecedents(PrecedentSearchArgs),
    PrecedentDetail(PrecedentDetailArgs),
    SearchLaws(StatuteSearchArgs),
    ArticleDetail(ArticleDetailArgs),
}

impl ToolCall {
    fn parse(name: &str, arguments: Value) -> Result<Self, String> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        let parsed = match name {
            "search_precedents" => serde_json::from_value(arguments).map(Self::SearchPrecedents),
            "get_precedent_detail" => serde_json::from_value(arguments).map(Self::PrecedentDetail),
            "search_laws" => serde_json::from_value(arguments).map(Self::SearchLaws),
            "get_law_article_detail" => serde_json::from_value(arguments).map(Self::ArticleDetail),
            other => return Err(format!("Unknown tool: {other}")),
        };
        parsed.map_err(|e| format!("Invalid arguments for {name}: {e}"))
    }

    async fn run(self, tools: &LawTools) -> String {
        match self {
            Self::SearchPrecedents(args) => tools.search_precedents(&args).await,
            Self::PrecedentDetail(args) => tools.get_precedent_detail(&args).await,
            Self::SearchLaws(args) => tools.search_laws(&args).await,
            Self::ArticleDetail(args) => tools.get_law_article_detail(&args).await,
        }
    }
}

// ── Server ────────────────────────────────────────────────────────────────

pub struct McpServer {
    tools: LawTools,
    log_threshold: LogThreshold,
}

impl McpServer {
    pub(crate) fn new(tools: LawTools, log_threshold: LogThreshold) -> Self {
        Self {
            tools,
            log_threshold,
        }
    }

    /// Everything except `tools/call`, which runs on its own task.
    fn handle(&self, id: Value, method: &str, params: &Value) -> JsonRpcResponse {
        match method {
            "initialize" => JsonRpcResponse::ok(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {}, "logging": {} },
                    "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
                }),
            ),
            "ping" => JsonRpcResponse::ok(id, json!({})),
            "tools/list" => JsonRpcResponse::ok(id, tool_definitions()),
            "logging/setLevel" => {
                let level = params.get("level").and_then(Value::as_str).unwrap_or_default();
                if self.log_threshold.set(level) {
                    JsonRpcResponse::ok(id, json!({}))
                } else {
                    JsonRpcResponse::err(id, INVALID_PARAMS, format!("Unknown log level: {level}"))
                }
            }
            other => JsonRpcResponse::err(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        }
    }

    async fn call_tool(self: Arc<Self>, id: Value, params: Value) -> JsonRpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str).map(str::to_string) else {
            return JsonRpcResponse::err(id, INVALID_PARAMS, "tools/call requires a tool name".into());
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        let call = match ToolCall::parse(&name, arguments) {
            Ok(call) => call,
            Err(message) => {
                warn!(tool = %name, %message, "rejected tool call");
                return JsonRpcResponse::ok(id, tool_text(message, true));
            }
        };

        info!(tool = %name, "tool call");
        // A panic inside the interpreter surfaces here as a JoinError.
        let run = tokio::spawn(async move { call.run(&self.tools).await });
        match run.await {
            Ok(text) => JsonRpcResponse::ok(id, tool_text(text, false)),
            Err(e) => {
                error!(tool = %name, "tool task failed: {e}");
                JsonRpcResponse::ok(id, tool_text(format!("Internal error in {name}: {e}"), true))
            }
        }
    }
}

fn send(tx: &mpsc::UnboundedSender<String>, response: &JsonRpcResponse) {
    match serde_json::to_string(response) {
        Ok(line) => {
            let _ = tx.send(line);
        }
        Err(e) => error!("failed to serialize response: {e}"),
    }
}

async fn write_lines<W>(mut output: W, mut rx: mpsc::UnboundedReceiver<String>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = rx.recv().await {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

/// Read requests from `input` until EOF, answering on `output`. Every line
/// written goes through `out_tx`; log notifications share the same channel.
/// Returns once in-flight calls have finished and the channel has drained.
pub async fn serve<R, W>(
    server: Arc<McpServer>,
    input: R,
    output: W,
    out_tx: mpsc::UnboundedSender<String>,
    out_rx: mpsc::UnboundedReceiver<String>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let writer = tokio::spawn(write_lines(output, out_rx));
    let mut calls = JoinSet::new();
    let mut lines = BufReader::new(input).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!("unparseable request line: {e}");
                send(
                    &out_tx,
                    &JsonRpcResponse::err(Value::Null, PARSE_ERROR, format!("Parse error: {e}")),
                );
                continue;
            }
        };
        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            continue;
        };

        if request.method == "tools/call" {
            let server = server.clone();
            let tx = out_tx.clone();
            calls.spawn(async move {
                let response = server.call_tool(id, request.params).await;
                send(&tx, &response);
            });
        } else {
            send(&out_tx, &server.handle(id, &request.method, &request.params));
        }
    }

    debug!(in_flight = calls.len(), "input closed");
    while calls.join_next().await.is_some() {}
    drop(out_tx);
    writer.await??;
    Ok(())
}
