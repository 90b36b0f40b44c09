use crate::transport::LineTransport;
use pdf_kb_core::{
    PdfToolkit, ToolOutcome, DEFAULT_CONTEXT_CHARS, DEFAULT_MAX_CHARS_PER_CHUNK,
    DEFAULT_MAX_RESULTS, DEFAULT_OVERLAP_PAGES,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::{debug, info, warn};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "pdf-processor";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct MetadataArgs {
    pdf_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ExtractArgs {
    pdf_path: PathBuf,
    #[serde(default = "default_start_page")]
    start_page: i64,
    #[serde(default)]
    end_page: Option<i64>,
    #[serde(default)]
    max_chars: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    pdf_path: PathBuf,
    query: String,
    #[serde(default = "default_context_chars")]
    context_chars: usize,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct ChunkArgs {
    pdf_path: PathBuf,
    #[serde(default = "default_max_chars_per_chunk")]
    max_chars_per_chunk: usize,
    #[serde(default = "default_overlap_pages")]
    overlap_pages: u32,
}

fn default_start_page() -> i64 {
    1
}

fn default_context_chars() -> usize {
    DEFAULT_CONTEXT_CHARS
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

fn default_max_chars_per_chunk() -> usize {
    DEFAULT_MAX_CHARS_PER_CHUNK
}

fn default_overlap_pages() -> u32 {
    DEFAULT_OVERLAP_PAGES
}

/// Page numbers arrive as JSON integers; anything outside `u32` saturates so
/// range validation reports it.
fn page_number(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Stateless dispatcher for the four PDF tools.
#[derive(Clone, Default)]
pub struct ToolServer {
    toolkit: Arc<PdfToolkit>,
}

impl ToolServer {
    pub fn new(toolkit: PdfToolkit) -> Self {
        Self {
            toolkit: Arc::new(toolkit),
        }
    }

    fn tools() -> Vec<Tool> {
        vec![
            Tool {
                name: "pdf_get_metadata",
                description: "Get metadata about a PDF file including page count, file size, title, author, etc.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "pdf_path": {
                            "type": "string",
                            "description": "Full path to the PDF file"
                        }
                    },
                    "required": ["pdf_path"]
                }),
            },
            Tool {
                name: "pdf_extract_text",
                description: "Extract text from a specific range of pages in a PDF. Useful for processing large PDFs in chunks.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "pdf_path": {
                            "type": "string",
                            "description": "Full path to the PDF file"
                        },
                        "start_page": {
                            "type": "integer",
                            "description": "Starting page number (1-indexed)",
                            "default": 1
                        },
                        "end_page": {
                            "type": "integer",
                            "description": "Ending page number (inclusive). If not specified, extracts to the end."
                        },
                        "max_chars": {
                            "type": "integer",
                            "description": "Maximum characters to extract. If exceeded, extraction stops and truncated=true is returned."
                        }
                    },
                    "required": ["pdf_path"]
                }),
            },
            Tool {
                name: "pdf_search",
                description: "Search for text within a PDF and return all matches with surrounding context.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "pdf_path": {
                            "type": "string",
                            "description": "Full path to the PDF file"
                        },
                        "query": {
                            "type": "string",
                            "description": "Text to search for (case-insensitive)"
                        },
                        "context_chars": {
                            "type": "integer",
                            "description": "Number of characters to include before/after each match for context",
                            "default": DEFAULT_CONTEXT_CHARS
                        },
                        "max_results": {
                            "type": "integer",
                            "description": "Maximum number of results to return",
                            "default": DEFAULT_MAX_RESULTS
                        }
                    },
                    "required": ["pdf_path", "query"]
                }),
            },
            Tool {
                name: "pdf_get_chunks",
                description: "Calculate chunk ranges for processing a large PDF. Returns page ranges that fit within character limits.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "pdf_path": {
                            "type": "string",
                            "description": "Full path to the PDF file"
                        },
                        "max_chars_per_chunk": {
                            "type": "integer",
                            "description": "Target maximum characters per chunk",
                            "default": DEFAULT_MAX_CHARS_PER_CHUNK
                        },
                        "overlap_pages": {
                            "type": "integer",
                            "description": "Number of pages to overlap between chunks (helps maintain context)",
                            "default": DEFAULT_OVERLAP_PAGES
                        }
                    },
                    "required": ["pdf_path"]
                }),
            },
        ]
    }

    /// Serves requests until the reader hits EOF.
    pub async fn run<R, W>(&self, mut transport: LineTransport<R, W>) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(server = SERVER_NAME, "tool server listening on stdio");
        while let Some(line) = transport.read_line().await? {
            if let Some(response) = self.handle_line(&line).await {
                transport.write_message(&response).await?;
            }
        }
        info!("stdin closed, tool server stopping");
        Ok(())
    }

    /// Handles one raw message. Notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "unparseable message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {error}"),
                ));
            }
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "notification ignored");
            return None;
        };

        Some(self.handle_request(id, &request.method, request.params).await)
    }

    async fn handle_request(&self, id: Value, method: &str, params: Option<Value>) -> JsonRpcResponse {
        match method {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": Self::tools() })),
            "tools/call" => {
                let Some(params) = params else {
                    return JsonRpcResponse::failure(id, INVALID_PARAMS, "Missing params");
                };
                let Some(name) = params.get("name").and_then(Value::as_str) else {
                    return JsonRpcResponse::failure(id, INVALID_PARAMS, "Missing tool name");
                };
                let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

                match self.call_tool(name, arguments).await {
                    Ok((outcome, is_error)) => {
                        let text = serde_json::to_string_pretty(&outcome)
                            .unwrap_or_else(|_| "Error formatting result".to_string());
                        JsonRpcResponse::success(
                            id,
                            json!({
                                "content": [{ "type": "text", "text": text }],
                                "isError": is_error
                            }),
                        )
                    }
                    Err((code, message)) => JsonRpcResponse::failure(id, code, message),
                }
            }
            _ => JsonRpcResponse::failure(
                id,
                METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            ),
        }
    }

    /// Runs a tool on the blocking pool. Operation failures come back inside
    /// the outcome; only protocol problems are errors here.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<(Value, bool), (i64, String)> {
        let toolkit = Arc::clone(&self.toolkit);

        let task: Box<dyn FnOnce() -> Result<(Value, bool), serde_json::Error> + Send> = match name
        {
            "pdf_get_metadata" => {
                let args: MetadataArgs = parse_args(arguments)?;
                Box::new(move || render(toolkit.metadata(&args.pdf_path).into()))
            }
            "pdf_extract_text" => {
                let args: ExtractArgs = parse_args(arguments)?;
                Box::new(move || {
                    render(
                        toolkit
                            .extract_text(
                                &args.pdf_path,
                                page_number(args.start_page),
                                args.end_page.map(page_number),
                                args.max_chars,
                            )
                            .into(),
                    )
                })
            }
            "pdf_search" => {
                let args: SearchArgs = parse_args(arguments)?;
                Box::new(move || {
                    render(
                        toolkit
                            .search(
                                &args.pdf_path,
                                &args.query,
                                args.context_chars,
                                args.max_results,
                            )
                            .into(),
                    )
                })
            }
            "pdf_get_chunks" => {
                let args: ChunkArgs = parse_args(arguments)?;
                Box::new(move || {
                    render(
                        toolkit
                            .plan_chunks(&args.pdf_path, args.max_chars_per_chunk, args.overlap_pages)
                            .into(),
                    )
                })
            }
            _ => return Err((INVALID_PARAMS, format!("Unknown tool: {name}"))),
        };

        debug!(tool = name, "tool call");
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|error| (INTERNAL_ERROR, format!("tool task failed: {error}")))?
            .map_err(|error| (INTERNAL_ERROR, format!("failed to encode result: {error}")))
    }
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, (i64, String)> {
    serde_json::from_value(arguments)
        .map_err(|error| (INVALID_PARAMS, format!("Invalid arguments: {error}")))
}

fn render<T: Serialize>(outcome: ToolOutcome<T>) -> Result<(Value, bool), serde_json::Error> {
    let is_error = !outcome.is_success();
    if let Some(message) = outcome.error_message() {
        warn!(error = message, "tool call failed");
    }
    Ok((serde_json::to_value(&outcome)?, is_error))
}
