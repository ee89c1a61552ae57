//! Line-delimited JSON-RPC 2.0 server over stdio.
//!
//! Each input line holds one request; each response is written as one line.
//! Notifications (requests without an id under `notifications/`) get no
//! response. Logs go to stderr, so stdout carries protocol traffic only.

use super::dispatch::RpcMethod;
use super::params::{
    AppendParams, CallToolParams, CaptureParams, ReadResourceParams, RepoParams, ResolveParams,
    StateParams,
};
use super::resources;
use crate::models::RepoId;
use crate::services::MonitorService;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::info_span;

/// Maximum request size (1MB).
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Protocol version reported by `initialize`.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server name.
const SERVER_NAME: &str = "agentlog";

/// Name of the single tool.
pub const ADD_MEMORY_TOOL: &str = "add_memory";

/// Invalid JSON.
pub const PARSE_ERROR: i32 = -32700;
/// Malformed or oversize request.
pub const INVALID_REQUEST: i32 = -32600;
/// Unknown method.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Params missing or of the wrong shape.
pub const INVALID_PARAMS: i32 = -32602;
/// Store or pipeline error.
pub const INTERNAL_ERROR: i32 = -32603;

/// Result type for method dispatch.
type DispatchResult = std::result::Result<Value, (i32, String)>;

/// JSON-RPC adapter over a [`MonitorService`].
pub struct RpcServer {
    service: Arc<MonitorService>,
}

impl RpcServer {
    /// Creates a server for the given service.
    #[must_use]
    pub const fn new(service: Arc<MonitorService>) -> Self {
        Self { service }
    }

    /// Serves requests from stdin until it closes.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin cannot be read or stdout cannot be written.
    pub fn run_stdio(&self) -> Result<()> {
        let stdin = std::io::stdin();
        self.serve(stdin.lock(), std::io::stdout())
    }

    /// Serves requests from `reader`, writing responses to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or writing fails.
    pub fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> Result<()> {
        for line in reader.lines() {
            let line = line.map_err(|e| Error::operation("read_request", e))?;
            if line.trim().is_empty() {
                continue;
            }

            let Some(response) = self.handle_request(&line) else {
                continue;
            };
            writeln!(writer, "{response}").map_err(|e| Error::operation("write_response", e))?;
            writer
                .flush()
                .map_err(|e| Error::operation("flush_response", e))?;
        }
        Ok(())
    }

    /// Handles one request line, returning the response line if one is due.
    #[must_use]
    pub fn handle_request(&self, request: &str) -> Option<String> {
        if request.len() > MAX_REQUEST_BODY_SIZE {
            tracing::warn!(
                request_size = request.len(),
                max_size = MAX_REQUEST_BODY_SIZE,
                "Request exceeds maximum size limit"
            );
            return Some(format_error(
                None,
                INVALID_REQUEST,
                &format!(
                    "Request too large: {} bytes (max: {MAX_REQUEST_BODY_SIZE} bytes)",
                    request.len()
                ),
            ));
        }

        let start = Instant::now();
        let span = info_span!(
            "agentlog.rpc",
            rpc.method = tracing::field::Empty,
            rpc.id = tracing::field::Empty,
            status = tracing::field::Empty
        );
        let _guard = span.enter();

        let mut method_label = "parse_error".to_string();
        let mut status_label = "error";
        let response = match serde_json::from_str::<JsonRpcRequest>(request) {
            Ok(req) => {
                method_label.clone_from(&req.method);
                span.record("rpc.method", method_label.as_str());
                if let Some(id) = &req.id {
                    span.record("rpc.id", id.to_string().as_str());
                }

                if req.id.is_none() && req.method.starts_with("notifications/") {
                    tracing::debug!(method = %req.method, "Ignoring notification");
                    return None;
                }

                let result = self.dispatch_method(&req.method, req.params);
                status_label = if result.is_ok() { "success" } else { "error" };
                span.record("status", status_label);
                format_response(req.id, result)
            },
            Err(e) => {
                span.record("status", "parse_error");
                format_error(None, PARSE_ERROR, &format!("Parse error: {e}"))
            },
        };

        metrics::counter!(
            "agentlog_rpc_requests_total",
            "method" => method_label.clone(),
            "status" => status_label
        )
        .increment(1);
        metrics::histogram!("agentlog_rpc_request_duration_ms", "method" => method_label)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        Some(response)
    }

    fn dispatch_method(&self, method: &str, params: Option<Value>) -> DispatchResult {
        match RpcMethod::from(method) {
            RpcMethod::Initialize => Ok(handle_initialize()),
            RpcMethod::Ping => Ok(json!({})),
            RpcMethod::ListRepos => self.handle_list_repos(),
            RpcMethod::ResolveRepo => self.handle_resolve(parse_params(params)?),
            RpcMethod::ReadMemory => self.handle_read_memory(parse_params(params)?),
            RpcMethod::AppendMemory => self.handle_append(parse_params(params)?),
            RpcMethod::CaptureRaw => self.handle_capture(parse_params(params)?),
            RpcMethod::WriteState => self.handle_write_state(parse_params(params)?),
            RpcMethod::Status => Ok(self.handle_status()),
            RpcMethod::StartWatcher => {
                let status = self.service.start().map_err(map_error)?;
                Ok(json!({ "status": status }))
            },
            RpcMethod::StopWatcher => Ok(json!({ "status": self.service.stop() })),
            RpcMethod::ListResources => self.handle_list_resources(),
            RpcMethod::ReadResource => self.handle_read_resource(parse_params(params)?),
            RpcMethod::ListTools => Ok(handle_list_tools()),
            RpcMethod::CallTool => self.handle_call_tool(parse_params(params)?),
            RpcMethod::Unknown(name) => Err((METHOD_NOT_FOUND, format!("Method not found: {name}"))),
        }
    }

    fn handle_list_repos(&self) -> DispatchResult {
        let repos: Vec<Value> = self
            .service
            .list_repos()
            .map_err(map_error)?
            .into_iter()
            .map(|(id, path)| json!({ "id": id, "path": path }))
            .collect();
        Ok(json!({ "repos": repos }))
    }

    fn handle_resolve(&self, params: ResolveParams) -> DispatchResult {
        Ok(json!({ "repo_id": self.service.resolve_repo(&params.path) }))
    }

    fn handle_read_memory(&self, params: RepoParams) -> DispatchResult {
        let repo = parse_repo(&params.repo_id)?;
        let snapshot = self.service.read_memory(&repo).map_err(map_error)?;
        serde_json::to_value(snapshot).map_err(|e| (INTERNAL_ERROR, e.to_string()))
    }

    fn handle_append(&self, params: AppendParams) -> DispatchResult {
        let repo = parse_repo(&params.repo_id)?;
        self.service
            .append_memory(&repo, params.kind, &params.text, params.timestamp)
            .map_err(map_error)?;
        Ok(json!({ "status": "ok", "repo_id": repo, "kind": params.kind }))
    }

    fn handle_capture(&self, params: CaptureParams) -> DispatchResult {
        let repo = parse_repo(&params.repo_id)?;
        let raw_path = self
            .service
            .capture_raw(&repo, &params.path)
            .map_err(map_error)?;
        Ok(json!({ "raw_path": raw_path }))
    }

    fn handle_write_state(&self, params: StateParams) -> DispatchResult {
        let repo = parse_repo(&params.repo_id)?;
        self.service
            .write_state(&repo, &params.state)
            .map_err(map_error)?;
        Ok(json!({ "status": "ok" }))
    }

    fn handle_status(&self) -> Value {
        json!({
            "running": self.service.is_running(),
            "activity": self.service.current_status(),
        })
    }

    fn handle_list_resources(&self) -> DispatchResult {
        let repos = self.service.list_repos().map_err(map_error)?;
        Ok(json!({ "resources": resources::list_resources(repos.keys()) }))
    }

    fn handle_read_resource(&self, params: ReadResourceParams) -> DispatchResult {
        let (repo, document) = resources::parse_uri(&params.uri).map_err(map_error)?;
        let snapshot = self.service.read_memory(&repo).map_err(map_error)?;
        let content = resources::render(&params.uri, document, &snapshot).map_err(map_error)?;
        Ok(json!({ "contents": [content] }))
    }

    fn handle_call_tool(&self, params: CallToolParams) -> DispatchResult {
        let span = info_span!("agentlog.rpc.tool", tool.name = params.name.as_str());
        let _guard = span.enter();

        if params.name != ADD_MEMORY_TOOL {
            return Err((INVALID_PARAMS, format!("Unknown tool: {}", params.name)));
        }
        let args: AppendParams = parse_params(Some(params.arguments))?;
        let repo = parse_repo(&args.repo_id)?;
        let (text, is_error) = match self
            .service
            .append_memory(&repo, args.kind, &args.text, args.timestamp)
        {
            Ok(()) => (format!("Recorded {} for {repo}", args.kind), false),
            Err(e) => (format!("Failed to record memory: {e}"), true),
        };
        Ok(json!({
            "content": [{ "type": "text", "text": text }],
            "isError": is_error,
        }))
    }
}

fn handle_initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "tools": {},
            "resources": {}
        },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

fn handle_list_tools() -> Value {
    json!({
        "tools": [{
            "name": ADD_MEMORY_TOOL,
            "description": "Append an attempt, failure or decision to a repository's memory",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "repo_id": {
                        "type": "string",
                        "description": "Repository id (see repos/list)"
                    },
                    "kind": {
                        "type": "string",
                        "enum": ["attempt", "failure", "decision"]
                    },
                    "text": {
                        "type": "string",
                        "description": "Entry text; the first line of a failure is its signature"
                    }
                },
                "required": ["repo_id", "kind", "text"]
            }
        }]
    })
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> std::result::Result<T, (i32, String)> {
    let params = params.ok_or_else(|| (INVALID_PARAMS, "Missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| (INVALID_PARAMS, format!("Invalid params: {e}")))
}

fn parse_repo(id: &str) -> std::result::Result<RepoId, (i32, String)> {
    RepoId::parse(id).map_err(map_error)
}

#[allow(clippy::needless_pass_by_value)]
fn map_error(e: Error) -> (i32, String) {
    match e {
        Error::InvalidInput(_) | Error::InvalidConfig(_) => (INVALID_PARAMS, e.to_string()),
        Error::OperationFailed { .. } => (INTERNAL_ERROR, e.to_string()),
    }
}

fn format_response(id: Option<Value>, result: DispatchResult) -> String {
    match result {
        Ok(value) => {
            let response = JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(value),
                error: None,
            };
            serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string())
        },
        Err((code, message)) => format_error(id, code, &message),
    }
}

fn format_error(id: Option<Value>, code: i32, message: &str) -> String {
    let response = JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
        }),
    };
    serde_json::to_string(&response).unwrap_or_else(|_| "{}".to_string())
}

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    /// JSON-RPC version (required by protocol but not used in code).
    #[serde(rename = "jsonrpc")]
    _jsonrpc: String,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}
