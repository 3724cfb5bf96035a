//! MCP JSON-RPC 2.0 message types for the streamable HTTP transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision offered during the handshake
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Header carrying the session id assigned by the server
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Header carrying the negotiated protocol revision
pub const PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Whether this response answers the request with `id`
    pub fn answers(&self, id: u64) -> bool {
        match &self.id {
            Some(Value::Number(n)) => n.as_u64() == Some(id),
            Some(Value::String(s)) => s.parse::<u64>().ok() == Some(id),
            _ => false,
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

/// MCP initialize response.
#[derive(Debug, Clone, Deserialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    #[serde(default, rename = "serverInfo")]
    pub server_info: Option<ServerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// MCP tool call result from the `tools/call` response.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default, rename = "structuredContent")]
    pub structured_content: Option<Value>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

/// MCP content block.
#[derive(Debug, Clone, Deserialize)]
pub struct Content {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl CallToolResult {
    /// First text block, if any
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|c| c.content_type == "text")
            .and_then(|c| c.text.as_deref())
    }

    /// The tool's output as JSON.
    ///
    /// Structured content wins; otherwise the first text block is parsed as
    /// JSON, or returned as a plain string when it is not JSON.
    pub fn into_value(self) -> Value {
        if let Some(structured) = self.structured_content {
            return structured;
        }

        match self.text() {
            Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
            None => Value::Null,
        }
    }
}

/// Find the response to request `id` in a reply body.
///
/// Streamable HTTP servers answer either with a plain JSON body or with an
/// SSE stream whose `data:` lines carry JSON-RPC messages.
pub fn parse_reply(body: &str, id: u64) -> Option<JsonRpcResponse> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return parse_messages(trimmed, id);
    }

    sse_events(body)
        .iter()
        .find_map(|data| parse_messages(data, id))
}

fn parse_messages(json: &str, id: u64) -> Option<JsonRpcResponse> {
    match serde_json::from_str::<Value>(json).ok()? {
        Value::Array(batch) => batch
            .into_iter()
            .filter_map(|m| serde_json::from_value::<JsonRpcResponse>(m).ok())
            .find(|r| r.answers(id)),
        message => serde_json::from_value::<JsonRpcResponse>(message)
            .ok()
            .filter(|r| r.answers(id)),
    }
}

/// Data payloads of the events in an SSE body, multi-line data joined by `\n`
fn sse_events(body: &str) -> Vec<String> {
    let mut events = Vec::new();
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            if !data.is_empty() {
                events.push(data.join("\n"));
                data.clear();
            }
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if !data.is_empty() {
        events.push(data.join("\n"));
    }

    events
}
