//! MCP client: calls the single tool of a remote tool server over
//! streamable HTTP.
//!
//! Every call opens a fresh session (`initialize` then
//! `notifications/initialized`), invokes the tool once with arguments
//! `{"request": payload}` and closes the session again.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::protocol::*;
use crate::services::ServiceKind;

/// Errors raised while talking to a tool server
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP exchange itself failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with something that is not valid MCP
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The server answered with a JSON-RPC error
    #[error("MCP error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The tool ran and reported a failure
    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Call timed out after {0:?}")]
    Timeout(Duration),

    #[error("No client configured for '{0}'")]
    UnknownService(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Something that can invoke a remote tool with a JSON payload
#[async_trait]
pub trait ToolCaller: Send + Sync + std::fmt::Debug {
    /// Invoke the tool and return its structured output
    async fn call(&self, payload: Value) -> Result<Value, ClientError>;

    /// Whether the server completes the handshake
    async fn health(&self) -> bool;
}

#[derive(Debug, Default)]
struct Session {
    id: Option<String>,
    protocol_version: Option<String>,
}

/// Client bound to one tool on one MCP server
#[derive(Debug)]
pub struct McpClient {
    url: String,
    tool_name: String,
    http: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl McpClient {
    pub fn new(
        url: impl Into<String>,
        tool_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(crate::utils::default_user_agent())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            url: url.into(),
            tool_name: tool_name.into(),
            http,
            timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Client for the tool of a well-known service
    pub fn for_service(
        kind: ServiceKind,
        url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        Self::new(url, kind.tool_name(), timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    fn post(&self, session: &Session) -> reqwest::RequestBuilder {
        let mut builder = self.http.post(&self.url).header(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );
        if let Some(id) = &session.id {
            builder = builder.header(SESSION_HEADER, id);
        }
        if let Some(version) = &session.protocol_version {
            builder = builder.header(PROTOCOL_VERSION_HEADER, version);
        }
        builder
    }

    /// Send a JSON-RPC request and return its result, along with the session
    /// id the server may have assigned
    async fn request(
        &self,
        session: &Session,
        method: &str,
        params: Option<Value>,
    ) -> Result<(Value, Option<String>), ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let response = self.post(session).json(&req).send().await?;
        let status = response.status();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        if !status.is_success() {
            // Some servers report JSON-RPC errors with a 4xx status
            if let Some(JsonRpcResponse { error: Some(err), .. }) = parse_reply(&body, id) {
                return Err(ClientError::Rpc {
                    code: err.code,
                    message: err.message,
                });
            }
            return Err(ClientError::Transport(format!(
                "'{}' returned HTTP {}",
                method, status
            )));
        }

        let reply = parse_reply(&body, id).ok_or_else(|| {
            ClientError::Protocol(format!("No response to '{}' in server reply", method))
        })?;

        if let Some(err) = reply.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = reply
            .result
            .ok_or_else(|| ClientError::Protocol(format!("Empty '{}' result", method)))?;

        Ok((result, session_id))
    }

    async fn notify(&self, session: &Session, method: &str) -> Result<(), ClientError> {
        let response = self
            .post(session)
            .json(&JsonRpcNotification::new(method))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Transport(format!(
                "'{}' returned HTTP {}",
                method, status
            )))
        }
    }

    /// Perform the initialize handshake
    async fn open_session(&self) -> Result<Session, ClientError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let (result, session_id) = self
            .request(&Session::default(), "initialize", Some(params))
            .await?;
        let init: InitializeResult = serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Failed to parse initialize result: {}", e)))?;

        debug!(
            url = %self.url,
            version = %init.protocol_version,
            server = init.server_info.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown"),
            "MCP session initialized"
        );

        let session = Session {
            id: session_id,
            protocol_version: Some(init.protocol_version),
        };
        self.notify(&session, "notifications/initialized").await?;

        Ok(session)
    }

    /// Terminate a session; failures are ignored
    async fn close_session(&self, session: &Session) {
        let Some(id) = &session.id else {
            return;
        };

        let result = self
            .http
            .delete(&self.url)
            .header(SESSION_HEADER, id)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) if response.status() == StatusCode::METHOD_NOT_ALLOWED => {}
            Ok(response) => debug!(status = %response.status(), "Session close rejected"),
            Err(e) => debug!(error = %e, "Session close failed"),
        }
    }

    async fn call_once(&self, payload: Value) -> Result<Value, ClientError> {
        let session = self.open_session().await?;

        let params = serde_json::json!({
            "name": self.tool_name,
            "arguments": { "request": payload },
        });
        let outcome = self.request(&session, "tools/call", Some(params)).await;
        self.close_session(&session).await;

        let (result, _) = outcome?;
        let result: CallToolResult = serde_json::from_value(result)
            .map_err(|e| ClientError::Protocol(format!("Failed to parse tool result: {}", e)))?;

        if result.is_error {
            let message = result.text().unwrap_or("tool reported an error").to_string();
            return Err(ClientError::Tool(message));
        }

        Ok(result.into_value())
    }
}

#[async_trait]
impl ToolCaller for McpClient {
    async fn call(&self, payload: Value) -> Result<Value, ClientError> {
        tokio::time::timeout(self.timeout, self.call_once(payload))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    async fn health(&self) -> bool {
        let handshake = async {
            let session = self.open_session().await?;
            self.close_session(&session).await;
            Ok::<_, ClientError>(())
        };

        match tokio::time::timeout(self.timeout, handshake).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(url = %self.url, error = %e, "Health check failed");
                false
            }
            Err(_) => {
                warn!(url = %self.url, "Health check timed out");
                false
            }
        }
    }
}
