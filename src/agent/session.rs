//! MCP session client
//!
//! Direct-POST JSON-RPC over HTTP. Every request carries the session's
//! client identifier in the `X-Client-ID` header so the bridge can resolve
//! tenant identity without a browser session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, header};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{
    JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, RequestId, Tool, ToolsCallResult,
    ToolsListResult,
};
use crate::{Error, Result};

/// Client-side MCP session against a bridge server
pub struct McpSession {
    /// HTTP client
    client: Client,
    /// Bridge server base URL
    server_url: String,
    /// JSON-RPC endpoint (`<server>/mcp`)
    endpoint: String,
    /// Opaque per-tenant identifier, held for the process lifetime
    client_id: String,
    /// Request ID counter
    request_id: AtomicU64,
    /// Connected flag
    connected: AtomicBool,
}

impl McpSession {
    /// Create a session. A client identifier is generated when not supplied.
    pub fn new(server_url: &str, client_id: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        let server_url = server_url.trim_end_matches('/').to_string();
        let endpoint = format!("{server_url}/mcp");

        Ok(Self {
            client,
            server_url,
            endpoint,
            client_id: client_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            request_id: AtomicU64::new(1),
            connected: AtomicBool::new(false),
        })
    }

    /// The session's client identifier
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Browser URL that starts the authorization flow for this session
    #[must_use]
    pub fn authorize_url(&self) -> String {
        let encoded: String =
            url::form_urlencoded::byte_serialize(self.client_id.as_bytes()).collect();
        format!("{}/authorize?client_id={encoded}", self.server_url)
    }

    /// Perform the MCP handshake
    pub async fn initialize(&self) -> Result<()> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: RequestId::Number(0),
            method: "initialize".to_string(),
            params: Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "drive-mcp-bridge-agent",
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
        };

        let response = self.send_request(&request).await?;
        if response.error.is_some() {
            return Err(Error::Protocol("Initialize failed".to_string()));
        }

        self.notify("notifications/initialized", None).await?;
        self.connected.store(true, Ordering::Relaxed);
        debug!(url = %self.endpoint, client = %self.client_id, "MCP session initialized");

        Ok(())
    }

    /// List the tools advertised by the bridge
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result = self.request("tools/list", None).await?;
        let list: ToolsListResult = serde_json::from_value(result)?;
        Ok(list.tools)
    }

    /// Invoke a tool by name
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolsCallResult> {
        let result = self
            .request(
                "tools/call",
                Some(json!({"name": name, "arguments": arguments})),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a request and unwrap the JSON-RPC result
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: self.next_id(),
            method: method.to_string(),
            params,
        };

        let response = self.send_request(&request).await?;

        if let Some(error) = response.error {
            return Err(Error::JsonRpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn send_request(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header("X-Client-ID", &self.client_id)
            .json(request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!("HTTP {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse response: {e}")))
    }

    /// Send a notification (no id, no response body expected)
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Client-ID", &self.client_id)
            .json(&notification)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Notification failed: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Notification failed");
        }

        Ok(())
    }

    /// Whether the handshake completed
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Tear down the session. Best-effort; safe on every exit path.
    pub async fn close(&self) {
        self.connected.store(false, Ordering::Relaxed);

        if let Err(e) = self
            .client
            .delete(&self.endpoint)
            .header("X-Client-ID", &self.client_id)
            .send()
            .await
        {
            debug!(error = %e, "Session delete failed");
        } else {
            info!(client = %self.client_id, "MCP session closed");
        }
    }

    fn next_id(&self) -> RequestId {
        let id = i64::try_from(self.request_id.fetch_add(1, Ordering::Relaxed)).unwrap_or(0);
        RequestId::Number(id)
    }
}
