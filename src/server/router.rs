//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer};
use tracing::{debug, warn};

use super::tools::ToolRegistry;
use crate::auth::AuthFlowController;
use crate::error::rpc_codes;
use crate::protocol::{
    Info, InitializeResult, JsonRpcResponse, PROTOCOL_VERSION, RequestId, ServerCapabilities,
    ToolsCallParams, ToolsCapability, ToolsListResult,
};

/// Shared application state
pub struct AppState {
    /// Authorization flow controller
    pub flow: AuthFlowController,
    /// Tool registry
    pub tools: ToolRegistry,
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/authorize", get(authorize_handler))
        .route("/oauth2callback", get(callback_handler))
        .route("/mcp", post(mcp_handler).delete(mcp_delete_handler))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Authorization redirect query parameters
#[derive(Debug, Deserialize)]
struct AuthorizeParams {
    client_id: Option<String>,
}

/// GET /authorize - redirect the user to the provider consent screen
async fn authorize_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    let client_id = params.client_id.unwrap_or_default();

    match state.flow.begin_authorization(&client_id) {
        Ok(url) => Redirect::to(url.as_str()).into_response(),
        Err(e) => {
            warn!(error = %e, "Authorization request rejected");
            status_for(&e, e.to_string())
        }
    }
}

/// Authorization callback query parameters
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
}

/// GET /oauth2callback - verify the callback and store credentials
async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    let Some(code) = params.code else {
        return (StatusCode::BAD_REQUEST, "Missing code parameter").into_response();
    };
    let Some(flow_state) = params.state else {
        return (StatusCode::BAD_REQUEST, "Missing state parameter").into_response();
    };

    match state.flow.complete_authorization(&code, &flow_state).await {
        Ok(email) => (
            StatusCode::OK,
            format!("Authentication successful for user: {email}. You can close this window now."),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Authorization callback failed");
            status_for(&e, format!("Authentication error: {e}"))
        }
    }
}

fn status_for(error: &crate::Error, body: String) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, body).into_response()
}

/// POST /mcp - JSON-RPC tool protocol handler
async fn mcp_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    // Tenant identity is resolved exactly once, here, and threaded through
    let client_id = headers
        .get("x-client-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let (id, method, params) = match parse_request(&request) {
        Ok(parsed) => parsed,
        Err(response) => return (StatusCode::BAD_REQUEST, Json(response)).into_response(),
    };

    debug!(method = %method, client = client_id.as_deref().unwrap_or("-"), "MCP request");

    // Notifications carry no id and expect no body
    if method.starts_with("notifications/") {
        return (StatusCode::ACCEPTED, Json(json!({}))).into_response();
    }

    let Some(id) = id else {
        let response =
            JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "Missing request id");
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    };

    let response = match method.as_str() {
        "initialize" => handle_initialize(id),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => {
            let result = ToolsListResult {
                tools: state.tools.definitions(),
            };
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or_default())
        }
        "tools/call" => {
            let params: ToolsCallParams =
                match serde_json::from_value(params.unwrap_or(Value::Null)) {
                    Ok(p) => p,
                    Err(e) => {
                        let response = JsonRpcResponse::error(
                            Some(id),
                            rpc_codes::INVALID_PARAMS,
                            format!("Invalid tools/call params: {e}"),
                        );
                        return Json(response).into_response();
                    }
                };

            let result = state
                .tools
                .invoke(&params.name, &params.arguments, client_id.as_deref())
                .await;
            JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or_default())
        }
        _ => JsonRpcResponse::error(
            Some(id),
            rpc_codes::METHOD_NOT_FOUND,
            format!("Method not found: {method}"),
        ),
    };

    Json(response).into_response()
}

/// DELETE /mcp - session teardown (the bridge is stateless per-session)
async fn mcp_delete_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn handle_initialize(id: RequestId) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: false,
            }),
            experimental: None,
        },
        server_info: Info {
            name: "drive-mcp-bridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };

    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or_default())
}

/// Split a raw JSON-RPC message into (id, method, params)
fn parse_request(
    request: &Value,
) -> std::result::Result<(Option<RequestId>, String, Option<Value>), JsonRpcResponse> {
    let Some(method) = request.get("method").and_then(Value::as_str) else {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Missing method",
        ));
    };

    let id = match request.get("id") {
        Some(v) => Some(serde_json::from_value::<RequestId>(v.clone()).map_err(|_| {
            JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "Invalid request id")
        })?),
        None => None,
    };

    Ok((id, method.to_string(), request.get("params").cloned()))
}
