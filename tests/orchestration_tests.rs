//! Orchestration loop tests
//!
//! Scripts the model's responses through a local `generateContent` stand-in
//! while tool calls run against the real bridge router, then checks what
//! `run_turn` hands back to the user.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use drive_mcp_bridge::agent::{GeminiModel, McpSession, Orchestrator};
use drive_mcp_bridge::auth::{AuthFlowController, CredentialStore};
use drive_mcp_bridge::config::{ClientSecrets, ModelConfig};
use drive_mcp_bridge::drive::DriveClient;
use drive_mcp_bridge::protocol::Tool;
use drive_mcp_bridge::server::{AppState, ToolRegistry, create_router};

type Script = Arc<Mutex<VecDeque<Value>>>;

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Model stand-in that replays scripted contents; once the script is
/// exhausted it keeps requesting the status tool (for cap tests).
async fn spawn_model(script: Script) -> String {
    async fn handler(State(script): State<Script>) -> Json<Value> {
        let content = script.lock().await.pop_front().unwrap_or_else(|| {
            json!({
                "role": "model",
                "parts": [{"functionCall": {"name": "check_authentication_status", "args": {}}}]
            })
        });
        Json(json!({"candidates": [{"content": content}]}))
    }

    let app = Router::new().fallback(handler).with_state(script);
    spawn(app).await
}

fn model_for(base_url: &str) -> GeminiModel {
    GeminiModel::new(ModelConfig {
        name: "gemini-test".to_string(),
        base_url: base_url.to_string(),
        api_key: Some("test-key".to_string()),
        ..ModelConfig::default()
    })
    .unwrap()
}

fn script(contents: Vec<Value>) -> Script {
    Arc::new(Mutex::new(contents.into()))
}

/// A bridge whose provider endpoints are never reached
async fn spawn_bridge() -> String {
    let store = Arc::new(CredentialStore::new());
    let http = reqwest::Client::new();

    let secrets: ClientSecrets = serde_json::from_value(json!({
        "client_id": "app-id",
        "client_secret": "app-secret",
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": "http://127.0.0.1:1/token",
    }))
    .unwrap();

    let flow = AuthFlowController::new(
        http.clone(),
        secrets,
        "http://127.0.0.1:8081/oauth2callback".to_string(),
        vec!["openid".to_string()],
        "http://127.0.0.1:1/userinfo".to_string(),
        Arc::clone(&store),
    );

    let drive = Arc::new(DriveClient::new(
        http,
        "http://127.0.0.1:1".to_string(),
        Arc::clone(&store),
    ));

    let state = Arc::new(AppState {
        flow,
        tools: ToolRegistry::new(drive, store),
    });

    spawn(create_router(state)).await
}

fn text_content(text: &str) -> Value {
    json!({"role": "model", "parts": [{"text": text}]})
}

fn status_call_content() -> Value {
    json!({
        "role": "model",
        "parts": [{"functionCall": {"name": "check_authentication_status", "args": {}}}]
    })
}

async fn connected_session(bridge: &str) -> (Arc<McpSession>, Vec<Tool>) {
    let session = Arc::new(McpSession::new(bridge, Some("client-a".to_string())).unwrap());
    session.initialize().await.unwrap();
    let tools = session.list_tools().await.unwrap();
    (session, tools)
}

#[tokio::test]
async fn text_only_response_is_returned_verbatim() {
    let bridge = spawn_bridge().await;
    let model = spawn_model(script(vec![text_content("The answer.")])).await;

    let (session, tools) = connected_session(&bridge).await;
    let orchestrator = Orchestrator::new(model_for(&model), session, None);

    assert_eq!(orchestrator.run_turn("hello", &tools).await, "The answer.");
}

#[tokio::test]
async fn call_only_turns_contribute_no_text() {
    let bridge = spawn_bridge().await;
    let model = spawn_model(script(vec![
        status_call_content(),
        text_content("You are not yet authenticated."),
    ]))
    .await;

    let (session, tools) = connected_session(&bridge).await;
    let orchestrator = Orchestrator::new(model_for(&model), session, None);

    // The intermediate tool-call turn adds nothing to the returned text
    assert_eq!(
        orchestrator.run_turn("am I logged in?", &tools).await,
        "You are not yet authenticated."
    );
}

#[tokio::test]
async fn text_emitted_alongside_calls_is_kept_in_turn_order() {
    let bridge = spawn_bridge().await;
    let model = spawn_model(script(vec![
        json!({
            "role": "model",
            "parts": [
                {"text": "Checking your files now."},
                {"functionCall": {"name": "check_authentication_status", "args": {}}}
            ]
        }),
        text_content("All done."),
    ]))
    .await;

    let (session, tools) = connected_session(&bridge).await;
    let orchestrator = Orchestrator::new(model_for(&model), session, None);

    assert_eq!(
        orchestrator.run_turn("list my files", &tools).await,
        "Checking your files now.\nAll done."
    );
}

#[tokio::test]
async fn tool_failure_terminates_with_a_user_facing_string() {
    // An MCP endpoint that faults every call
    let broken_mcp = spawn(Router::new().fallback(|| async {
        Json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32603, "message": "kaboom"}
        }))
    }))
    .await;

    let model = spawn_model(script(vec![json!({
        "role": "model",
        "parts": [{"functionCall": {"name": "search_drive_files", "args": {"query": "x"}}}]
    })]))
    .await;

    let session = Arc::new(McpSession::new(&broken_mcp, Some("client-a".to_string())).unwrap());
    let tools = vec![Tool {
        name: "search_drive_files".to_string(),
        description: None,
        input_schema: json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }),
    }];

    let orchestrator = Orchestrator::new(model_for(&model), session, None);
    let answer = orchestrator.run_turn("list my files", &tools).await;

    assert!(
        answer.starts_with("Error executing tool search_drive_files:"),
        "got: {answer}"
    );
    assert!(answer.contains("kaboom"));
}

#[tokio::test]
async fn round_cap_stops_a_model_that_always_requests_tools() {
    let bridge = spawn_bridge().await;
    // Empty script: the stand-in requests the status tool forever
    let model = spawn_model(script(vec![])).await;

    let (session, tools) = connected_session(&bridge).await;
    let orchestrator = Orchestrator::new(model_for(&model), session, Some(2));

    assert_eq!(
        orchestrator.run_turn("loop forever", &tools).await,
        "Stopped after 2 tool rounds without a final answer."
    );
}

#[tokio::test]
async fn model_failure_terminates_with_a_user_facing_string() {
    let bridge = spawn_bridge().await;
    let model = spawn(Router::new().fallback(|| async {
        (StatusCode::INTERNAL_SERVER_ERROR, "overloaded")
    }))
    .await;

    let (session, tools) = connected_session(&bridge).await;
    let orchestrator = Orchestrator::new(model_for(&model), session, None);

    let answer = orchestrator.run_turn("hello", &tools).await;
    assert!(answer.starts_with("Error querying the model:"), "got: {answer}");
}
