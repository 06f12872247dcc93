//! End-to-end authentication flow tests
//!
//! Runs the flow controller and the credential adapter against a local
//! stand-in for the Google token and identity endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{Json, Router, extract::State, routing::get, routing::post};
use serde_json::json;
use tokio::net::TcpListener;

use drive_mcp_bridge::Error;
use drive_mcp_bridge::auth::{AuthFlowController, CredentialRecord, CredentialStore};
use drive_mcp_bridge::config::ClientSecrets;
use drive_mcp_bridge::drive::DriveClient;

/// Serve a router on an ephemeral port and return its base URL
async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// A provider stand-in: token exchange plus userinfo
async fn spawn_provider() -> String {
    let app = Router::new()
        .route(
            "/token",
            post(|| async {
                Json(json!({
                    "access_token": "exchanged-token",
                    "refresh_token": "refresh-1",
                    "expires_in": 3600,
                    "scope": "openid email"
                }))
            }),
        )
        .route(
            "/userinfo",
            get(|| async { Json(json!({"email": "tester@example.com"})) }),
        );
    spawn(app).await
}

fn secrets(token_uri: &str) -> ClientSecrets {
    serde_json::from_value(json!({
        "client_id": "app-id",
        "client_secret": "app-secret",
        "auth_uri": "https://accounts.google.com/o/oauth2/auth",
        "token_uri": token_uri,
    }))
    .unwrap()
}

fn controller(provider_base: &str, store: Arc<CredentialStore>) -> AuthFlowController {
    AuthFlowController::new(
        reqwest::Client::new(),
        secrets(&format!("{provider_base}/token")),
        "http://127.0.0.1:8081/oauth2callback".to_string(),
        vec!["openid".to_string()],
        format!("{provider_base}/userinfo"),
        store,
    )
}

fn state_param(url: &url::Url) -> String {
    url.query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("authorization URL carries a state parameter")
}

#[tokio::test]
async fn full_flow_stores_credentials_and_reports_the_principal() {
    let provider = spawn_provider().await;
    let store = Arc::new(CredentialStore::new());
    let flow = controller(&provider, Arc::clone(&store));

    let auth_url = flow.begin_authorization("client-a").unwrap();
    let state = state_param(&auth_url);

    let email = flow.complete_authorization("auth-code", &state).await.unwrap();
    assert_eq!(email, "tester@example.com");

    assert!(store.contains("client-a"));
    // Authenticating one client never authenticates another
    assert!(!store.contains("client-b"));
}

#[tokio::test]
async fn consumed_state_is_rejected_on_replay() {
    let provider = spawn_provider().await;
    let store = Arc::new(CredentialStore::new());
    let flow = controller(&provider, Arc::clone(&store));

    let auth_url = flow.begin_authorization("client-a").unwrap();
    let state = state_param(&auth_url);

    flow.complete_authorization("auth-code", &state).await.unwrap();

    let err = flow
        .complete_authorization("auth-code", &state)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
}

#[tokio::test]
async fn failing_token_endpoint_surfaces_as_upstream_error() {
    let app = Router::new().route(
        "/token",
        post(|| async {
            (
                axum::http::StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_grant"})),
            )
        }),
    );
    let provider = spawn(app).await;

    let store = Arc::new(CredentialStore::new());
    let flow = controller(&provider, Arc::clone(&store));

    let auth_url = flow.begin_authorization("client-a").unwrap();
    let state = state_param(&auth_url);

    let err = flow
        .complete_authorization("bad-code", &state)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UpstreamAuth(_)));
    assert!(!store.contains("client-a"));
}

#[tokio::test]
async fn identity_without_email_is_rejected() {
    let app = Router::new()
        .route(
            "/token",
            post(|| async {
                Json(json!({"access_token": "exchanged-token", "expires_in": 3600}))
            }),
        )
        .route("/userinfo", get(|| async { Json(json!({"sub": "123"})) }));
    let provider = spawn(app).await;

    let store = Arc::new(CredentialStore::new());
    let flow = controller(&provider, Arc::clone(&store));

    let auth_url = flow.begin_authorization("client-a").unwrap();
    let state = state_param(&auth_url);

    let err = flow
        .complete_authorization("auth-code", &state)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingIdentity));
}

/// Counting refresh endpoint: every POST rotates the access token only
async fn spawn_counting_refresh(counter: Arc<AtomicUsize>) -> String {
    let app = Router::new()
        .route(
            "/token",
            post(|State(c): State<Arc<AtomicUsize>>| async move {
                c.fetch_add(1, Ordering::SeqCst);
                Json(json!({"access_token": "refreshed-token", "expires_in": 3600}))
            }),
        )
        .with_state(counter);
    spawn(app).await
}

fn expired_record(token_uri: String) -> CredentialRecord {
    CredentialRecord {
        access_token: "stale-token".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        token_uri,
        client_id: "app-id".to_string(),
        client_secret: "app-secret".to_string(),
        scopes: vec!["openid".to_string()],
        expires_at: Some(0),
    }
}

#[tokio::test]
async fn expired_record_refreshes_and_keeps_its_refresh_token() {
    let counter = Arc::new(AtomicUsize::new(0));
    let provider = spawn_counting_refresh(Arc::clone(&counter)).await;

    let store = Arc::new(CredentialStore::new());
    store.insert("client-a", expired_record(format!("{provider}/token")));

    let drive = DriveClient::new(
        reqwest::Client::new(),
        "https://www.googleapis.com/drive/v3".to_string(),
        Arc::clone(&store),
    );

    let credential = drive.resolve_credential("client-a").await.unwrap();
    assert_eq!(credential.access_token, "refreshed-token");
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    // Write-back preserved the refresh token the endpoint did not rotate
    let entry = store.entry("client-a").unwrap();
    let record = entry.lock().await;
    assert_eq!(record.refresh_token.as_deref(), Some("refresh-1"));
    assert!(!record.is_expired());
}

#[tokio::test]
async fn concurrent_resolutions_perform_a_single_refresh() {
    let counter = Arc::new(AtomicUsize::new(0));
    let provider = spawn_counting_refresh(Arc::clone(&counter)).await;

    let store = Arc::new(CredentialStore::new());
    store.insert("client-a", expired_record(format!("{provider}/token")));

    let drive = Arc::new(DriveClient::new(
        reqwest::Client::new(),
        "https://www.googleapis.com/drive/v3".to_string(),
        Arc::clone(&store),
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let drive = Arc::clone(&drive);
        handles.push(tokio::spawn(async move {
            drive.resolve_credential("client-a").await.unwrap()
        }));
    }

    for handle in handles {
        let credential = handle.await.unwrap();
        assert_eq!(credential.access_token, "refreshed-token");
    }

    // One expiry event, one network refresh; the losers reuse the write-back
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_refresh_is_not_retried() {
    let counter = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/token",
            post(|State(c): State<Arc<AtomicUsize>>| async move {
                c.fetch_add(1, Ordering::SeqCst);
                (
                    axum::http::StatusCode::BAD_REQUEST,
                    Json(json!({"error": "invalid_grant"})),
                )
            }),
        )
        .with_state(Arc::clone(&counter));
    let provider = spawn(app).await;

    let store = Arc::new(CredentialStore::new());
    store.insert("client-a", expired_record(format!("{provider}/token")));

    let drive = DriveClient::new(
        reqwest::Client::new(),
        "https://www.googleapis.com/drive/v3".to_string(),
        Arc::clone(&store),
    );

    let err = drive.resolve_credential("client-a").await.unwrap_err();
    assert!(matches!(err, Error::RefreshFailed(_)));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
