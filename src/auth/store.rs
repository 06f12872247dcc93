//! Credential store and authorization state tracker
//!
//! Both are process-wide, in-memory, and non-durable: credentials do not
//! survive a restart and are never shared between instances.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use dashmap::DashMap;
use rand::RngExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ClientSecrets;

/// OAuth token endpoint response (code exchange and refresh share the shape)
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Refresh token (absent on most refresh responses)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Granted scopes, space-separated
    #[serde(default)]
    pub scope: Option<String>,
}

/// Stored OAuth credential material for one client identifier
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    /// Access token
    pub access_token: String,
    /// Refresh token; without one an expired record is terminal
    pub refresh_token: Option<String>,
    /// Token endpoint used for refresh
    pub token_uri: String,
    /// OAuth app client identifier
    pub client_id: String,
    /// OAuth app client secret
    pub client_secret: String,
    /// Granted scope set
    pub scopes: Vec<String>,
    /// Expiry (Unix seconds); `None` means the token does not expire
    pub expires_at: Option<u64>,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl CredentialRecord {
    /// Build a record from a token exchange response plus the app material
    #[must_use]
    pub fn from_response(response: TokenResponse, app: &ClientSecrets, scopes: &[String]) -> Self {
        let granted = response
            .scope
            .as_deref()
            .map_or_else(|| scopes.to_vec(), |s| {
                s.split_whitespace().map(String::from).collect()
            });

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_uri: app.token_uri.clone(),
            client_id: app.client_id.clone(),
            client_secret: app.client_secret.clone(),
            scopes: granted,
            expires_at: response.expires_in.map(|secs| unix_now() + secs),
        }
    }

    /// Check if the access token is expired (with 60 second buffer)
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            // Consider expired 60 seconds before actual expiry
            Some(expires_at) => unix_now() + 60 >= expires_at,
            None => false,
        }
    }

    /// Apply a refresh response in place. The refresh token is preserved
    /// when the endpoint does not issue a new one.
    pub fn apply_refresh(&mut self, response: TokenResponse) {
        self.access_token = response.access_token;
        self.expires_at = response.expires_in.map(|secs| unix_now() + secs);
        if response.refresh_token.is_some() {
            self.refresh_token = response.refresh_token;
        }
    }
}

/// Process-wide map from client identifier to credential material.
///
/// Each record sits behind its own async mutex so that refresh for one
/// client serializes without stalling unrelated clients.
#[derive(Default)]
pub struct CredentialStore {
    entries: DashMap<String, Arc<Mutex<CredentialRecord>>>,
}

impl CredentialStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for a client identifier
    pub fn insert(&self, client_id: &str, record: CredentialRecord) {
        debug!(client = %client_id, "Stored credentials");
        self.entries
            .insert(client_id.to_string(), Arc::new(Mutex::new(record)));
    }

    /// Whether a record exists. Presence alone; no validity or expiry check.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        self.entries.contains_key(client_id)
    }

    /// The lockable record for a client identifier, if any
    #[must_use]
    pub fn entry(&self, client_id: &str) -> Option<Arc<Mutex<CredentialRecord>>> {
        self.entries.get(client_id).map(|e| Arc::clone(e.value()))
    }
}

/// Short-lived map from authorization flow token to the client identifier
/// that initiated it. Tokens are consumed exactly once; a token that is
/// never-issued and one that is already-consumed are indistinguishable.
///
/// Abandoned flows are never expired; they are reclaimed only by process
/// exit. Known leak boundary.
#[derive(Default)]
pub struct FlowTracker {
    pending: DashMap<String, String>,
}

impl FlowTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh flow token for a client identifier and record the mapping
    pub fn issue(&self, client_id: &str) -> String {
        let state = generate_state();
        self.pending.insert(state.clone(), client_id.to_string());
        debug!(client = %client_id, "Issued authorization state");
        state
    }

    /// Consume a flow token, returning the client identifier it was issued
    /// for. Removal is atomic; a second consumption returns `None`.
    #[must_use]
    pub fn consume(&self, state: &str) -> Option<String> {
        self.pending.remove(state).map(|(_, client_id)| client_id)
    }

    /// Number of flows still awaiting their callback
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Generate a random state parameter
fn generate_state() -> String {
    let state_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(state_bytes)
}
