//! Authorization flow controller
//!
//! Drives the three-step authorization-code dance: initiate with a one-time
//! state token, redirect the user to the consent screen, then verify the
//! callback, exchange the code, and store the credential under the client
//! identifier recovered from the state token.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::store::{CredentialRecord, CredentialStore, FlowTracker, TokenResponse};
use crate::config::ClientSecrets;
use crate::{Error, Result};

/// Controls the per-client authorization-code flow
pub struct AuthFlowController {
    /// HTTP client for token and identity requests
    http: Client,
    /// OAuth app material
    app: ClientSecrets,
    /// Redirect URI registered with the provider
    redirect_uri: String,
    /// Requested scopes
    scopes: Vec<String>,
    /// Identity endpoint for the principal lookup
    userinfo_endpoint: String,
    /// Credential store populated on successful callbacks
    store: Arc<CredentialStore>,
    /// In-flight authorization state
    tracker: FlowTracker,
}

/// Identity endpoint response; only the stable identifier matters here
#[derive(Debug, Deserialize)]
struct UserinfoResponse {
    email: Option<String>,
}

impl AuthFlowController {
    /// Create a new flow controller
    #[must_use]
    pub fn new(
        http: Client,
        app: ClientSecrets,
        redirect_uri: String,
        scopes: Vec<String>,
        userinfo_endpoint: String,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            http,
            app,
            redirect_uri,
            scopes,
            userinfo_endpoint,
            store,
            tracker: FlowTracker::new(),
        }
    }

    /// Start an authorization flow for a client identifier.
    ///
    /// Returns the provider authorization URL the user must visit, carrying
    /// a fresh one-time state token.
    pub fn begin_authorization(&self, client_id: &str) -> Result<Url> {
        if client_id.is_empty() {
            return Err(Error::InvalidRequest(
                "client_id query parameter is required for authorization".to_string(),
            ));
        }

        let state = self.tracker.issue(client_id);

        let mut auth_url = Url::parse(&self.app.auth_uri)
            .map_err(|e| Error::Config(format!("Invalid auth endpoint: {e}")))?;

        {
            let mut params = auth_url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &self.app.client_id);
            params.append_pair("redirect_uri", &self.redirect_uri);
            params.append_pair("scope", &self.scopes.join(" "));
            // Offline access so the provider issues a refresh token
            params.append_pair("access_type", "offline");
            params.append_pair("include_granted_scopes", "true");
            params.append_pair("prompt", "consent");
            params.append_pair("state", &state);
        }

        info!(client = %client_id, "Authorization flow started");
        Ok(auth_url)
    }

    /// Complete an authorization flow from the provider callback.
    ///
    /// Consumes the state token, exchanges the code, looks up the
    /// authenticated principal, and stores the credential record. Returns
    /// the principal identifier for user-facing confirmation.
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<String> {
        // Unknown and already-consumed states are rejected identically
        let client_id = self.tracker.consume(state).ok_or_else(|| {
            Error::InvalidState(
                "unknown or already-used state parameter; please restart authorization".to_string(),
            )
        })?;

        debug!(client = %client_id, "Authorization callback matched");

        let token = self.exchange_code(code).await?;
        let email = self.fetch_principal(&token.access_token).await?;

        let record = CredentialRecord::from_response(token, &self.app, &self.scopes);
        self.store.insert(&client_id, record);

        info!(client = %client_id, user = %email, "Authentication complete");
        Ok(email)
    }

    /// Exchange an authorization code for tokens
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
            ("client_id", &self.app.client_id),
            ("client_secret", &self.app.client_secret),
        ];

        let response = self
            .http
            .post(&self.app.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::UpstreamAuth(format!("Token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamAuth(format!(
                "Token exchange failed: HTTP {status} - {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::UpstreamAuth(format!("Failed to parse token response: {e}")))
    }

    /// Look up the authenticated principal's stable identifier
    async fn fetch_principal(&self, access_token: &str) -> Result<String> {
        let response = self
            .http
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::UpstreamAuth(format!("Identity request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::UpstreamAuth(format!(
                "Identity lookup failed: HTTP {status}"
            )));
        }

        let userinfo: UserinfoResponse = response
            .json()
            .await
            .map_err(|e| Error::UpstreamAuth(format!("Failed to parse identity response: {e}")))?;

        userinfo.email.ok_or(Error::MissingIdentity)
    }
}
