//! Drive API client with credential resolution

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::{CredentialRecord, CredentialStore, TokenResponse};
use crate::{Error, Result};

/// Ready-to-use credential handle for one API call
#[derive(Debug, Clone)]
pub struct AccessCredential {
    /// Bearer token for the resource API
    pub access_token: String,
}

/// A file entry from a Drive search
#[derive(Debug, Clone, Deserialize)]
pub struct DriveFile {
    /// File identifier
    #[serde(default)]
    pub id: String,
    /// File name
    pub name: String,
    /// MIME type
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    /// Browser link, when the API returns one
    #[serde(rename = "webViewLink")]
    pub web_view_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Drive API client backed by the credential store
pub struct DriveClient {
    /// HTTP client for API and refresh requests
    http: Client,
    /// Drive API base URL
    api_base: String,
    /// Shared credential store
    store: Arc<CredentialStore>,
}

impl DriveClient {
    /// Create a new Drive client
    #[must_use]
    pub fn new(http: Client, api_base: String, store: Arc<CredentialStore>) -> Self {
        Self {
            http,
            api_base,
            store,
        }
    }

    /// Obtain a valid credential for a client identifier, refreshing the
    /// access token first when it has expired.
    ///
    /// No record at all fails with `NotAuthenticated` before any network
    /// activity. An expired record without a refresh token is terminal:
    /// the client must re-run authorization. Refresh for one identifier is
    /// serialized by the record lock, so concurrent resolutions observing
    /// the same expiry perform a single network refresh and the waiters
    /// reuse the freshly written token.
    pub async fn resolve_credential(&self, client_id: &str) -> Result<AccessCredential> {
        let entry = self.store.entry(client_id).ok_or_else(|| {
            Error::NotAuthenticated(format!("No credentials found for client_id: {client_id}"))
        })?;

        let mut record = entry.lock().await;

        if record.is_expired() {
            let Some(refresh_token) = record.refresh_token.clone() else {
                return Err(Error::RefreshFailed(
                    "access token expired and no refresh token was granted; \
                     please re-run authorization"
                        .to_string(),
                ));
            };

            debug!(client = %client_id, "Refreshing token");
            let response = self.refresh(&record, &refresh_token).await?;
            record.apply_refresh(response);
            info!(client = %client_id, "Access token refreshed");
        }

        Ok(AccessCredential {
            access_token: record.access_token.clone(),
        })
    }

    /// Refresh an access token against the record's token endpoint
    async fn refresh(
        &self,
        record: &CredentialRecord,
        refresh_token: &str,
    ) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &record.client_id),
            ("client_secret", &record.client_secret),
        ];

        let response = self
            .http
            .post(&record.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::RefreshFailed(format!("Token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RefreshFailed(format!(
                "Token refresh failed: HTTP {status} - {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::RefreshFailed(format!("Failed to parse refresh response: {e}")))
    }

    /// Search Drive files with a query in the Drive API query syntax.
    ///
    /// The query string is forwarded verbatim.
    pub async fn search_files(&self, client_id: &str, query: &str) -> Result<Vec<DriveFile>> {
        let credential = self.resolve_credential(client_id).await?;

        let url = format!("{}/files", self.api_base.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .query(&[
                ("q", query),
                ("pageSize", "10"),
                ("fields", "nextPageToken, files(id, name, mimeType, webViewLink)"),
            ])
            .bearer_auth(&credential.access_token)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Drive request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "Drive API returned HTTP {status}: {body}"
            )));
        }

        let list: FileListResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse file list: {e}")))?;

        debug!(client = %client_id, results = list.files.len(), "Drive search complete");
        Ok(list.files)
    }
}
