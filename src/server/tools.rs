//! Built-in tool handlers
//!
//! The tool set is fixed and advertised identically to every session. Each
//! invocation receives the caller's client identifier resolved once from the
//! transport header; handlers never accept it as a caller-supplied argument.
//! Handler failures become descriptive text results, never protocol faults.

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::auth::CredentialStore;
use crate::drive::{DriveClient, DriveFile};
use crate::protocol::{Tool, ToolsCallResult};

/// Exact response for an empty search result set
pub const NO_FILES_MESSAGE: &str = "No files found matching your query.";

/// Fixed registry of the bridge's tools
pub struct ToolRegistry {
    drive: Arc<DriveClient>,
    store: Arc<CredentialStore>,
}

impl ToolRegistry {
    /// Create the registry
    #[must_use]
    pub fn new(drive: Arc<DriveClient>, store: Arc<CredentialStore>) -> Self {
        Self { drive, store }
    }

    /// Tool definitions advertised over `tools/list`
    #[must_use]
    pub fn definitions(&self) -> Vec<Tool> {
        vec![
            Tool {
                name: "search_drive_files".to_string(),
                description: Some(
                    "Search for files in Google Drive using a query string that follows \
                     the Google Drive API query syntax. Examples: all PDF files -> \
                     \"mimeType='application/pdf'\"; documents with 'report' in the name \
                     -> \"name contains 'report'\"; files modified after a date -> \
                     \"modifiedTime > '2025-01-01'\"."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "query": {
                            "type": "string",
                            "description": "Search query in Drive API query syntax"
                        }
                    },
                    "required": ["query"]
                }),
            },
            Tool {
                name: "check_authentication_status".to_string(),
                description: Some(
                    "Check if the calling client is authenticated with Google Drive."
                        .to_string(),
                ),
                input_schema: json!({
                    "type": "object",
                    "properties": {}
                }),
            },
        ]
    }

    /// Dispatch a tool call. `client_id` is the identity resolved from the
    /// `X-Client-ID` header; `None` when the header was absent.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: &Value,
        client_id: Option<&str>,
    ) -> ToolsCallResult {
        debug!(tool = %name, client = client_id.unwrap_or("-"), "Tool invocation");

        match name {
            "search_drive_files" => self.search_drive_files(arguments, client_id).await,
            "check_authentication_status" => self.check_authentication_status(client_id),
            _ => {
                warn!(tool = %name, "Unknown tool requested");
                ToolsCallResult::error_text(format!("Unknown tool: {name}"))
            }
        }
    }

    async fn search_drive_files(
        &self,
        arguments: &Value,
        client_id: Option<&str>,
    ) -> ToolsCallResult {
        let Some(client_id) = client_id else {
            return ToolsCallResult::text("No client_id provided for authentication.");
        };

        let Some(query) = arguments.get("query").and_then(Value::as_str) else {
            return ToolsCallResult::text(
                "Error searching files: missing required argument `query`",
            );
        };

        match self.drive.search_files(client_id, query).await {
            Ok(files) if files.is_empty() => ToolsCallResult::text(NO_FILES_MESSAGE),
            Ok(files) => ToolsCallResult::text(format_file_list(&files)),
            // Failures travel back as content so the model can react to them
            Err(e) => ToolsCallResult::text(format!("Error searching files: {e}")),
        }
    }

    fn check_authentication_status(&self, client_id: Option<&str>) -> ToolsCallResult {
        let Some(client_id) = client_id else {
            return ToolsCallResult::text(
                "No X-Client-ID header provided for authentication check.",
            );
        };

        debug!(client = %client_id, "Checking auth status");

        // Presence alone; expiry is the adapter's concern
        if self.store.contains(client_id) {
            ToolsCallResult::text("authenticated")
        } else {
            ToolsCallResult::text("not authenticated")
        }
    }
}

/// Render a search result set for the model
fn format_file_list(files: &[DriveFile]) -> String {
    let mut lines = vec!["Files found:".to_string()];
    for file in files {
        let mut entry = format!("- {} ({})", file.name, file.mime_type);
        if let Some(ref link) = file.web_view_link {
            entry.push_str(&format!("\n  Link: {link}"));
        }
        lines.push(entry);
    }
    lines.join("\n")
}
