//! Error types for the Drive MCP bridge

use std::io;

use thiserror::Error;

/// Result type alias for the bridge
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge errors
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed caller input (e.g. missing client identifier). Never retried.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown or already-consumed authorization flow token
    #[error("Invalid authorization state: {0}")]
    InvalidState(String),

    /// External token or identity endpoint failure during authorization
    #[error("Upstream authorization failed: {0}")]
    UpstreamAuth(String),

    /// Token refresh failure; the client must re-run authorization
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// No credential record exists for the client identifier
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// The identity endpoint returned no stable principal identifier
    #[error("No stable identity returned by the identity provider")]
    MissingIdentity,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON-RPC error
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// Error code
        code: i32,
        /// Error message
        message: String,
        /// Optional data
        data: Option<serde_json::Value>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a JSON-RPC error
    pub fn json_rpc(code: i32, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Convert to JSON-RPC error code
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::JsonRpc { code, .. } => *code,
            Self::Json(_) => -32700,       // Parse error
            Self::Protocol(_) => -32600,   // Invalid request
            Self::InvalidRequest(_) => -32602,
            _ => -32603, // Internal error
        }
    }

    /// HTTP status for the OAuth endpoints.
    ///
    /// Caller mistakes (missing client id, bad state) map to 400;
    /// upstream and internal failures to 500.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) | Self::InvalidState(_) => 400,
            _ => 500,
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_taxonomy_maps_to_http_statuses() {
        assert_eq!(Error::InvalidRequest("no client_id".into()).http_status(), 400);
        assert_eq!(Error::InvalidState("consumed".into()).http_status(), 400);
        assert_eq!(Error::UpstreamAuth("token endpoint 500".into()).http_status(), 500);
        assert_eq!(Error::MissingIdentity.http_status(), 500);
    }

    #[test]
    fn rpc_code_mapping() {
        assert_eq!(Error::Protocol("bad".into()).to_rpc_code(), -32600);
        assert_eq!(Error::InvalidRequest("bad".into()).to_rpc_code(), -32602);
        assert_eq!(Error::Internal("boom".into()).to_rpc_code(), -32603);
    }
}
