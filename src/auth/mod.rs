//! Per-client OAuth 2.0 credential custody
//!
//! Implements the authorization-code flow for Google Drive access, keyed by
//! an opaque client identifier rather than a browser session:
//! - In-memory credential store with per-client locking
//! - One-time authorization state tracking (CSRF protection)
//! - Code exchange, identity lookup, and refresh-token rotation

mod flow;
mod store;

pub use flow::AuthFlowController;
pub use store::{CredentialRecord, CredentialStore, FlowTracker, TokenResponse};
