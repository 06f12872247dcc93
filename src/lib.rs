//! Drive MCP Bridge Library
//!
//! Bridges a language-model tool-calling agent to Google Drive through an
//! MCP-style JSON-RPC server with per-client OAuth credential custody.
//!
//! # Features
//!
//! - **Per-client OAuth**: authorization-code flow keyed by an opaque
//!   `X-Client-ID`, with in-memory credential custody and silent refresh
//! - **Tool bridge**: `search_drive_files` and `check_authentication_status`
//!   exposed over `tools/list` / `tools/call`
//! - **Agent loop**: Gemini function-calling orchestration until the model
//!   produces a final text answer
//! - **Chat front end**: line-oriented client with `login`/`tools` commands

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod auth;
pub mod cli;
pub mod config;
pub mod drive;
pub mod error;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// MCP Protocol version supported by this bridge
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
