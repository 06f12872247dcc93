//! MCP protocol types and JSON-RPC messages

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// MCP protocol version spoken by the bridge
pub const PROTOCOL_VERSION: &str = crate::MCP_PROTOCOL_VERSION;
