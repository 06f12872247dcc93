//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Google Drive MCP bridge - OAuth credential custody plus a Gemini agent
#[derive(Parser, Debug)]
#[command(name = "drive-mcp-bridge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "DRIVE_BRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "DRIVE_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "DRIVE_BRIDGE_HOST")]
    pub host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "DRIVE_BRIDGE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "DRIVE_BRIDGE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the bridge server (default)
    Serve,

    /// Run the interactive chat client against a bridge server
    Chat {
        /// Bridge server URL (overrides `agent.server_url` from config)
        #[arg(long, env = "DRIVE_BRIDGE_SERVER_URL")]
        server_url: Option<String>,

        /// Client identifier (generated when omitted)
        #[arg(long)]
        client_id: Option<String>,
    },
}
