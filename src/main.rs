//! Drive MCP Bridge - Google Drive tools for language-model agents
//!
//! `serve` hosts the OAuth endpoints and the MCP tool protocol;
//! `chat` runs the interactive Gemini agent against a bridge server.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use drive_mcp_bridge::{
    agent::{GeminiModel, McpSession, Orchestrator, run_chat},
    cli::{Cli, Command},
    config::Config,
    server::Server,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so config env overrides see it
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match &cli.command {
        Some(Command::Chat {
            server_url,
            client_id,
        }) => run_chat_client(&cli, server_url.clone(), client_id.clone()).await,
        Some(Command::Serve) | None => run_server(&cli).await,
    }
}

/// Load config with CLI overrides applied
fn load_config(cli: &Cli) -> Option<Config> {
    match Config::load(cli.config.as_deref()) {
        Ok(mut config) => {
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            if let Some(ref host) = cli.host {
                config.server.host = host.clone();
            }
            Some(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            None
        }
    }
}

/// Run the bridge server
async fn run_server(cli: &Cli) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting Drive MCP bridge"
    );

    if let Err(e) = Server::new(config).run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Run the interactive chat client
async fn run_chat_client(
    cli: &Cli,
    server_url: Option<String>,
    client_id: Option<String>,
) -> ExitCode {
    let Some(config) = load_config(cli) else {
        return ExitCode::FAILURE;
    };

    let server_url = server_url.unwrap_or_else(|| config.agent.server_url.clone());
    println!("Connecting to Drive MCP bridge at: {server_url}");

    let session = match McpSession::new(&server_url, client_id) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Failed to create session: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = session.initialize().await {
        error!("Failed to connect to {server_url}: {e}");
        return ExitCode::FAILURE;
    }

    // Show what the bridge offers, the way the server advertises it
    match session.list_tools().await {
        Ok(tools) => {
            for tool in &tools {
                println!("Tool: {}", tool.name);
                println!("Description: {}", tool.description.as_deref().unwrap_or(""));
            }
        }
        Err(e) => {
            error!("Failed to list tools: {e}");
            session.close().await;
            return ExitCode::FAILURE;
        }
    }

    let model = match GeminiModel::new(config.model.clone()) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to create model client: {e}");
            session.close().await;
            return ExitCode::FAILURE;
        }
    };

    let orchestrator = Orchestrator::new(model, Arc::clone(&session), config.agent.max_tool_rounds);

    if let Err(e) = run_chat(Arc::clone(&session), orchestrator).await {
        error!("Chat error: {e}");
        session.close().await;
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
