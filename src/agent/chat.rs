//! Interactive chat surface
//!
//! Line-oriented front end over the orchestrator. Free text becomes a turn;
//! the reserved commands are `help`, `quit`/`exit`, `login`, and `tools`.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use super::orchestrator::Orchestrator;
use super::session::McpSession;
use crate::Result;

/// Run the interactive chat loop until `quit`/`exit` or end of input.
///
/// The session is closed on every exit path.
pub async fn run_chat(session: Arc<McpSession>, orchestrator: Orchestrator) -> Result<()> {
    println!("\nDrive MCP client started!");
    println!("Type your queries or 'help' to see available commands.");
    println!("Using client ID: {}", session.client_id());

    // Make sure credentials exist before the first query
    if let Err(e) = authenticate(&session).await {
        println!("Authentication check failed: {e}");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("\nQuery: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();

        match query.to_lowercase().as_str() {
            "" => continue,

            "help" => {
                println!("Available commands:");
                println!("  quit or exit: Exit the chat");
                println!("  login: Authenticate with the bridge server");
                println!("  tools: List available tools");
                continue;
            }

            "quit" | "exit" => break,

            "login" => {
                if let Err(e) = authenticate(&session).await {
                    println!("Authentication failed: {e}");
                }
                continue;
            }

            "tools" => {
                match session.list_tools().await {
                    Ok(tools) => {
                        for tool in &tools {
                            println!("- {}: {}", tool.name, tool.description.as_deref().unwrap_or(""));
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                }
                continue;
            }

            _ => {}
        }

        // Tools are re-fetched per query; the set is fixed but cheap to list
        match session.list_tools().await {
            Ok(tools) => {
                let answer = orchestrator.run_turn(query, &tools).await;
                println!("{answer}");
            }
            Err(e) => println!("Error: {e}"),
        }
    }

    session.close().await;
    Ok(())
}

/// Check authentication status; when not authenticated, print the consent
/// URL and poll until the bridge reports success.
async fn authenticate(session: &McpSession) -> Result<()> {
    let status = session
        .call_tool("check_authentication_status", json!({}))
        .await?;

    if status.joined_text() == "authenticated" {
        println!("Already authenticated with Google Drive.");
        return Ok(());
    }

    println!("Authentication needed with Google Drive.");
    println!("Please complete the Google authentication process.");
    println!(
        "Open the following URL in your browser to authenticate: {}",
        session.authorize_url()
    );

    loop {
        tokio::time::sleep(Duration::from_secs(5)).await;

        let status = session
            .call_tool("check_authentication_status", json!({}))
            .await?;

        if status.joined_text() == "authenticated" {
            println!("Authentication successful!");
            return Ok(());
        }

        debug!(client = %session.client_id(), "Still waiting for authorization callback");
        println!("Waiting for authentication to complete...");
    }
}
