//! Bridge server
//!
//! Hosts the OAuth endpoints and the MCP tool protocol on a single port.

mod router;
mod tools;

pub use router::{AppState, create_router};
pub use tools::{NO_FILES_MESSAGE, ToolRegistry};

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use crate::auth::{AuthFlowController, CredentialStore};
use crate::config::{ClientSecrets, Config};
use crate::drive::DriveClient;
use crate::{Error, Result};

/// Drive MCP bridge server
pub struct Server {
    /// Configuration
    config: Config,
}

impl Server {
    /// Create a new server
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the server until a shutdown signal arrives
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let secrets = ClientSecrets::load(Path::new(&self.config.google.credentials_file))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let store = Arc::new(CredentialStore::new());

        let flow = AuthFlowController::new(
            http.clone(),
            secrets,
            self.config.server.redirect_uri(),
            self.config.google.scopes.clone(),
            self.config.google.userinfo_endpoint.clone(),
            Arc::clone(&store),
        );

        let drive = Arc::new(DriveClient::new(
            http,
            self.config.google.drive_api_base.clone(),
            Arc::clone(&store),
        ));

        let state = Arc::new(AppState {
            flow,
            tools: ToolRegistry::new(drive, Arc::clone(&store)),
        });

        let app = create_router(state);

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("DRIVE MCP BRIDGE v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(host = %self.config.server.host, port = %self.config.server.port, "Listening");
        info!("OAuth endpoints:");
        info!("  GET  {}/authorize?client_id=...", self.config.server.base_url());
        info!("  GET  {}/oauth2callback", self.config.server.base_url());
        info!("Tool protocol:");
        info!("  POST {}/mcp  (X-Client-ID header)", self.config.server.base_url());
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Server shutdown complete");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
