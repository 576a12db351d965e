//! HTTP endpoint.
//!
//! Serves `GET /create-container`, which opens a fresh engine connection and
//! creates and starts a container from the configured image and command.

mod api;
mod handlers;

pub use api::{AppState, create_router};

use crate::env;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io;
use tokio::net::TcpListener;
use tracing::info;

/// HTTP endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub listen_address: String,
    pub listen_port: u16,
    /// Image each request creates a container from
    pub image: String,
    /// Command each created container runs
    pub command: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: env::server::DEFAULT_LISTEN_ADDRESS.to_string(),
            listen_port: env::server::DEFAULT_LISTEN_PORT,
            image: env::server::DEFAULT_IMAGE.to_string(),
            command: env::server::DEFAULT_COMMAND
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.listen_port)
    }
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn serve(settings: &ServerSettings, state: AppState) -> io::Result<()> {
    let listener = TcpListener::bind(settings.bind_address()).await?;
    run(listener, state, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("Server started on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
