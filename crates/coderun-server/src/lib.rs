//! coderun HTTP server.
//!
//! Exposes the execution engine and the persistent file store over JSON.
//!
//! # Architecture
//!
//! The server consists of:
//! - **Protocol**: request and response bodies
//! - **Routes**: axum handlers for `/health`, `/api/run`, `/api/files`, `/api/languages`
//! - **Error**: mapping of store failures to HTTP status codes

pub mod error;
pub mod protocol;
pub mod routes;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use coderun_core::{Engine, FileStore};

pub use error::{ServerError, ServerResult};
pub use protocol::{RunRequest, RunResponse};
pub use routes::{AppState, create_router};

/// Default request body limit.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Origins allowed by CORS; empty allows any origin.
    pub allowed_origins: Vec<String>,
    /// Directory of a built editor client, served for non-API paths.
    pub static_dir: Option<PathBuf>,
    /// Maximum request body size in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            allowed_origins: Vec::new(),
            static_dir: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerConfig {
    /// Parse `host:port` into a socket address.
    pub fn addr(&self) -> ServerResult<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|_| ServerError::InvalidAddress(addr))
    }
}

/// Start the coderun server.
pub async fn serve<S: FileStore>(engine: Engine<S>, config: ServerConfig) -> ServerResult<()> {
    let addr = config.addr()?;

    let state = Arc::new(AppState::new(engine));
    let app = create_router(state, &config);

    tracing::info!("Starting coderun server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Create shutdown signal channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    // Handle Ctrl+C for graceful shutdown
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            let _ = shutdown_tx.send(());
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}
