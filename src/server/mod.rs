//! playtrace HTTP server
//!
//! Serves the telemetry API: participant registration, session lifecycle,
//! token-authorized event ingestion, gameplay submissions, leaderboard and
//! replay metadata.

mod error;
mod routes;

pub use error::ApiError;
pub use routes::{create_router, AppState};

use crate::storage::TelemetryStore;
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// playtrace server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
    /// Secret for signing ingest tokens
    pub ingest_secret: Vec<u8>,
    /// Lifetime of issued ingest tokens, in seconds
    pub ingest_ttl: u64,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("ingest_secret", &"[REDACTED]")
            .field("ingest_ttl", &self.ingest_ttl)
            .finish()
    }
}

/// The main playtrace server
pub struct PlaytraceServer {
    config: ServerConfig,
    store: Arc<dyn TelemetryStore>,
}

impl PlaytraceServer {
    pub fn new(config: ServerConfig, store: Arc<dyn TelemetryStore>) -> Self {
        Self { config, store }
    }

    /// Handler state built from this server's configuration
    pub fn state(&self) -> AppState {
        AppState {
            store: self.store.clone(),
            ingest_secret: Arc::from(self.config.ingest_secret.as_slice()),
            ingest_ttl: self.config.ingest_ttl,
        }
    }

    pub fn router(&self) -> Router {
        create_router(self.state())
    }

    /// Serve until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.config.bind_addr))?;
        info!(addr = %self.config.bind_addr, "playtrace server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("playtrace server stopped");
        Ok(())
    }
}
