//! HTTP server wiring
//!
//! Binds the relay's inbound surface: producer ingest, the polling API,
//! MJPEG and SSE egress, the clear operation, and the audio gateway. The
//! server owns one [`RelayState`] per instance; everything else borrows it
//! through `Arc`.

pub mod config;
pub mod gateway;
pub mod mjpeg;
pub mod routes;
pub mod sse;

pub use config::ServerConfig;
pub use gateway::{AnswerSynthesizer, SynthesizedAnswer};
pub use routes::{router, AppState};

use std::sync::Arc;

use axum::Router;

use crate::error::Result;
use crate::relay::{RelayConfig, RelayState};

/// The relay HTTP server
pub struct RelayServer {
    config: ServerConfig,
    state: Arc<RelayState>,
}

impl RelayServer {
    /// Create a server with the given configuration and a default relay
    pub fn new(config: ServerConfig) -> Self {
        Self::with_relay_config(config, RelayConfig::default())
    }

    /// Create a server with custom relay configuration
    pub fn with_relay_config(config: ServerConfig, relay_config: RelayConfig) -> Self {
        Self {
            config,
            state: Arc::new(RelayState::with_config(relay_config)),
        }
    }

    /// Shared session state, for wiring pull ingest or inspection
    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Build the router backed by this server's state
    pub fn router(&self) -> Router {
        routes::router(AppState::new(Arc::clone(&self.state), self.config.clone()))
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay server listening");

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "relay server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("shutdown signal received");
        Ok(())
    }
}
