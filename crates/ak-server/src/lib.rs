//! # ak-server
//!
//! Axum server exposing the flow executor.
//!
//! This crate provides:
//! - the flow executor endpoints (`/api/v3/flows/executor/{slug}/`)
//! - flow and stage definition endpoints (`/api/v3/flows/instances/`,
//!   `/api/v3/stages/validate/`)
//! - health check endpoints
//!
//! ## Usage
//!
//! ```ignore
//! use ak_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! let server = Server::new(config)?;
//! server.run().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod definition_handlers;
pub mod definitions;
pub mod error;
pub mod executor_handlers;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use executor_handlers::SESSION_HEADER;
pub use router::create_router;
pub use state::AppState;

use std::time::Duration;

use ak_stages::default_registry;
use axum::Router;
use tokio::net::TcpListener;

use crate::definitions::load_flows;

/// The flow executor server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// Loads the flow definitions named by the configuration and checks that
    /// every bound stage type has an implementation.
    ///
    /// ## Errors
    ///
    /// Returns an error if the definitions cannot be loaded or are rejected.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let flows = match &config.flows_file {
            Some(path) => load_flows(path)?,
            None => Vec::new(),
        };
        let count = flows.len();

        let state = AppState::in_memory(config.clone(), default_registry(), flows)?;
        tracing::info!(
            flows = count,
            stage_types = ?state.registry().types(),
            "Flow definitions loaded"
        );

        Ok(Self { config, state })
    }

    /// Runs the server.
    ///
    /// This starts the HTTP server and blocks until it receives a shutdown signal.
    ///
    /// ## Errors
    ///
    /// Returns an error if the address cannot be bound or serving fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.bind_addr()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on http://{}", addr);

        self.serve(listener).await
    }

    /// Serves on an already bound listener until a shutdown signal arrives.
    ///
    /// ## Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let purge = tokio::spawn(purge_expired_plans(
            self.state.clone(),
            Duration::from_secs(self.config.purge_interval_seconds),
        ));

        let app = create_router(self.state);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await;

        purge.abort();
        served?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Returns the server configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the shared application state.
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Creates a test router without starting the server.
    ///
    /// This is useful for integration testing.
    pub fn test_router(&self) -> Router {
        create_router(self.state.clone())
    }
}

/// Periodically drops plans whose sessions have expired.
async fn purge_expired_plans(state: AppState, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        match state.plans.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => tracing::debug!(purged, "Purged expired plans"),
            Err(e) => tracing::warn!(error = %e, "Failed to purge expired plans"),
        }
    }
}

/// Waits for a shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_without_flows_file_starts_empty() {
        let server = Server::new(ServerConfig::for_testing()).unwrap();
        assert_eq!(server.config().port, 0);
        assert_eq!(server.state().registry().len(), 4);
    }

    #[test]
    fn missing_flows_file_is_rejected() {
        let config = ServerConfig {
            flows_file: Some("/nonexistent/flows.json".into()),
            ..ServerConfig::for_testing()
        };
        assert!(Server::new(config).is_err());
    }
}
