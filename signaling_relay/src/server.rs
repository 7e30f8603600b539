//! Listener setup and serving

use crate::config::ServerConfig;
use crate::error::SignalingError;
use crate::handler::{AppState, build_router};
use crate::state::ServerState;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// A bound, not yet serving, relay server
pub struct SignalingServer {
    listener: TcpListener,
    app: AppState,
}

impl SignalingServer {
    /// Bind the listener described by `config`.
    pub async fn bind(config: ServerConfig) -> Result<Self, SignalingError> {
        let listener = TcpListener::bind(config.addr()).await?;
        Ok(Self {
            listener,
            app: AppState {
                state: ServerState::new(),
                config: Arc::new(config),
            },
        })
    }

    /// Address actually bound; differs from the config when port 0 was asked for.
    pub fn local_addr(&self) -> Result<SocketAddr, SignalingError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the room state served by this server
    pub fn state(&self) -> ServerState {
        self.app.state.clone()
    }

    /// Serve until the process exits.
    pub async fn serve(self) -> Result<(), SignalingError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves, then stop accepting and drain.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<(), SignalingError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        info!(%addr, "signaling relay listening (health: /health)");

        axum::serve(self.listener, build_router(self.app))
            .with_graceful_shutdown(signal)
            .await?;
        Ok(())
    }
}
