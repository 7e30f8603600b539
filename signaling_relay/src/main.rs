//! Binary entry point for the signaling relay

use clap::Parser;
use signaling_relay::{Args, SignalingServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), signaling_relay::SignalingError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    let server = SignalingServer::bind(config).await?;

    server
        .serve_with_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for ctrl+c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down");
        })
        .await
}
