//! ceflow HTTP transport
//!
//! This crate exposes the ceflow [`Synchronizer`](ceflow::correlation::Synchronizer)
//! over HTTP using the CloudEvents HTTP binding, and forwards requests to the sink
//! with [`sender::HttpSender`].

pub mod binding;
pub mod error;
pub mod handlers;
pub mod sender;
pub mod server;

use server::{ServerConfig, start_server};
use tracing_subscriber::EnvFilter;

/// Start the server with the default configuration
pub async fn start() -> anyhow::Result<()> {
    start_with_config(ServerConfig::default()).await
}

/// Start the server with a custom configuration
pub async fn start_with_config(config: ServerConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    start_server(config).await
}
