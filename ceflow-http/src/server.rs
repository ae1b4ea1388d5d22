use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use ceflow::{config::SynchronizerConfig, correlation::Synchronizer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{handlers, sender::HttpSender};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    pub synchronizer: SynchronizerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            synchronizer: SynchronizerConfig::default(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub synchronizer: Arc<Synchronizer>,
}

impl AppState {
    pub fn new(synchronizer: Arc<Synchronizer>) -> Self {
        Self { synchronizer }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::receive_event))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    if config.synchronizer.sink.is_empty() {
        anyhow::bail!("a sink is required to forward requests");
    }

    let sender = HttpSender::new(config.synchronizer.response_wait_timeout)?;
    let synchronizer = Arc::new(Synchronizer::new(
        &config.synchronizer,
        Arc::new(sender),
    )?);
    info!(
        sink = %config.synchronizer.sink,
        correlation_key = %config.synchronizer.correlation_key,
        "Initialized synchronizer"
    );

    let app = create_router(AppState::new(synchronizer.clone()));

    let addr = format!("{}:{}", config.host, config.port).parse::<SocketAddr>()?;
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(synchronizer))
        .await?;

    Ok(())
}

async fn shutdown_signal(synchronizer: Arc<Synchronizer>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for the shutdown signal");
        return;
    }
    synchronizer.shutdown();
}
