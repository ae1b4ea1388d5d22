use std::{path::PathBuf, time::Duration};

use ceflow::config::{self, SynchronizerConfig};
use ceflow_http::{self, server::ServerConfig};
use clap::Parser;

/// Synchronous request/response gateway over an event broker
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// JSON synchronizer configuration, overridden by the options below
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Destination of forwarded requests
    #[arg(long, env = "K_SINK")]
    sink: Option<String>,

    /// Extension attribute carrying the correlation id
    #[arg(long, env = "CORRELATION_KEY")]
    correlation_key: Option<String>,

    /// Length of generated correlation ids
    #[arg(long, env = "CORRELATION_KEY_LENGTH")]
    correlation_key_length: Option<usize>,

    /// Response wait timeout in milliseconds
    #[arg(long, env = "RESPONSE_WAIT_TIMEOUT")]
    response_wait_timeout: Option<u64>,

    /// Workflow bridge identifier set on forwarded requests and returned responses
    #[arg(long, env = "EVENTS_BRIDGE_IDENTIFIER")]
    bridge_identifier: Option<String>,

    /// Maximum number of pending requests, 0 for unbounded
    #[arg(long, env = "MAX_PENDING_SESSIONS")]
    max_pending_sessions: Option<usize>,
}

impl Cli {
    fn synchronizer_config(&self) -> anyhow::Result<SynchronizerConfig> {
        let mut config = match &self.config {
            Some(path) => config::from_file(path)?,
            None => SynchronizerConfig::default(),
        };
        if let Some(sink) = &self.sink {
            config.sink = sink.clone();
        }
        if let Some(key) = &self.correlation_key {
            config.correlation_key = key.clone();
        }
        if let Some(length) = self.correlation_key_length {
            config.correlation_key_length = length;
        }
        if let Some(millis) = self.response_wait_timeout {
            config.response_wait_timeout = Duration::from_millis(millis);
        }
        if let Some(bridge) = &self.bridge_identifier {
            config.bridge_identifier = bridge.clone();
        }
        if let Some(max) = self.max_pending_sessions {
            config.max_pending_sessions = max;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ServerConfig {
        synchronizer: cli.synchronizer_config()?,
        host: cli.host,
        port: cli.port,
    };

    ceflow_http::start_with_config(config).await
}
