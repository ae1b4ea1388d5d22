use std::time::Duration;

use async_trait::async_trait;
use ceflow::{
    EventEnvelope,
    correlation::{DeliveryError, EventSender},
};
use tracing::{debug, instrument};

use crate::binding;

/// Delivers events as binary-mode HTTP POST requests.
#[derive(Debug, Clone)]
pub struct HttpSender {
    client: reqwest::Client,
}

impl HttpSender {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventSender for HttpSender {
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    async fn send(&self, destination: &str, event: EventEnvelope) -> Result<(), DeliveryError> {
        let (headers, body) =
            binding::to_binary(&event).map_err(|e| DeliveryError::InvalidEvent(e.to_string()))?;

        let response = self
            .client
            .post(destination)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, "Event delivered to {}", destination);
            return Ok(());
        }

        let reason = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }
}
