use async_trait::async_trait;
use thiserror::Error;

use crate::event::envelope::EventEnvelope;

/// Outbound side of the transport: delivers forwarded requests to a destination.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSender: Send + Sync {
    async fn send(&self, destination: &str, event: EventEnvelope) -> Result<(), DeliveryError>;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("Destination rejected the event with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}
