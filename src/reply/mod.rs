//! # Replies
//!
//! The [`replier::Replier`] normalizes the responses of every adapter. Adapters hand it
//! the inbound envelope plus either a payload (success) or an error, and get back an
//! optional reply envelope together with an acknowledgement for the transport.
//!
//! ## Payload Policy
//!
//! ```text
//!              │  Ok(...)     │  Error(...)
//! ─────────────┼──────────────┼──────────────
//!  always      │  payload     │  error payload
//!  errors      │  ack only    │  error payload
//!  never       │  ack only    │  ack only (logged)
//! ```
//!
//! Errors are always logged, whatever the policy.
//!
//! ## Building a Reply
//!
//! ```text
//! type ◀── ResponseHeaderValue (suffix ".response" by default)
//! source ◀── ResponseHeaderValue (target name by default)
//! category ◀── "success" | "error"
//! options ◀── replier options, then call options
//! id ◀── random UUID unless an option set one
//! content type ◀── ResponseHeaderValue (application/json by default)
//! data ◀── Payload | EventError
//! ```
//!
//! Failures while resolving headers never reach the adapter: on the success path they
//! become an error reply with the `cloudevents-processing` code, on the error path they
//! are logged and the event is acknowledged without a payload.

pub mod header;
pub mod options;
pub mod replier;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{envelope::EnvelopeError, envelope::EventEnvelope, payload::PayloadError};

pub use header::ResponseHeaderValue;
pub use options::ResponseOption;
pub use replier::{Replier, ReplierBuilder};

// Error code categories
pub const ERROR_CODE_EVENT_CONTEXT: &str = "event-context";
pub const ERROR_CODE_REQUEST_PARSING: &str = "request-parsing";
pub const ERROR_CODE_REQUEST_VALIDATION: &str = "request-validation";
pub const ERROR_CODE_ADAPTER_PROCESS: &str = "adapter-process";
pub const ERROR_CODE_PARSE_RESPONSE: &str = "response-parsing";
pub const ERROR_CODE_CLOUDEVENTS_PROCESSING: &str = "cloudevents-processing";

// Extension names and values
pub const EXTENSION_CATEGORY: &str = "category";
pub const EXTENSION_CATEGORY_VALUE_SUCCESS: &str = "success";
pub const EXTENSION_CATEGORY_VALUE_ERROR: &str = "error";

/// When replies carry a payload.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum PayloadPolicy {
    /// Payloads on success and on error.
    #[default]
    Always,
    /// Payloads on error only.
    #[strum(to_string = "errors", serialize = "error")]
    #[serde(alias = "error")]
    Errors,
    /// No payloads at all.
    Never,
}

/// Payload of an error reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventError {
    /// Identifiable moniker that classifies the error.
    pub code: String,
    pub description: String,
    /// Arbitrary data about the error.
    pub details: Option<serde_json::Value>,
}

/// Acknowledgement handed back to the transport along with the optional reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acknowledgement {
    /// The inbound event was handled.
    Ack,
    /// The inbound event should be retried or dead-lettered by the platform.
    Nack(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub event: Option<EventEnvelope>,
    pub result: Acknowledgement,
}

impl Reply {
    pub fn ack() -> Self {
        Self {
            event: None,
            result: Acknowledgement::Ack,
        }
    }

    pub fn nack(message: impl Into<String>) -> Self {
        Self {
            event: None,
            result: Acknowledgement::Nack(message.into()),
        }
    }

    pub fn with_event(event: EventEnvelope) -> Self {
        Self {
            event: Some(event),
            result: Acknowledgement::Ack,
        }
    }

    pub fn is_ack(&self) -> bool {
        self.result == Acknowledgement::Ack
    }

    pub fn into_event(self) -> Option<EventEnvelope> {
        self.event
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplyError {
    #[error("No response type mapped for event type {event_type}")]
    UnmappedEventType { event_type: String },

    #[error("Invalid header value for {header}: {reason}")]
    InvalidHeaderValue { header: String, reason: String },

    #[error("Invalid replier option: {0}")]
    InvalidOption(String),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
}

pub type ReplyResult<T> = Result<T, ReplyError>;
