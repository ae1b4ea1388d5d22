//! # ceflow: Event Reply Normalization and Request/Response Correlation
//!
//! ceflow is the core shared by event-driven adapters that receive CloudEvents
//! envelopes, act on them and reply.
//!
//! ## Components
//!
//! ### 1. Envelopes
//! CloudEvents v1.0 messages and the payloads adapters hand back ([`event`]).
//!
//! ### 2. Replies
//! A [`reply::Replier`] builds consistent success and error replies under a
//! configurable payload policy. Building a reply never fails from the adapter's point
//! of view; problems are logged and turned into error replies or acknowledgements.
//!
//! ### 3. Correlation
//! A [`correlation::Synchronizer`] turns a one-way publish/receive channel into a
//! synchronous call by matching requests and responses through a correlation id
//! carried as an extension attribute.
//!
//! ```text
//! adapter ──▶ Replier ──▶ (reply envelope | ack)
//!
//! client ──▶ Synchronizer ──▶ EventSender ──▶ sink
//!               ▲                               │
//!               └──────── correlated response ◀─┘
//! ```
//!
//! Transports plug in through [`correlation::EventSender`]; the HTTP binding lives in the
//! `ceflow-http` crate.
//!
//! ### 4. Configuration
//! Typed settings deserialized from JSON ([`config`]).

pub mod config;
pub mod correlation;
pub mod error;
pub mod event;
pub mod reply;

// Re-exports
pub use error::*;
pub use event::envelope::{EventEnvelope, ExtensionValue};
pub use event::payload::Payload;
