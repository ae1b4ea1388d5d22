//! # Events
//!
//! Every component of ceflow exchanges [`envelope::EventEnvelope`]s: CloudEvents v1.0
//! messages with an id, type, source, optional subject and content type, an opaque data
//! payload and a map of scalar extension attributes.
//!
//! ## Event Flow
//!
//! ```text
//! ┌─────────┐   inbound    ┌─────────┐   Payload    ┌─────────┐
//! │Transport│─────────────▶│ Adapter │─────────────▶│ Replier │
//! └─────────┘              └─────────┘              └────┬────┘
//!      ▲                                                 │
//!      │              reply envelope / ack               │
//!      └─────────────────────────────────────────────────┘
//! ```
//!
//! Adapters hand their results to the replier as a [`payload::Payload`], which is
//! encoded according to the content type chosen for the reply.

pub mod envelope;
pub mod payload;
