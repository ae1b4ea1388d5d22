//! # Replier
//!
//! Builds the reply envelopes of an adapter.
//!
//! ```rust
//! use ceflow::event::{envelope::EventEnvelope, payload::Payload};
//! use ceflow::reply::{PayloadPolicy, Replier};
//!
//! let replier = Replier::builder("my-target")
//!     .payload_policy(PayloadPolicy::Always)
//!     .processed_headers()
//!     .build()
//!     .unwrap();
//!
//! let inbound = EventEnvelope::builder()
//!     .event_type("io.example.order")
//!     .source("orders")
//!     .build()
//!     .unwrap();
//!
//! let reply = replier.ok(&inbound, Payload::from(b"done".to_vec()), &[]);
//! let out = reply.event.unwrap();
//! assert_eq!(out.event_type, "io.example.order.response");
//! assert_eq!(out.source, "my-target");
//! ```

use std::{collections::HashMap, fmt};

use serde_json::json;
use tracing::{debug, error};

use crate::{
    config::ReplierConfig,
    event::{
        envelope::EventEnvelope,
        payload::{is_valid_content_type, Payload, APPLICATION_JSON},
    },
};

use super::{
    header::ResponseHeaderValue, options::ResponseOption, EventError, PayloadPolicy, Reply,
    ReplyError, ReplyResult, ERROR_CODE_CLOUDEVENTS_PROCESSING, EXTENSION_CATEGORY,
    EXTENSION_CATEGORY_VALUE_ERROR, EXTENSION_CATEGORY_VALUE_SUCCESS,
};

/// Suffix appended to the inbound type when no response type is configured.
pub const DEFAULT_RESPONSE_TYPE_SUFFIX: &str = ".response";

/// Normalizes the replies of an adapter.
///
/// Both public operations are infallible from the caller's perspective: whatever goes
/// wrong while building the reply is logged and turned into an error reply or a plain
/// acknowledgement.
#[derive(Debug, Clone)]
pub struct Replier {
    response_type: ResponseHeaderValue,
    response_source: ResponseHeaderValue,
    response_content_type: ResponseHeaderValue,

    // Fall back to the success headers when unset.
    response_error_type: Option<ResponseHeaderValue>,
    response_error_content_type: Option<ResponseHeaderValue>,

    response_options: Vec<ResponseOption>,
    payload_policy: PayloadPolicy,
}

impl Replier {
    pub fn builder(target_name: &str) -> ReplierBuilder {
        ReplierBuilder::new(target_name)
    }

    /// Creates a replier with default headers and the options enabled in `config`.
    pub fn from_config(target_name: &str, config: &ReplierConfig) -> ReplyResult<Self> {
        let mut builder = Self::builder(target_name).payload_policy(config.payload_policy);
        if let Some(response_type) = &config.response_type {
            builder = builder.static_response_type(response_type);
        }
        if let Some(content_type) = &config.response_content_type {
            builder = builder.static_data_content_type(content_type);
        }
        if !config.bridge_identifier.is_empty() {
            builder = builder.stateful_headers(&config.bridge_identifier);
        }
        if config.processed_headers {
            builder = builder.processed_headers();
        }
        builder.build()
    }

    pub fn payload_policy(&self) -> PayloadPolicy {
        self.payload_policy
    }

    /// Acknowledges the inbound event without replying.
    pub fn ack(&self) -> Reply {
        Reply::ack()
    }

    /// Replies to a successfully processed event.
    ///
    /// Returns a plain acknowledgement unless the payload policy is `Always`.
    pub fn ok(
        &self,
        inbound: &EventEnvelope,
        payload: impl Into<Payload>,
        options: &[ResponseOption],
    ) -> Reply {
        if self.payload_policy != PayloadPolicy::Always {
            return self.ack();
        }
        let payload = payload.into();

        let mut out = EventEnvelope::new();

        match self.response_type.resolve(inbound) {
            Ok(event_type) => out.event_type = event_type,
            Err(e) => {
                return self.processing_error(inbound, "error choosing response type", e, None)
            }
        }

        match self.response_source.resolve(inbound) {
            Ok(source) => out.source = source,
            Err(e) => {
                return self.processing_error(inbound, "error choosing response source", e, None)
            }
        }

        if let Err(e) = out.set_extension(EXTENSION_CATEGORY, EXTENSION_CATEGORY_VALUE_SUCCESS) {
            return self.processing_error(
                inbound,
                "error setting category header at response event",
                e.into(),
                Some(json!({ "payload": payload.to_json() })),
            );
        }

        self.apply_options(inbound, &mut out, options);
        if let Err(e) = out.validate() {
            return self.processing_error(
                inbound,
                "error building response event",
                e.into(),
                Some(json!({ "payload": payload.to_json() })),
            );
        }

        let content_type = match out.data_content_type.take() {
            Some(content_type) => content_type,
            None => match self.response_content_type.resolve(inbound) {
                Ok(content_type) => content_type,
                Err(e) => {
                    return self.processing_error(
                        inbound,
                        "error choosing response content-type",
                        e,
                        None,
                    )
                }
            },
        };

        match payload.encode(&content_type) {
            Ok(data) => {
                out.data_content_type = Some(content_type);
                out.data = data;
            }
            Err(e) => {
                return self.processing_error(
                    inbound,
                    "error setting response payload at response event",
                    e.into(),
                    Some(json!({ "payload": payload.to_json() })),
                )
            }
        }

        debug!("Replying to {} with {}", inbound.summary(), out.summary());
        Reply::with_event(out)
    }

    /// Replies with an error payload.
    ///
    /// The failure is always logged. Returns a plain acknowledgement when the payload
    /// policy is `Never`.
    pub fn error(
        &self,
        inbound: &EventEnvelope,
        code: &str,
        cause: impl fmt::Display,
        details: Option<serde_json::Value>,
        options: &[ResponseOption],
    ) -> Reply {
        error!(
            error = %cause,
            in_event = %inbound.summary(),
            details = ?details,
            "Processing error"
        );
        if self.payload_policy == PayloadPolicy::Never {
            return self.ack();
        }

        let mut out = EventEnvelope::new();

        let type_header = self
            .response_error_type
            .as_ref()
            .unwrap_or(&self.response_type);
        match type_header.resolve(inbound) {
            Ok(event_type) => out.event_type = event_type,
            Err(e) => {
                error!(error = %e, "Error choosing error response type");
                return self.ack();
            }
        }

        match self.response_source.resolve(inbound) {
            Ok(source) => out.source = source,
            Err(e) => {
                error!(error = %e, "Error choosing error response source");
                return self.ack();
            }
        }

        if let Err(e) = out.set_extension(EXTENSION_CATEGORY, EXTENSION_CATEGORY_VALUE_ERROR) {
            error!(error = %e, "Could not set event category extension at error response");
            return self.ack();
        }

        self.apply_options(inbound, &mut out, options);
        if let Err(e) = out.validate() {
            error!(error = %e, "Invalid error response event");
            return self.ack();
        }

        let content_type = match out.data_content_type.take() {
            Some(content_type) => content_type,
            None => {
                let content_type_header = self
                    .response_error_content_type
                    .as_ref()
                    .unwrap_or(&self.response_content_type);
                match content_type_header.resolve(inbound) {
                    Ok(content_type) => content_type,
                    Err(e) => {
                        error!(error = %e, "Error choosing error response content-type");
                        return self.ack();
                    }
                }
            }
        };

        let event_error = EventError {
            code: code.to_string(),
            description: cause.to_string(),
            details,
        };

        out.data_content_type = Some(content_type.clone());
        match Payload::json(&event_error).and_then(|p| p.encode(&content_type)) {
            Ok(data) => out.data = data,
            Err(e) => error!(error = %e, "Could not set error payload at response event"),
        }

        Reply::with_event(out)
    }

    /// Logs the failure and leaves retries and dead-lettering to the platform.
    pub fn error_retriable(&self, inbound: &EventEnvelope, cause: impl fmt::Display) -> Reply {
        let summary = inbound.summary();
        error!(error = %cause, event = %summary, "Retriable error");
        Reply::nack(format!("retriable error at event {}: {}", summary, cause))
    }

    fn processing_error(
        &self,
        inbound: &EventEnvelope,
        context: &str,
        cause: ReplyError,
        details: Option<serde_json::Value>,
    ) -> Reply {
        self.error(
            inbound,
            ERROR_CODE_CLOUDEVENTS_PROCESSING,
            format!("{}: {}", context, cause),
            details,
            &[],
        )
    }

    /// Replier options run first, then the options of the call. Failing options are
    /// logged and skipped.
    fn apply_options(
        &self,
        inbound: &EventEnvelope,
        out: &mut EventEnvelope,
        options: &[ResponseOption],
    ) {
        for option in self.response_options.iter().chain(options) {
            if let Err(e) = option.apply(inbound, out) {
                error!(error = %e, option = ?option, "Error applying response option at reply");
            }
        }
        if out.id.is_empty() {
            out.id = uuid::Uuid::new_v4().to_string();
        }
    }
}

/// Typed construction of a [`Replier`].
#[derive(Debug, Clone)]
pub struct ReplierBuilder {
    target_name: String,
    payload_policy: PayloadPolicy,
    response_type: Option<ResponseHeaderValue>,
    response_content_type: Option<ResponseHeaderValue>,
    response_error_type: Option<ResponseHeaderValue>,
    response_error_content_type: Option<ResponseHeaderValue>,
    response_options: Vec<ResponseOption>,
}

impl ReplierBuilder {
    pub fn new(target_name: &str) -> Self {
        Self {
            target_name: target_name.to_string(),
            payload_policy: PayloadPolicy::default(),
            response_type: None,
            response_content_type: None,
            response_error_type: None,
            response_error_content_type: None,
            response_options: Vec::new(),
        }
    }

    pub fn payload_policy(mut self, policy: PayloadPolicy) -> Self {
        self.payload_policy = policy;
        self
    }

    pub fn response_type(mut self, header: ResponseHeaderValue) -> Self {
        self.response_type = Some(header);
        self
    }

    pub fn static_response_type(self, event_type: &str) -> Self {
        self.response_type(ResponseHeaderValue::fixed(event_type))
    }

    pub fn mapped_response_type(self, table: HashMap<String, String>) -> Self {
        self.response_type(ResponseHeaderValue::mapped(table))
    }

    pub fn error_response_type(mut self, header: ResponseHeaderValue) -> Self {
        self.response_error_type = Some(header);
        self
    }

    pub fn static_error_response_type(self, event_type: &str) -> Self {
        self.error_response_type(ResponseHeaderValue::fixed(event_type))
    }

    pub fn mapped_error_response_type(self, table: HashMap<String, String>) -> Self {
        self.error_response_type(ResponseHeaderValue::mapped(table))
    }

    pub fn static_data_content_type(mut self, content_type: &str) -> Self {
        self.response_content_type = Some(ResponseHeaderValue::fixed(content_type));
        self
    }

    pub fn static_error_data_content_type(mut self, content_type: &str) -> Self {
        self.response_error_content_type = Some(ResponseHeaderValue::fixed(content_type));
        self
    }

    /// Propagates or creates the workflow headers on every reply.
    pub fn stateful_headers(self, bridge: &str) -> Self {
        self.response_option(ResponseOption::with_stateful_headers(bridge))
    }

    /// Adds the `processed*` headers to every reply.
    pub fn processed_headers(self) -> Self {
        self.response_option(ResponseOption::with_processed_headers())
    }

    pub fn response_option(mut self, option: ResponseOption) -> Self {
        self.response_options.push(option);
        self
    }

    pub fn build(self) -> ReplyResult<Replier> {
        if self.target_name.is_empty() {
            return Err(ReplyError::InvalidOption(
                "target name must not be empty".to_string(),
            ));
        }

        for header in [&self.response_type, &self.response_error_type]
            .into_iter()
            .flatten()
        {
            validate_type_header(header)?;
        }
        for header in [
            &self.response_content_type,
            &self.response_error_content_type,
        ]
        .into_iter()
        .flatten()
        {
            validate_content_type_header(header)?;
        }
        for option in &self.response_options {
            if let ResponseOption::StatefulHeaders { bridge } = option {
                if bridge.is_empty() {
                    return Err(ReplyError::InvalidOption(
                        "bridge identifier must not be empty".to_string(),
                    ));
                }
            }
        }

        Ok(Replier {
            response_type: self
                .response_type
                .unwrap_or_else(|| ResponseHeaderValue::suffix(DEFAULT_RESPONSE_TYPE_SUFFIX)),
            response_source: ResponseHeaderValue::fixed(self.target_name),
            response_content_type: self
                .response_content_type
                .unwrap_or_else(|| ResponseHeaderValue::fixed(APPLICATION_JSON)),
            response_error_type: self.response_error_type,
            response_error_content_type: self.response_error_content_type,
            response_options: self.response_options,
            payload_policy: self.payload_policy,
        })
    }
}

fn validate_type_header(header: &ResponseHeaderValue) -> ReplyResult<()> {
    match header {
        ResponseHeaderValue::Static(value) if value.is_empty() => Err(ReplyError::InvalidOption(
            "static response type must not be empty".to_string(),
        )),
        ResponseHeaderValue::Mapped(table) if table.is_empty() => Err(ReplyError::InvalidOption(
            "mapped response types must not be empty".to_string(),
        )),
        ResponseHeaderValue::Mapped(table) if table.values().any(String::is_empty) => Err(
            ReplyError::InvalidOption("mapped response type must not be empty".to_string()),
        ),
        _ => Ok(()),
    }
}

fn validate_content_type_header(header: &ResponseHeaderValue) -> ReplyResult<()> {
    match header {
        ResponseHeaderValue::Static(value) if !is_valid_content_type(value) => Err(
            ReplyError::InvalidOption(format!("{:?} is not a valid content type", value)),
        ),
        _ => Ok(()),
    }
}
