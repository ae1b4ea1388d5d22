//! # Event Envelope
//!
//! The EventEnvelope is the self-describing message that flows through every adapter.
//! It follows the CloudEvents v1.0 context attributes: a handful of required core
//! attributes, a few optional ones, an opaque data payload and a map of scalar
//! extension attributes.
//!
//! ## Extension Attributes
//!
//! Extensions are the only place where adapters may attach their own metadata. Names
//! are restricted to lowercase ASCII letters and digits so that they survive every
//! transport binding unchanged (HTTP headers, AMQP properties, ...).
//!
//! ```rust
//! use ceflow::event::envelope::{EventEnvelope, ExtensionValue};
//!
//! let mut event = EventEnvelope::builder()
//!     .id("abc-123")
//!     .event_type("io.example.order.created")
//!     .source("orders")
//!     .build()
//!     .unwrap();
//!
//! event.set_extension("tenant", "acme").unwrap();
//! assert_eq!(event.extension("tenant"), Some(&ExtensionValue::from("acme")));
//! ```

use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only CloudEvents specification version produced and accepted.
pub const SPEC_VERSION: &str = "1.0";

/// Context attribute names that belong to the envelope core and can never be used
/// as extension names by adapters.
pub const RESERVED_ATTRIBUTES: &[&str] = &[
    "id",
    "type",
    "time",
    "subject",
    "schemaurl",
    "dataschema",
    "specversion",
    "datamediatype",
    "datacontenttype",
    "datacontentencoding",
];

/// Returns true when `name` is one of the envelope core attributes.
pub fn is_reserved_attribute(name: &str) -> bool {
    RESERVED_ATTRIBUTES.contains(&name)
}

/// Checks the CloudEvents naming rule for extension attributes.
pub fn validate_extension_name(name: &str) -> EnvelopeResult<()> {
    if name.is_empty() {
        return Err(EnvelopeError::InvalidAttribute {
            name: name.to_string(),
            reason: "extension name must not be empty".to_string(),
        });
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    {
        return Err(EnvelopeError::InvalidAttribute {
            name: name.to_string(),
            reason: "extension name must contain only lowercase letters and digits".to_string(),
        });
    }
    Ok(())
}

/// Scalar value carried by an extension attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    String(String),
    Integer(i64),
    Boolean(bool),
}

impl ExtensionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtensionValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ExtensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionValue::String(s) => write!(f, "{}", s),
            ExtensionValue::Integer(i) => write!(f, "{}", i),
            ExtensionValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ExtensionValue {
    fn from(value: &str) -> Self {
        ExtensionValue::String(value.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(value: String) -> Self {
        ExtensionValue::String(value)
    }
}

impl From<i64> for ExtensionValue {
    fn from(value: i64) -> Self {
        ExtensionValue::Integer(value)
    }
}

impl From<bool> for ExtensionValue {
    fn from(value: bool) -> Self {
        ExtensionValue::Boolean(value)
    }
}

/// # EventEnvelope
///
/// A CloudEvents v1.0 event.
///
/// ## Structure
///
/// * `id`, `event_type`, `source`: required core attributes
/// * `subject`, `time`, `data_schema`, `data_content_type`: optional core attributes
/// * `data`: opaque payload, interpreted according to `data_content_type`
/// * `extensions`: scalar extension attributes, insertion order is irrelevant
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub id: String,
    pub event_type: String,
    pub source: String,
    pub spec_version: String,
    pub subject: Option<String>,
    pub time: Option<DateTime<Utc>>,
    pub data_schema: Option<String>,
    pub data_content_type: Option<String>,
    pub data: Option<Vec<u8>>,
    pub extensions: HashMap<String, ExtensionValue>,
}

impl Default for EventEnvelope {
    fn default() -> Self {
        Self {
            id: String::new(),
            event_type: String::new(),
            source: String::new(),
            spec_version: SPEC_VERSION.to_string(),
            subject: None,
            time: None,
            data_schema: None,
            data_content_type: None,
            data: None,
            extensions: HashMap::new(),
        }
    }
}

impl EventEnvelope {
    /// Creates an empty envelope. Every core attribute needs to be filled before the
    /// envelope is valid; see [`EventEnvelope::validate`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::new()
    }

    pub fn extension(&self, name: &str) -> Option<&ExtensionValue> {
        self.extensions.get(name)
    }

    /// Sets an extension attribute, replacing any previous value.
    pub fn set_extension(
        &mut self,
        name: &str,
        value: impl Into<ExtensionValue>,
    ) -> EnvelopeResult<()> {
        validate_extension_name(name)?;
        if is_reserved_attribute(name) {
            return Err(EnvelopeError::InvalidAttribute {
                name: name.to_string(),
                reason: "name is reserved for a core attribute".to_string(),
            });
        }
        self.extensions.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn remove_extension(&mut self, name: &str) -> Option<ExtensionValue> {
        self.extensions.remove(name)
    }

    pub fn set_data(&mut self, content_type: &str, data: Vec<u8>) {
        self.data_content_type = Some(content_type.to_string());
        self.data = Some(data);
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Verifies the required core attributes.
    pub fn validate(&self) -> EnvelopeResult<()> {
        if self.spec_version != SPEC_VERSION {
            return Err(EnvelopeError::UnsupportedSpecVersion(
                self.spec_version.clone(),
            ));
        }
        for (name, value) in [
            ("id", &self.id),
            ("type", &self.event_type),
            ("source", &self.source),
        ] {
            if value.is_empty() {
                return Err(EnvelopeError::MissingAttribute(name.to_string()));
            }
        }
        Ok(())
    }

    /// Compact JSON rendering of the identifying headers, used in log records.
    pub fn summary(&self) -> String {
        let summary = EventSummary {
            id: &self.id,
            event_type: &self.event_type,
            source: &self.source,
            subject: self.subject.as_deref(),
        };
        serde_json::to_string(&summary).unwrap_or_else(|_| {
            format!(
                r#"{{"id":{:?},"type":{:?},"source":{:?}}}"#,
                self.id, self.event_type, self.source
            )
        })
    }
}

impl fmt::Display for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}

#[derive(Serialize)]
struct EventSummary<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    source: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
}

#[derive(Default, Clone)]
pub struct EnvelopeBuilder {
    id: Option<String>,
    event_type: Option<String>,
    source: Option<String>,
    subject: Option<String>,
    time: Option<DateTime<Utc>>,
    data_content_type: Option<String>,
    data: Option<Vec<u8>>,
    extensions: Vec<(String, ExtensionValue)>,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn event_type(mut self, event_type: &str) -> Self {
        self.event_type = Some(event_type.to_string());
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn data(mut self, content_type: &str, data: impl Into<Vec<u8>>) -> Self {
        self.data_content_type = Some(content_type.to_string());
        self.data = Some(data.into());
        self
    }

    pub fn extension(mut self, name: &str, value: impl Into<ExtensionValue>) -> Self {
        self.extensions.push((name.to_string(), value.into()));
        self
    }

    /// Builds the envelope. A random UUID is assigned when no id was given.
    pub fn build(self) -> EnvelopeResult<EventEnvelope> {
        let mut event = EventEnvelope {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            event_type: self
                .event_type
                .ok_or(EnvelopeError::MissingAttribute("type".to_string()))?,
            source: self
                .source
                .ok_or(EnvelopeError::MissingAttribute("source".to_string()))?,
            subject: self.subject,
            time: self.time,
            data_content_type: self.data_content_type,
            data: self.data,
            ..Default::default()
        };
        for (name, value) in self.extensions {
            event.set_extension(&name, value)?;
        }
        event.validate()?;
        Ok(event)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvelopeError {
    #[error("Missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("Invalid attribute {name}: {reason}")]
    InvalidAttribute { name: String, reason: String },

    #[error("Unsupported spec version: {0}")]
    UnsupportedSpecVersion(String),
}

pub type EnvelopeResult<T> = Result<T, EnvelopeError>;
