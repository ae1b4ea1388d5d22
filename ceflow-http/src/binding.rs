//! CloudEvents HTTP protocol binding
//!
//! Binary mode carries the context attributes in `ce-*` headers and the data as the
//! request body, with `content-type` standing for `datacontenttype`. Structured mode
//! (`application/cloudevents+json`) carries the whole event as a JSON document and is
//! accepted on input only.

use axum::http::{HeaderMap, HeaderName, HeaderValue, header::CONTENT_TYPE};
use ceflow::{
    EventEnvelope, ExtensionValue,
    event::{envelope::EnvelopeError, payload::is_json_content_type},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";

const HEADER_PREFIX: &str = "ce-";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindingError {
    #[error("Missing attribute: {0}")]
    MissingAttribute(&'static str),

    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("Invalid structured event: {0}")]
    Structured(String),

    #[error("Invalid event: {0}")]
    Envelope(#[from] EnvelopeError),
}

pub type BindingResult<T> = Result<T, BindingError>;

/// Reads an event from an HTTP message in either binary or structured mode.
pub fn from_http(headers: &HeaderMap, body: &[u8]) -> BindingResult<EventEnvelope> {
    let content_type = header_str(headers, CONTENT_TYPE.as_str())?;
    let event = match content_type {
        Some(ct) if ct.to_ascii_lowercase().starts_with(STRUCTURED_CONTENT_TYPE) => {
            from_structured(body)?
        }
        _ => from_binary(headers, body)?,
    };
    event.validate()?;
    Ok(event)
}

fn from_binary(headers: &HeaderMap, body: &[u8]) -> BindingResult<EventEnvelope> {
    let mut event = EventEnvelope::new();

    for (name, value) in headers {
        let Some(attribute) = name.as_str().strip_prefix(HEADER_PREFIX) else {
            continue;
        };
        let value = value.to_str().map_err(|e| BindingError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        match attribute {
            "id" => event.id = value.to_string(),
            "type" => event.event_type = value.to_string(),
            "source" => event.source = value.to_string(),
            "specversion" => event.spec_version = value.to_string(),
            "subject" => event.subject = Some(value.to_string()),
            "dataschema" => event.data_schema = Some(value.to_string()),
            "time" => event.time = Some(parse_time(name.as_str(), value)?),
            _ => event.set_extension(attribute, value)?,
        }
    }

    if event.id.is_empty() {
        return Err(BindingError::MissingAttribute("ce-id"));
    }

    event.data_content_type = header_str(headers, CONTENT_TYPE.as_str())?.map(str::to_string);
    if !body.is_empty() {
        event.data = Some(body.to_vec());
    }
    Ok(event)
}

fn from_structured(body: &[u8]) -> BindingResult<EventEnvelope> {
    let document: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| BindingError::Structured(e.to_string()))?;

    let mut event = EventEnvelope::new();
    let mut data = None;
    for (name, value) in document {
        match name.as_str() {
            "id" => event.id = string_attribute(&name, value)?,
            "type" => event.event_type = string_attribute(&name, value)?,
            "source" => event.source = string_attribute(&name, value)?,
            "specversion" => event.spec_version = string_attribute(&name, value)?,
            "subject" => event.subject = Some(string_attribute(&name, value)?),
            "dataschema" => event.data_schema = Some(string_attribute(&name, value)?),
            "datacontenttype" => event.data_content_type = Some(string_attribute(&name, value)?),
            "time" => event.time = Some(parse_time(&name, &string_attribute(&name, value)?)?),
            "data" => data = Some(value),
            "data_base64" => {
                return Err(BindingError::Structured(
                    "data_base64 is not supported".to_string(),
                ));
            }
            _ => {
                let value = match value {
                    Value::String(s) => ExtensionValue::String(s),
                    Value::Bool(b) => ExtensionValue::Boolean(b),
                    Value::Number(n) => n.as_i64().map(ExtensionValue::Integer).ok_or_else(|| {
                        BindingError::Structured(format!("extension {} is not an integer", name))
                    })?,
                    other => {
                        return Err(BindingError::Structured(format!(
                            "extension {} is not a scalar: {}",
                            name, other
                        )));
                    }
                };
                event.set_extension(&name, value)?;
            }
        }
    }

    if let Some(data) = data {
        let json = event
            .data_content_type
            .as_deref()
            .is_none_or(is_json_content_type);
        event.data = Some(match data {
            Value::String(s) if !json => s.into_bytes(),
            other => serde_json::to_vec(&other)
                .map_err(|e| BindingError::Structured(e.to_string()))?,
        });
        if event.data_content_type.is_none() {
            event.data_content_type = Some("application/json".to_string());
        }
    }
    Ok(event)
}

/// Renders an event as binary-mode headers and body.
pub fn to_binary(event: &EventEnvelope) -> BindingResult<(HeaderMap, Vec<u8>)> {
    let mut headers = HeaderMap::new();
    insert_header(&mut headers, "ce-specversion", &event.spec_version)?;
    insert_header(&mut headers, "ce-id", &event.id)?;
    insert_header(&mut headers, "ce-type", &event.event_type)?;
    insert_header(&mut headers, "ce-source", &event.source)?;
    if let Some(subject) = &event.subject {
        insert_header(&mut headers, "ce-subject", subject)?;
    }
    if let Some(time) = &event.time {
        insert_header(&mut headers, "ce-time", &time.to_rfc3339())?;
    }
    if let Some(schema) = &event.data_schema {
        insert_header(&mut headers, "ce-dataschema", schema)?;
    }
    for (name, value) in &event.extensions {
        insert_header(
            &mut headers,
            &format!("{}{}", HEADER_PREFIX, name),
            &value.to_string(),
        )?;
    }
    if let Some(content_type) = &event.data_content_type {
        insert_header(&mut headers, CONTENT_TYPE.as_str(), content_type)?;
    }

    Ok((headers, event.data.clone().unwrap_or_default()))
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> BindingResult<()> {
    let invalid = |reason: String| BindingError::InvalidHeader {
        name: name.to_string(),
        reason,
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(e.to_string()))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;
    headers.insert(header_name, header_value);
    Ok(())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> BindingResult<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value.to_str().map_err(|e| BindingError::InvalidHeader {
                name: name.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn string_attribute(name: &str, value: Value) -> BindingResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(BindingError::Structured(format!(
            "attribute {} must be a string, got {}",
            name, other
        ))),
    }
}

fn parse_time(name: &str, value: &str) -> BindingResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| BindingError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })
}
