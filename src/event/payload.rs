use serde::Serialize;
use thiserror::Error;

/// Structured JSON, the default content type for replies.
pub const APPLICATION_JSON: &str = "application/json";
pub const TEXT_PLAIN: &str = "text/plain";

/// Data handed over by an adapter to become the payload of a reply.
///
/// Raw bytes are attached untouched. Structured values are encoded according to the
/// content type the reply ends up with.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

impl Payload {
    pub fn json<T: Serialize>(value: &T) -> PayloadResult<Self> {
        serde_json::to_value(value)
            .map(Payload::Json)
            .map_err(|e| PayloadError::Serialization(e.to_string()))
    }

    /// Encodes the payload for the given content type. `Empty` produces no data.
    pub fn encode(&self, content_type: &str) -> PayloadResult<Option<Vec<u8>>> {
        match self {
            Payload::Empty => Ok(None),
            Payload::Bytes(bytes) => Ok(Some(bytes.clone())),
            Payload::Json(value) => {
                if is_json_content_type(content_type) {
                    serde_json::to_vec(value)
                        .map(Some)
                        .map_err(|e| PayloadError::Serialization(e.to_string()))
                } else if media_type(content_type).starts_with("text/") {
                    match value {
                        serde_json::Value::String(s) => Ok(Some(s.clone().into_bytes())),
                        _ => Err(PayloadError::UnsupportedContentType {
                            content_type: content_type.to_string(),
                        }),
                    }
                } else {
                    Err(PayloadError::UnsupportedContentType {
                        content_type: content_type.to_string(),
                    })
                }
            }
        }
    }

    /// Best-effort JSON view used to attach the payload to error details.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Payload::Empty => serde_json::Value::Null,
            Payload::Bytes(bytes) => {
                serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
            }
            Payload::Json(value) => value.clone(),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Payload::Bytes(value.to_vec())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// True for `application/json`, `text/json` and any `+json` structured syntax suffix.
pub fn is_json_content_type(content_type: &str) -> bool {
    let media = media_type(content_type);
    media == APPLICATION_JSON || media == "text/json" || media.ends_with("+json")
}

/// Rough structural check for a `type/subtype` media type.
pub fn is_valid_content_type(content_type: &str) -> bool {
    let media = media_type(content_type);
    match media.split_once('/') {
        Some((kind, subtype)) => {
            !kind.is_empty() && !subtype.is_empty() && !subtype.contains('/')
        }
        None => false,
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PayloadError {
    #[error("Payload serialization failed: {0}")]
    Serialization(String),

    #[error("Cannot encode structured payload as {content_type}")]
    UnsupportedContentType { content_type: String },
}

pub type PayloadResult<T> = Result<T, PayloadError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_bytes_untouched() {
        let payload = Payload::from(b"bye-world".to_vec());
        assert_eq!(
            payload.encode("application/octet-stream").unwrap(),
            Some(b"bye-world".to_vec())
        );
    }

    #[test]
    fn test_encode_json() {
        let payload = Payload::from(json!({"hello": "world"}));
        assert_eq!(
            payload.encode("application/json; charset=utf-8").unwrap(),
            Some(br#"{"hello":"world"}"#.to_vec())
        );
        assert!(payload.encode("application/cloudevents+json").is_ok());
    }

    #[test]
    fn test_encode_text() {
        let payload = Payload::from(json!("plain"));
        assert_eq!(
            payload.encode(TEXT_PLAIN).unwrap(),
            Some(b"plain".to_vec())
        );

        let payload = Payload::from(json!({"not": "text"}));
        assert!(matches!(
            payload.encode(TEXT_PLAIN),
            Err(PayloadError::UnsupportedContentType { .. })
        ));
    }

    #[test]
    fn test_encode_unsupported() {
        let payload = Payload::from(json!({"hello": "world"}));
        assert!(payload.encode("application/xml").is_err());
        assert_eq!(Payload::Empty.encode("application/xml").unwrap(), None);
    }

    #[test]
    fn test_content_type_checks() {
        assert!(is_json_content_type("Application/JSON"));
        assert!(!is_json_content_type("text/plain"));
        assert!(is_valid_content_type("text/plain; charset=utf-8"));
        assert!(!is_valid_content_type("json"));
        assert!(!is_valid_content_type("/json"));
    }
}
