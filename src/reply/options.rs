use std::{fmt, sync::Arc};

use crate::event::{envelope::EventEnvelope, payload::is_valid_content_type};

use super::{ReplyError, ReplyResult};

/// Bridge identifier shared by every event of a multi-hop flow.
pub const STATEFUL_WORKFLOW_HEADER: &str = "statefulbridge";
/// Instance identifier of one run through a bridge.
pub const STATEFUL_WORKFLOW_INSTANCE_HEADER: &str = "statefulid";

pub const PROCESSED_TYPE_HEADER: &str = "processedtype";
pub const PROCESSED_SOURCE_HEADER: &str = "processedsource";
pub const PROCESSED_ID_HEADER: &str = "processedid";

pub type OptionFn = Arc<dyn Fn(&EventEnvelope, &mut EventEnvelope) -> ReplyResult<()> + Send + Sync>;

/// Mutation applied to a reply under construction, given the inbound envelope.
#[derive(Clone)]
pub enum ResponseOption {
    Subject(String),
    Id(String),
    DataContentType(String),
    /// Propagates the workflow headers, creating them when the inbound envelope has none.
    StatefulHeaders { bridge: String },
    /// Copies the inbound type, source and id into `processed*` extensions.
    ProcessedHeaders,
    Custom(OptionFn),
}

impl ResponseOption {
    pub fn with_subject(subject: impl Into<String>) -> Self {
        Self::Subject(subject.into())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn with_data_content_type(content_type: impl Into<String>) -> Self {
        Self::DataContentType(content_type.into())
    }

    pub fn with_stateful_headers(bridge: impl Into<String>) -> Self {
        Self::StatefulHeaders {
            bridge: bridge.into(),
        }
    }

    pub fn with_processed_headers() -> Self {
        Self::ProcessedHeaders
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&EventEnvelope, &mut EventEnvelope) -> ReplyResult<()> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn apply(&self, inbound: &EventEnvelope, out: &mut EventEnvelope) -> ReplyResult<()> {
        match self {
            Self::Subject(subject) => {
                if subject.is_empty() {
                    return Err(ReplyError::InvalidHeaderValue {
                        header: "subject".to_string(),
                        reason: "subject must not be empty".to_string(),
                    });
                }
                out.subject = Some(subject.clone());
            }
            Self::Id(id) => {
                if id.is_empty() {
                    return Err(ReplyError::InvalidHeaderValue {
                        header: "id".to_string(),
                        reason: "id must not be empty".to_string(),
                    });
                }
                out.id = id.clone();
            }
            Self::DataContentType(content_type) => {
                if !is_valid_content_type(content_type) {
                    return Err(ReplyError::InvalidHeaderValue {
                        header: "datacontenttype".to_string(),
                        reason: format!("{:?} is not a media type", content_type),
                    });
                }
                out.data_content_type = Some(content_type.clone());
            }
            Self::StatefulHeaders { bridge } => {
                let bridge = inbound
                    .extension(STATEFUL_WORKFLOW_HEADER)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| bridge.clone());
                out.set_extension(STATEFUL_WORKFLOW_HEADER, bridge)?;

                let instance = inbound
                    .extension(STATEFUL_WORKFLOW_INSTANCE_HEADER)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
                out.set_extension(STATEFUL_WORKFLOW_INSTANCE_HEADER, instance)?;
            }
            Self::ProcessedHeaders => {
                out.set_extension(PROCESSED_TYPE_HEADER, inbound.event_type.as_str())?;
                out.set_extension(PROCESSED_SOURCE_HEADER, inbound.source.as_str())?;
                out.set_extension(PROCESSED_ID_HEADER, inbound.id.as_str())?;
            }
            Self::Custom(f) => f(inbound, out)?,
        }
        Ok(())
    }
}

impl fmt::Debug for ResponseOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject(subject) => f.debug_tuple("Subject").field(subject).finish(),
            Self::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Self::DataContentType(ct) => f.debug_tuple("DataContentType").field(ct).finish(),
            Self::StatefulHeaders { bridge } => f
                .debug_struct("StatefulHeaders")
                .field("bridge", bridge)
                .finish(),
            Self::ProcessedHeaders => f.write_str("ProcessedHeaders"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::envelope::ExtensionValue;

    fn inbound() -> EventEnvelope {
        EventEnvelope::builder()
            .id("ce-abcd-0123")
            .event_type("ce.test.type")
            .source("ce.test.source")
            .build()
            .unwrap()
    }

    #[test]
    fn test_processed_headers() {
        let mut out = EventEnvelope::new();
        ResponseOption::with_processed_headers()
            .apply(&inbound(), &mut out)
            .unwrap();

        assert_eq!(
            out.extension(PROCESSED_TYPE_HEADER),
            Some(&ExtensionValue::from("ce.test.type"))
        );
        assert_eq!(
            out.extension(PROCESSED_SOURCE_HEADER),
            Some(&ExtensionValue::from("ce.test.source"))
        );
        assert_eq!(
            out.extension(PROCESSED_ID_HEADER),
            Some(&ExtensionValue::from("ce-abcd-0123"))
        );
    }

    #[test]
    fn test_stateful_headers_created() {
        let mut out = EventEnvelope::new();
        ResponseOption::with_stateful_headers("test-bridge")
            .apply(&inbound(), &mut out)
            .unwrap();

        assert_eq!(
            out.extension(STATEFUL_WORKFLOW_HEADER),
            Some(&ExtensionValue::from("test-bridge"))
        );
        let instance = out.extension(STATEFUL_WORKFLOW_INSTANCE_HEADER).unwrap();
        assert!(uuid::Uuid::parse_str(&instance.to_string()).is_ok());
    }

    #[test]
    fn test_stateful_headers_propagated() {
        let mut in_event = inbound();
        in_event
            .set_extension(STATEFUL_WORKFLOW_HEADER, "upstream-bridge")
            .unwrap();
        in_event
            .set_extension(STATEFUL_WORKFLOW_INSTANCE_HEADER, "instance-1")
            .unwrap();

        let mut out = EventEnvelope::new();
        ResponseOption::with_stateful_headers("test-bridge")
            .apply(&in_event, &mut out)
            .unwrap();

        assert_eq!(
            out.extension(STATEFUL_WORKFLOW_HEADER),
            Some(&ExtensionValue::from("upstream-bridge"))
        );
        assert_eq!(
            out.extension(STATEFUL_WORKFLOW_INSTANCE_HEADER),
            Some(&ExtensionValue::from("instance-1"))
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut out = EventEnvelope::new();
        assert!(ResponseOption::with_id("").apply(&inbound(), &mut out).is_err());
        assert!(ResponseOption::with_subject("")
            .apply(&inbound(), &mut out)
            .is_err());
        assert!(ResponseOption::with_data_content_type("json")
            .apply(&inbound(), &mut out)
            .is_err());
        assert_eq!(out, EventEnvelope::new());
    }

    #[test]
    fn test_simple_setters() {
        let mut out = EventEnvelope::new();
        for opt in [
            ResponseOption::with_id("out-1234"),
            ResponseOption::with_subject("test subject"),
            ResponseOption::with_data_content_type("text/plain"),
        ] {
            opt.apply(&inbound(), &mut out).unwrap();
        }
        assert_eq!(out.id, "out-1234");
        assert_eq!(out.subject.as_deref(), Some("test subject"));
        assert_eq!(out.data_content_type.as_deref(), Some("text/plain"));
    }
}
