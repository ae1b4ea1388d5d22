use std::{collections::HashMap, fmt, sync::Arc};

use crate::event::envelope::EventEnvelope;

use super::{ReplyError, ReplyResult};

pub type HeaderFn = Arc<dyn Fn(&EventEnvelope) -> ReplyResult<String> + Send + Sync>;

/// Strategy that computes a reply header (type, source or content type) from the
/// inbound envelope.
#[derive(Clone)]
pub enum ResponseHeaderValue {
    /// Ignores the inbound envelope and returns a constant.
    Static(String),
    /// Appends a suffix to the inbound event type.
    Suffix(String),
    /// Looks the inbound event type up in a table, failing on unknown types.
    Mapped(HashMap<String, String>),
    Custom(HeaderFn),
}

impl ResponseHeaderValue {
    pub fn fixed(value: impl Into<String>) -> Self {
        Self::Static(value.into())
    }

    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self::Suffix(suffix.into())
    }

    pub fn mapped(table: HashMap<String, String>) -> Self {
        Self::Mapped(table)
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&EventEnvelope) -> ReplyResult<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(f))
    }

    pub fn resolve(&self, event: &EventEnvelope) -> ReplyResult<String> {
        match self {
            Self::Static(value) => Ok(value.clone()),
            Self::Suffix(suffix) => Ok(format!("{}{}", event.event_type, suffix)),
            Self::Mapped(table) => {
                table
                    .get(&event.event_type)
                    .cloned()
                    .ok_or_else(|| ReplyError::UnmappedEventType {
                        event_type: event.event_type.clone(),
                    })
            }
            Self::Custom(f) => f(event),
        }
    }
}

impl fmt::Debug for ResponseHeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Suffix(suffix) => f.debug_tuple("Suffix").field(suffix).finish(),
            Self::Mapped(table) => f.debug_tuple("Mapped").field(table).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(event_type: &str) -> EventEnvelope {
        EventEnvelope::builder()
            .id("in-1234")
            .event_type(event_type)
            .source("in.source")
            .build()
            .unwrap()
    }

    #[test]
    fn test_static() {
        let header = ResponseHeaderValue::fixed("out.type");
        assert_eq!(header.resolve(&event("in.type")).unwrap(), "out.type");
    }

    #[test]
    fn test_suffix() {
        let header = ResponseHeaderValue::suffix(".response");
        assert_eq!(
            header.resolve(&event("in.type")).unwrap(),
            "in.type.response"
        );
    }

    #[test]
    fn test_mapped() {
        let header = ResponseHeaderValue::mapped(HashMap::from([(
            "in.type".to_string(),
            "out.type".to_string(),
        )]));
        assert_eq!(header.resolve(&event("in.type")).unwrap(), "out.type");
        assert_eq!(
            header.resolve(&event("bad.type")),
            Err(ReplyError::UnmappedEventType {
                event_type: "bad.type".to_string()
            })
        );
    }

    #[test]
    fn test_custom() {
        let header = ResponseHeaderValue::custom(|e| Ok(e.source.to_uppercase()));
        assert_eq!(header.resolve(&event("in.type")).unwrap(), "IN.SOURCE");
    }
}
