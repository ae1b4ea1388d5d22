//! Error handling for ceflow-http
//!
//! Maps binding and synchronizer failures onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ceflow::correlation::SyncError;
use serde_json::json;
use std::cmp::PartialEq;

use crate::binding::BindingError;

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// The request does not carry a valid event
    Binding(BindingError),

    /// Correlation outcome
    Sync(SyncError),

    /// Internal error
    Internal(String),
}

impl From<BindingError> for AppError {
    fn from(err: BindingError) -> Self {
        Self::Binding(err)
    }
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        Self::Sync(err)
    }
}

impl PartialEq<StatusCode> for AppError {
    fn eq(&self, status_code: &StatusCode) -> bool {
        let (error_status, _) = self.status_and_message();
        &error_status == status_code
    }
}

impl AppError {
    /// Get the status code and error message for this error
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Binding(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Sync(err) => (
                StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                err.to_string(),
            ),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_mapping() {
        assert!(AppError::from(SyncError::Timeout("a".into())) == StatusCode::GATEWAY_TIMEOUT);
        assert!(AppError::from(SyncError::UnknownSession("a".into())) == StatusCode::BAD_GATEWAY);
        assert!(AppError::from(SyncError::ShuttingDown) == StatusCode::SERVICE_UNAVAILABLE);
        assert!(
            AppError::from(SyncError::DuplicateSession("a".into()))
                == StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(
            AppError::from(BindingError::MissingAttribute("ce-id")) == StatusCode::BAD_REQUEST
        );
    }
}
