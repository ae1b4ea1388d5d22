use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use ceflow::correlation::StatsSnapshot;
use serde::Serialize;
use tracing::debug;

use crate::{binding, error::AppError, server::AppState};

/// Health report of the synchronizer.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub stats: StatsSnapshot,
}

/// Receive an event
///
/// Requests wait for their correlated response, which becomes the HTTP response.
/// Responses are handed to the waiting request and acknowledged with 202.
#[axum::debug_handler]
pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let event = binding::from_http(&headers, &body)?;
    debug!("Received event {}", event.summary());

    match state.synchronizer.dispatch(event).await? {
        Some(reply) => {
            let (headers, body) =
                binding::to_binary(&reply).map_err(|e| AppError::Internal(e.to_string()))?;
            Ok((StatusCode::OK, headers, body).into_response())
        }
        None => Ok(StatusCode::ACCEPTED.into_response()),
    }
}

/// Get synchronizer health
#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.synchronizer.is_shutting_down() {
        "shutting_down"
    } else {
        "ok"
    };
    Json(HealthResponse {
        status,
        stats: state.synchronizer.stats(),
    })
}
