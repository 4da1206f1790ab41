//! API error → HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use triage_broker::PipelineError;
use triage_dedup::DedupError;
use triage_store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    /// Missing ticket/agent/incident or empty queue → 404.
    NotFound(String),
    /// Shared store / worker pool unreachable → 503.
    Unavailable(String),
    /// Anything else → 500.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail),
            ApiError::Unavailable(detail) => (StatusCode::SERVICE_UNAVAILABLE, detail),
            ApiError::Internal(detail) => (StatusCode::INTERNAL_SERVER_ERROR, detail),
        };
        (status, Json(serde_json::json!({ "error": detail }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Connection(detail) => ApiError::Unavailable(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Store(inner) => inner.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DedupError> for ApiError {
    fn from(e: DedupError) -> Self {
        match e {
            DedupError::IncidentNotFound(id) => ApiError::NotFound(format!("incident {id}")),
            DedupError::Store(inner) => inner.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<triage_agent::AgentError> for ApiError {
    fn from(e: triage_agent::AgentError) -> Self {
        match e {
            triage_agent::AgentError::Store(inner) => inner.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
