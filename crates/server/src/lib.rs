//! Booking Assistant Server
//!
//! HTTP proxy in front of the completion service, plus health and metrics
//! endpoints.

pub mod http;
pub mod metrics;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, record_error, record_latency, record_request};
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use booking_assistant_llm::LlmError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Completion service is not configured")]
    NotConfigured,

    #[error("Upstream error: {0}")]
    Upstream(#[from] LlmError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable label used for error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::NotConfigured => "not_configured",
            ServerError::Upstream(_) => "upstream",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl From<&ServerError> for StatusCode {
    fn from(err: &ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotConfigured => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        StatusCode::from(&err)
    }
}

/// `{error, details}` body; server-side failures share one generic message
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = StatusCode::from(&self);
        let error = if status.is_server_error() {
            "Failed to get AI response".to_string()
        } else {
            self.to_string()
        };
        let body = serde_json::json!({
            "error": error,
            "details": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
