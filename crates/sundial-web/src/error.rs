//! Error types for the web surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use sundial_scheduler::{SchedulerError, StorageError};

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum WebError {
    /// Manager query error.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// The request URL could not be rebuilt for page links.
    #[error("invalid request url: {0}")]
    Url(#[from] url::ParseError),
}

impl WebError {
    fn status(&self) -> StatusCode {
        match self {
            WebError::Scheduler(SchedulerError::Storage(StorageError::InvalidSort(_))) => {
                StatusCode::BAD_REQUEST
            }
            WebError::Scheduler(SchedulerError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::Scheduler(_) | WebError::Url(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
