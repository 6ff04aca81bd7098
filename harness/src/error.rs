//! Harness error types

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use mockwire_server::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Request failed with status {0}")]
    Status(StatusCode),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Timed out after {timeout:?}: {last_error}")]
    Timeout {
        timeout: Duration,
        last_error: String,
    },

    #[error("Element is already removed")]
    AlreadyRemoved,

    #[error("{context} must be used within a {provider}")]
    MissingProvider {
        context: &'static str,
        provider: &'static str,
    },
}

impl IntoResponse for HarnessError {
    fn into_response(self) -> Response {
        let status = match &self {
            HarnessError::Fetch(FetchError::Transport(_)) => StatusCode::BAD_GATEWAY,
            HarnessError::Status(status) => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "View failed");
        }
        (status, self.to_string()).into_response()
    }
}
