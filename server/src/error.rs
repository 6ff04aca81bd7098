//! Error types for the interception server
//!
//! This module defines error types for each layer:
//! - `PatternError`: malformed path patterns at registration time
//! - `TransportError`: connection-level failures (simulated or real)
//! - `FetchError`: outcome of a single request that produced no response
//! - `InterceptError`: server lifecycle errors (install/uninstall are fatal)

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::handlers::ErrorEnvelope;

/// Header marking a simulated transport failure on the wire
pub const TRANSPORT_FAILURE_HEADER: &str = "x-mockwire-transport-failure";

/// Status used on the wire for a simulated transport failure
pub const TRANSPORT_FAILURE_STATUS: StatusCode = StatusCode::BAD_GATEWAY;

/// Path pattern compilation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Pattern must start with '/': {0}")]
    NotAbsolute(String),

    #[error("Empty parameter name in pattern: {0}")]
    EmptyParam(String),

    #[error("Duplicate parameter '{name}' in pattern: {pattern}")]
    DuplicateParam { pattern: String, name: String },

    #[error("Wildcard must be the last segment: {0}")]
    MisplacedWildcard(String),
}

/// Connection-level failures, distinct from any HTTP status
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Simulated network failure")]
    Simulated,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("No transport configured")]
    Offline,
}

/// A request that did not produce an HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unhandled request: {method} {path}")]
    Unhandled { method: Method, path: String },

    #[error("Interception server is not running")]
    NotRunning,

    #[error("Failed to decode body: {0}")]
    Decode(String),
}

impl FetchError {
    /// Whether this is a connection-level failure
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Transport(_))
    }
}

/// Server lifecycle errors
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Failed to install interception: {0}")]
    Install(String),

    #[error("Failed to uninstall interception: {0}")]
    Uninstall(String),

    #[error("Invalid handler pattern: {0}")]
    Pattern(#[from] PatternError),

    #[error("{} unhandled request(s): {}", .0.len(), .0.join(", "))]
    UnhandledRequests(Vec<String>),
}

impl IntoResponse for FetchError {
    fn into_response(self) -> Response {
        let (status, error) = match &self {
            FetchError::Transport(e) => {
                tracing::debug!(error = %e, "Answering with simulated transport failure");
                let mut response = (
                    TRANSPORT_FAILURE_STATUS,
                    Json(ErrorEnvelope::new("Network Error", self.to_string())),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(TRANSPORT_FAILURE_HEADER, HeaderValue::from_static("1"));
                return response;
            }
            FetchError::Unhandled { .. } => (StatusCode::NOT_IMPLEMENTED, "Unhandled Request"),
            FetchError::NotRunning => (StatusCode::SERVICE_UNAVAILABLE, "Not Running"),
            FetchError::Decode(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
        };

        (status, Json(ErrorEnvelope::new(error, self.to_string()))).into_response()
    }
}
