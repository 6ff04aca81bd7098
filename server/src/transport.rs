//! Request/response model and the transport port
//!
//! `HttpTransport` is the seam code under test sends requests through. The
//! interception server implements it in-process; `ReqwestTransport` implements
//! it over a real socket.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::FetchError;

/// Unique identifier for an issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An outbound request issued by code under test
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub id: RequestId,
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Create a request. Absolute URLs are reduced to path and query.
    pub fn new(method: Method, url: &str) -> Self {
        let path_and_query = match url.find("://") {
            Some(scheme_end) => {
                let rest = &url[scheme_end + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
            }
            None => url,
        };

        let (path, query) = match path_and_query.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (path_and_query, None),
        };

        Self {
            id: RequestId::new(),
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: &str) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn patch(url: &str) -> Self {
        Self::new(Method::PATCH, url)
    }

    pub fn delete(url: &str) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Attach a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, FetchError> {
        self.body = Some(serde_json::to_value(body).map_err(|e| FetchError::Decode(e.to_string()))?);
        Ok(self)
    }

    /// Attach a header. Invalid names or values are ignored with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Ignoring invalid request header"),
        }
        self
    }

    /// Path plus query string, as it would appear on the wire
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }

    /// Deserialize the request body
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        let body = self.body.clone().unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// A synthesized HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl ApiResponse {
    /// A JSON response with status 200
    pub fn json<T: Serialize>(body: &T) -> Self {
        let body = match serde_json::to_value(body) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                Value::Null
            }
        };
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    /// A response with no body
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Deserialize the response body
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, FetchError> {
        let body = self.body.clone().unwrap_or(Value::Null);
        serde_json::from_value(body).map_err(|e| FetchError::Decode(e.to_string()))
    }
}

/// What a responder produces for a matched request
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Response(ApiResponse),
    /// Connection-level failure; carries no status code
    NetworkError,
}

impl Reply {
    pub fn json<T: Serialize>(body: &T) -> Self {
        Reply::Response(ApiResponse::json(body))
    }

    pub fn json_with_status<T: Serialize>(body: &T, status: StatusCode) -> Self {
        Reply::Response(ApiResponse::json(body).with_status(status))
    }

    pub fn empty(status: StatusCode) -> Self {
        Reply::Response(ApiResponse::empty(status))
    }

    pub fn network_error() -> Self {
        Reply::NetworkError
    }
}

impl From<ApiResponse> for Reply {
    fn from(response: ApiResponse) -> Self {
        Reply::Response(response)
    }
}

/// Port for sending HTTP requests
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, FetchError>;
}
