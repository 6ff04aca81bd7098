//! HTTP transport over a real socket
//!
//! Used against the loopback listener (or any real server). Connection errors
//! and the simulated-failure marker both surface as `FetchError::Transport`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};

use crate::error::{FetchError, TransportError, TRANSPORT_FAILURE_HEADER};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::wire::decode_body;

/// `HttpTransport` backed by a reqwest client
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, FetchError> {
        let url = format!("{}{}", self.base_url, request.path_and_query());
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(request_id = %request.id, url = %url, error = %e, "Request failed");
            TransportError::Connection(e.to_string())
        })?;

        if response.headers().contains_key(TRANSPORT_FAILURE_HEADER) {
            return Err(TransportError::Simulated.into());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(ApiResponse {
            status,
            headers,
            body: decode_body(&bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterceptConfig;
    use crate::handlers::users::UserRecord;
    use crate::intercept::InterceptServer;
    use crate::registry::Handler;
    use crate::transport::Reply;
    use axum::http::StatusCode;

    #[test]
    fn trims_trailing_slash() {
        let transport = ReqwestTransport::new("http://127.0.0.1:4010/").unwrap();
        assert_eq!(transport.base_url(), "http://127.0.0.1:4010");
    }

    #[tokio::test]
    async fn loopback_round_trip_matches_in_process() {
        let server = InterceptServer::with_default_handlers(InterceptConfig::loopback()).unwrap();
        server.start().await.unwrap();
        let transport = ReqwestTransport::new(&server.base_url().unwrap()).unwrap();

        let over_wire = transport.send(ApiRequest::get("/api/users/42")).await.unwrap();
        let in_process = server.handle(&ApiRequest::get("/api/users/42")).unwrap();
        assert_eq!(over_wire.status, in_process.status);
        assert_eq!(over_wire.body, in_process.body);

        let user: UserRecord = over_wire.body_as().unwrap();
        assert_eq!(user.name, "User 42");

        server.stop().await.unwrap();
        assert!(server.base_url().is_none());
    }

    #[tokio::test]
    async fn simulated_failure_maps_to_transport_error() {
        let server = InterceptServer::with_default_handlers(InterceptConfig::loopback()).unwrap();
        server.start().await.unwrap();
        server.register_override(Handler::get("/api/users", |_| Reply::network_error()).unwrap());
        let transport = ReqwestTransport::new(&server.base_url().unwrap()).unwrap();

        let err = transport.send(ApiRequest::get("/api/users")).await.unwrap_err();
        assert_eq!(err, FetchError::Transport(TransportError::Simulated));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn server_errors_stay_http_responses() {
        let server = InterceptServer::with_default_handlers(InterceptConfig::loopback()).unwrap();
        server.start().await.unwrap();
        server.register_override(
            Handler::get("/api/users", |_| Reply::empty(StatusCode::INTERNAL_SERVER_ERROR))
                .unwrap(),
        );
        let transport = ReqwestTransport::new(&server.base_url().unwrap()).unwrap();

        let response = transport.send(ApiRequest::get("/api/users")).await.unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.body.is_none());

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_transport_error() {
        let server = InterceptServer::with_default_handlers(InterceptConfig::loopback()).unwrap();
        server.start().await.unwrap();
        let base_url = server.base_url().unwrap();
        server.stop().await.unwrap();

        let transport = ReqwestTransport::new(&base_url).unwrap();
        let err = transport.send(ApiRequest::get("/api/users")).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport(TransportError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn bind_conflict_fails_install() {
        let first = InterceptServer::with_default_handlers(InterceptConfig::loopback()).unwrap();
        first.start().await.unwrap();
        let addr = first
            .base_url()
            .unwrap()
            .trim_start_matches("http://")
            .parse()
            .unwrap();

        let second =
            InterceptServer::with_default_handlers(InterceptConfig::loopback_on(addr)).unwrap();
        let result = second.start().await;
        assert!(matches!(result, Err(crate::error::InterceptError::Install(_))));
        assert!(!second.is_running());

        first.stop().await.unwrap();
    }
}
