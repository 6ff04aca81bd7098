//! Wire mode
//!
//! Exposes an [`InterceptServer`] over HTTP so that code using a real client
//! can be pointed at it. Every request is routed through a single fallback
//! handler that consults the registry.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::error::{FetchError, InterceptError};
use crate::intercept::{InterceptServer, WeakInterceptServer};
use crate::transport::{ApiRequest, ApiResponse};

/// Build the router that answers every request from the registry.
///
/// The router does not keep `server` alive; once it is dropped every request
/// is answered as if the server were stopped.
pub fn router(server: &InterceptServer) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(server.downgrade())
}

async fn dispatch(
    State(server): State<WeakInterceptServer>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());

    let Some(server) = server.upgrade() else {
        return FetchError::NotRunning.into_response();
    };

    let mut request = ApiRequest::new(method, &target);
    request.headers = headers;
    request.body = decode_body(&body);

    match server.handle(&request) {
        Ok(response) => into_http(response),
        Err(e) => e.into_response(),
    }
}

/// JSON bodies are parsed; anything else is kept as a string
pub(crate) fn decode_body(bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    Some(
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    )
}

fn into_http(response: ApiResponse) -> Response {
    let mut http = match response.body {
        Some(body) => (response.status, Json(body)).into_response(),
        None => response.status.into_response(),
    };
    http.headers_mut().extend(response.headers);
    http
}

/// A running loopback listener
pub struct WireHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl WireHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal graceful shutdown and wait for the server task
    pub async fn shutdown(mut self) -> Result<(), InterceptError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.join
            .await
            .map_err(|e| InterceptError::Uninstall(e.to_string()))
    }
}

/// Bind `addr` and serve the registry on it
pub async fn listen(server: &InterceptServer, addr: SocketAddr) -> Result<WireHandle, InterceptError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| InterceptError::Install(format!("bind {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| InterceptError::Install(e.to_string()))?;

    let (tx, rx) = oneshot::channel::<()>();
    let app = router(server);

    let join = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                rx.await.ok();
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Wire server stopped with error");
        }
    });

    Ok(WireHandle {
        local_addr,
        shutdown: Some(tx),
        join,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterceptConfig;
    use crate::error::{TRANSPORT_FAILURE_HEADER, TRANSPORT_FAILURE_STATUS};
    use crate::handlers::users::UserRecord;
    use crate::handlers::ErrorEnvelope;
    use crate::registry::Handler;
    use crate::transport::Reply;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    async fn test_server() -> (InterceptServer, TestServer) {
        let server = InterceptServer::with_default_handlers(InterceptConfig::in_process()).unwrap();
        server.start().await.unwrap();
        let test = TestServer::new(router(&server)).unwrap();
        (server, test)
    }

    #[tokio::test]
    async fn serves_base_handlers() {
        let (_server, test) = test_server().await;

        let response = test.get("/api/users").await;
        response.assert_status_ok();
        let users: Vec<UserRecord> = response.json();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn forwards_json_body() {
        let (_server, test) = test_server().await;

        let response = test
            .post("/api/users")
            .json(&serde_json::json!({ "name": "New User", "email": "new@example.com" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let user: UserRecord = response.json();
        assert_eq!(user.id, 3);
        assert_eq!(user.name, "New User");
    }

    #[tokio::test]
    async fn not_found_envelope_survives_the_wire() {
        let (_server, test) = test_server().await;

        let response = test.get("/api/users/999").await;
        response.assert_status(StatusCode::NOT_FOUND);
        let error: ErrorEnvelope = response.json();
        assert_eq!(error.message, "User not found");
    }

    #[tokio::test]
    async fn unhandled_request_is_not_implemented() {
        let (server, test) = test_server().await;

        let response = test.get("/api/unknown").await;
        response.assert_status(StatusCode::NOT_IMPLEMENTED);
        assert!(server.assert_all_handled().is_err());
    }

    #[tokio::test]
    async fn network_error_is_marked() {
        let (server, test) = test_server().await;
        server.register_override(Handler::get("/api/users", |_| Reply::network_error()).unwrap());

        let response = test.get("/api/users").await;
        response.assert_status(TRANSPORT_FAILURE_STATUS);
        assert_eq!(response.header(TRANSPORT_FAILURE_HEADER), "1");
    }

    #[tokio::test]
    async fn dropped_server_answers_as_stopped() {
        let server = InterceptServer::with_default_handlers(InterceptConfig::in_process()).unwrap();
        server.start().await.unwrap();
        let test = TestServer::new(router(&server)).unwrap();
        drop(server);

        let response = test.get("/api/users").await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn listener_stops_when_server_is_dropped() {
        let server = InterceptServer::with_default_handlers(InterceptConfig::loopback()).unwrap();
        server.start().await.unwrap();
        let addr = server.base_url().unwrap().trim_start_matches("http://").to_string();
        assert!(tokio::net::TcpStream::connect(&addr).await.is_ok());

        drop(server);

        let mut refused = false;
        for _ in 0..100 {
            if tokio::net::TcpStream::connect(&addr).await.is_err() {
                refused = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(refused, "listener on {} outlived its server", addr);
    }

    #[test]
    fn non_json_body_is_kept_as_text() {
        assert_eq!(decode_body(b""), None);
        assert_eq!(decode_body(b"{\"a\":1}"), Some(serde_json::json!({ "a": 1 })));
        assert_eq!(
            decode_body(b"plain"),
            Some(Value::String("plain".to_string()))
        );
    }
}
