//! Interception server
//!
//! Owns the handler registry and answers requests from it. The server is an
//! explicit handle: tests construct it, start it, hand it to the code under
//! test as an `HttpTransport`, and mark case boundaries with [`CaseGuard`].

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;
use axum::http::Method;

use crate::config::{InterceptConfig, InterceptMode};
use crate::error::{FetchError, InterceptError, TransportError};
use crate::handlers::default_handlers;
use crate::registry::{Handler, HandlerRegistry, HandlerSummary, ResolverContext};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Reply, RequestId};
use crate::wire::{self, WireHandle};

/// A request seen by the server during the current case
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub id: RequestId,
    pub method: Method,
    pub path: String,
    /// Pattern of the handler that answered, `None` if unhandled
    pub pattern: Option<String>,
    pub is_override: bool,
}

struct Inner {
    config: InterceptConfig,
    registry: RwLock<HandlerRegistry>,
    running: AtomicBool,
    journal: Mutex<Vec<RecordedRequest>>,
    unhandled: Mutex<Vec<String>>,
    local_addr: Mutex<Option<SocketAddr>>,
    wire: tokio::sync::Mutex<Option<WireHandle>>,
}

/// Request interceptor backed by a handler registry
#[derive(Clone)]
pub struct InterceptServer {
    inner: Arc<Inner>,
}

impl InterceptServer {
    pub fn new(config: InterceptConfig, base: Vec<Handler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: RwLock::new(HandlerRegistry::new(base)),
                running: AtomicBool::new(false),
                journal: Mutex::new(Vec::new()),
                unhandled: Mutex::new(Vec::new()),
                local_addr: Mutex::new(None),
                wire: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// A server whose base set is the `users` resource handlers
    pub fn with_default_handlers(config: InterceptConfig) -> Result<Self, InterceptError> {
        Ok(Self::new(config, default_handlers()?))
    }

    /// Begin intercepting. Calling this while running is a no-op.
    pub async fn start(&self) -> Result<(), InterceptError> {
        let mut wire = self.inner.wire.lock().await;
        if self.is_running() {
            tracing::debug!("Interception already running");
            return Ok(());
        }

        if let InterceptMode::Loopback { addr } = self.inner.config.mode {
            let handle = wire::listen(self, addr).await?;
            *lock(&self.inner.local_addr) = Some(handle.local_addr());
            tracing::info!(addr = %handle.local_addr(), "Interception listening on loopback");
            *wire = Some(handle);
        }

        self.inner.running.store(true, Ordering::SeqCst);
        tracing::info!(
            handlers = self.read_registry().base_len(),
            "Interception started"
        );
        Ok(())
    }

    /// Stop intercepting and release the loopback listener, if any
    pub async fn stop(&self) -> Result<(), InterceptError> {
        let mut wire = self.inner.wire.lock().await;
        self.inner.running.store(false, Ordering::SeqCst);
        *lock(&self.inner.local_addr) = None;

        if let Some(handle) = wire.take() {
            handle.shutdown().await?;
        }
        tracing::info!("Interception stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Base URL of the loopback listener while running in loopback mode
    pub fn base_url(&self) -> Option<String> {
        lock(&self.inner.local_addr).map(|addr| format!("http://{}", addr))
    }

    /// Add a handler that takes precedence over everything registered before
    pub fn register_override(&self, handler: Handler) {
        tracing::debug!(
            method = %handler.method(),
            pattern = %handler.pattern(),
            "Registering override"
        );
        self.write_registry().register_override(handler);
    }

    /// Register several overrides; later ones take precedence
    pub fn register_overrides(&self, handlers: impl IntoIterator<Item = Handler>) {
        for handler in handlers {
            self.register_override(handler);
        }
    }

    /// Discard all overrides, restoring the base set
    pub fn reset_overrides(&self) -> usize {
        let discarded = self.write_registry().reset_overrides();
        if discarded > 0 {
            tracing::debug!(discarded, "Overrides reset");
        }
        discarded
    }

    /// Handlers in resolution order
    pub fn list_handlers(&self) -> Vec<HandlerSummary> {
        self.read_registry().summaries()
    }

    /// Requests seen during the current case
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.inner.journal).clone()
    }

    /// Fail if any request of the current case went unhandled
    pub fn assert_all_handled(&self) -> Result<(), InterceptError> {
        let unhandled = lock(&self.inner.unhandled);
        if unhandled.is_empty() {
            Ok(())
        } else {
            Err(InterceptError::UnhandledRequests(unhandled.clone()))
        }
    }

    /// Mark the start of a test case. Per-case state is reset when the
    /// returned guard drops, whether the case passed or panicked.
    pub fn case(&self) -> CaseGuard {
        CaseGuard {
            server: self.clone(),
        }
    }

    /// Reset overrides, journal and unhandled list
    pub fn end_case(&self) {
        self.reset_overrides();
        lock(&self.inner.journal).clear();
        let unhandled = std::mem::take(&mut *lock(&self.inner.unhandled));
        if !unhandled.is_empty() {
            tracing::error!(
                count = unhandled.len(),
                requests = ?unhandled,
                "Case finished with unhandled requests"
            );
        }
    }

    /// Resolve a request against the registry.
    ///
    /// Resolution is synchronous; the responder runs after the registry lock
    /// has been released.
    pub fn handle(&self, request: &ApiRequest) -> Result<ApiResponse, FetchError> {
        if !self.is_running() {
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                "Request issued while interception is stopped"
            );
            return Err(FetchError::NotRunning);
        }

        let resolved = self
            .read_registry()
            .resolve(&request.method, &request.path);

        let Some(resolved) = resolved else {
            tracing::error!(
                request_id = %request.id,
                method = %request.method,
                path = %request.path,
                "Unhandled request; register a handler for it"
            );
            self.record(request, None, false);
            lock(&self.inner.unhandled).push(format!("{} {}", request.method, request.path));
            return Err(FetchError::Unhandled {
                method: request.method.clone(),
                path: request.path.clone(),
            });
        };

        tracing::debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            pattern = %resolved.pattern,
            is_override = resolved.is_override,
            "Intercepted request"
        );
        self.record(request, Some(resolved.pattern.clone()), resolved.is_override);

        let ctx = ResolverContext {
            request,
            params: &resolved.params,
        };
        match (resolved.responder)(&ctx) {
            Reply::Response(response) => Ok(response),
            Reply::NetworkError => Err(TransportError::Simulated.into()),
        }
    }

    fn record(&self, request: &ApiRequest, pattern: Option<String>, is_override: bool) {
        lock(&self.inner.journal).push(RecordedRequest {
            id: request.id,
            method: request.method.clone(),
            path: request.path.clone(),
            pattern,
            is_override,
        });
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, HandlerRegistry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, HandlerRegistry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Non-owning handle held by the loopback listener.
///
/// Dropping the last [`InterceptServer`] drops the listener's shutdown
/// sender, which stops the listener even when `stop()` was never called.
#[derive(Clone)]
pub struct WeakInterceptServer {
    inner: Weak<Inner>,
}

impl WeakInterceptServer {
    pub fn upgrade(&self) -> Option<InterceptServer> {
        self.inner.upgrade().map(|inner| InterceptServer { inner })
    }
}

impl InterceptServer {
    pub fn downgrade(&self) -> WeakInterceptServer {
        WeakInterceptServer {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

#[async_trait]
impl HttpTransport for InterceptServer {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, FetchError> {
        self.handle(&request)
    }
}

/// One test case's view of the server
#[must_use = "per-case state is reset when the guard drops"]
pub struct CaseGuard {
    server: InterceptServer,
}

impl Deref for CaseGuard {
    type Target = InterceptServer;

    fn deref(&self) -> &Self::Target {
        &self.server
    }
}

impl Drop for CaseGuard {
    fn drop(&mut self) {
        self.server.end_case();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::users::UserRecord;
    use crate::handlers::ErrorEnvelope;
    use axum::http::StatusCode;

    async fn started() -> InterceptServer {
        let server = InterceptServer::with_default_handlers(InterceptConfig::in_process()).unwrap();
        server.start().await.unwrap();
        server
    }

    fn server_error() -> Handler {
        Handler::get("/api/users", |_| {
            Reply::json_with_status(
                &ErrorEnvelope::new("Server Error", "Internal server error"),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })
        .unwrap()
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let server = started().await;
        server.start().await.unwrap();
        assert!(server.is_running());
        assert!(server.base_url().is_none());
    }

    #[tokio::test]
    async fn requests_fail_while_stopped() {
        let server = started().await;
        server.stop().await.unwrap();

        let result = server.handle(&ApiRequest::get("/api/users"));
        assert_eq!(result, Err(FetchError::NotRunning));
    }

    #[tokio::test]
    async fn base_handler_answers_list() {
        let server = started().await;
        let response = server.send(ApiRequest::get("/api/users")).await.unwrap();
        let users: Vec<UserRecord> = response.body_as().unwrap();
        assert_eq!(users.len(), 2);
    }

    #[tokio::test]
    async fn override_shadows_base_until_reset() {
        let server = started().await;

        let before = server.handle(&ApiRequest::get("/api/users")).unwrap();
        assert_eq!(before.status, StatusCode::OK);

        server.register_override(server_error());
        let during = server.handle(&ApiRequest::get("/api/users")).unwrap();
        assert_eq!(during.status, StatusCode::INTERNAL_SERVER_ERROR);

        assert_eq!(server.reset_overrides(), 1);
        let after = server.handle(&ApiRequest::get("/api/users")).unwrap();
        assert_eq!(after, before);
    }

    #[tokio::test]
    async fn override_does_not_affect_other_routes() {
        let server = started().await;
        server.register_override(server_error());

        let user = server.handle(&ApiRequest::get("/api/users/5")).unwrap();
        assert_eq!(user.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn network_error_is_distinct_from_status() {
        let server = started().await;
        server.register_override(Handler::get("/api/users", |_| Reply::network_error()).unwrap());

        let result = server.handle(&ApiRequest::get("/api/users"));
        let err = result.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err, FetchError::Transport(TransportError::Simulated));
    }

    #[tokio::test]
    async fn unhandled_request_is_reported() {
        let server = started().await;
        let result = server.handle(&ApiRequest::get("/api/unknown"));
        assert_eq!(
            result,
            Err(FetchError::Unhandled {
                method: Method::GET,
                path: "/api/unknown".to_string(),
            })
        );

        match server.assert_all_handled() {
            Err(InterceptError::UnhandledRequests(list)) => {
                assert_eq!(list, vec!["GET /api/unknown".to_string()])
            }
            other => panic!("expected unhandled requests, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn journal_records_matched_patterns() {
        let server = started().await;
        server.handle(&ApiRequest::get("/api/users/1")).unwrap();
        server.register_override(server_error());
        server.handle(&ApiRequest::get("/api/users")).unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].pattern.as_deref(), Some("/api/users/:id"));
        assert!(!requests[0].is_override);
        assert!(requests[1].is_override);
    }

    #[tokio::test]
    async fn case_guard_resets_on_drop() {
        let server = started().await;
        {
            let case = server.case();
            case.register_override(server_error());
            let _ = case.handle(&ApiRequest::get("/api/nothing"));
            assert_eq!(server.list_handlers().len(), 5);
        }

        assert_eq!(server.list_handlers().len(), 4);
        assert!(server.requests().is_empty());
        assert!(server.assert_all_handled().is_ok());
    }

    #[test]
    fn case_guard_resets_when_case_panics() {
        let server = InterceptServer::with_default_handlers(InterceptConfig::in_process()).unwrap();
        tokio_test::block_on(server.start()).unwrap();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let case = server.case();
            case.register_override(server_error());
            panic!("assertion failed inside the case");
        }));
        assert!(outcome.is_err());

        let response = server.handle(&ApiRequest::get("/api/users")).unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected_at_registration() {
        let result = Handler::get("api/users", |_| Reply::empty(StatusCode::OK));
        assert!(result.is_err());
    }
}
