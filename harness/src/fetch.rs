//! Fetch cache
//!
//! A keyed query cache in front of an `HttpTransport`. Views obtain it from
//! the provider stack and fetch through it; a fresh instance is built for
//! every render so cached responses never cross test cases.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use mockwire_server::{ApiRequest, ApiResponse, FetchError, HttpTransport, TransportError};
use uuid::Uuid;

use crate::error::HarnessError;

/// Retry behaviour for queries and mutations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub query_retry: u32,
    pub mutation_retry: u32,
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            query_retry: 3,
            mutation_retry: 0,
            retry_delay: Duration::from_millis(1000),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

impl FetchOptions {
    /// Options used under test: a failed request is reported immediately
    pub fn no_retry() -> Self {
        Self {
            query_retry: 0,
            mutation_retry: 0,
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt` (zero-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.retry_delay
            .saturating_mul(factor)
            .min(self.max_retry_delay)
    }
}

struct FetchInner {
    id: Uuid,
    transport: Arc<dyn HttpTransport>,
    options: FetchOptions,
    cache: RwLock<HashMap<String, ApiResponse>>,
}

/// Query cache shared by every view inside one render
#[derive(Clone)]
pub struct FetchClient {
    inner: Arc<FetchInner>,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn HttpTransport>, options: FetchOptions) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(cache_id = %id, "Creating fetch cache");
        Self {
            inner: Arc::new(FetchInner {
                id,
                transport,
                options,
                cache: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Identifies this cache instance
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn options(&self) -> &FetchOptions {
        &self.inner.options
    }

    /// Fetch `request`, answering from the cache when `key` is present.
    ///
    /// Only successful responses are cached.
    pub async fn query(&self, key: &str, request: ApiRequest) -> Result<ApiResponse, FetchError> {
        if let Some(hit) = self.cached(key) {
            tracing::debug!(cache_id = %self.inner.id, key, "Cache hit");
            return Ok(hit);
        }

        let response = self
            .send_with_retry(request, self.inner.options.query_retry)
            .await?;
        if response.is_success() {
            self.inner
                .cache
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_string(), response.clone());
        }
        Ok(response)
    }

    /// Send a write request. Never cached.
    pub async fn mutate(&self, request: ApiRequest) -> Result<ApiResponse, FetchError> {
        self.send_with_retry(request, self.inner.options.mutation_retry)
            .await
    }

    pub fn cached(&self, key: &str) -> Option<ApiResponse> {
        self.inner
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Drop one cached entry, returning whether it existed
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.inner
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn cache_len(&self) -> usize {
        self.inner
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn send_with_retry(
        &self,
        request: ApiRequest,
        retries: u32,
    ) -> Result<ApiResponse, FetchError> {
        let mut attempt = 0;
        loop {
            let outcome = self.inner.transport.send(request.clone()).await;
            let retryable = match &outcome {
                Ok(response) => response.status.is_server_error(),
                Err(e) => e.is_transport(),
            };
            if !retryable || attempt >= retries {
                return outcome;
            }

            let delay = self.inner.options.delay_for(attempt);
            tracing::warn!(
                request_id = %request.id,
                path = %request.path,
                attempt = attempt + 1,
                ?delay,
                "Retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for FetchClient
where
    S: Send + Sync,
{
    type Rejection = HarnessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<FetchClient>()
            .cloned()
            .ok_or(HarnessError::MissingProvider {
                context: "FetchClient",
                provider: "fetch cache provider",
            })
    }
}

/// Transport used when no server was supplied; every request fails
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl HttpTransport for OfflineTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, FetchError> {
        tracing::warn!(method = %request.method, path = %request.path, "No transport configured");
        Err(TransportError::Offline.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use mockall::{mock, predicate::always};
    use mockwire_server::{InterceptConfig, InterceptServer};

    mock! {
        pub Transport {}

        #[async_trait]
        impl HttpTransport for Transport {
            async fn send(&self, request: ApiRequest) -> Result<ApiResponse, FetchError>;
        }
    }

    fn fast_retry() -> FetchOptions {
        FetchOptions {
            retry_delay: Duration::from_millis(1),
            ..FetchOptions::default()
        }
    }

    async fn server() -> Arc<InterceptServer> {
        let server = InterceptServer::with_default_handlers(InterceptConfig::in_process()).unwrap();
        server.start().await.unwrap();
        Arc::new(server)
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let options = FetchOptions::default();
        assert_eq!(options.delay_for(0), Duration::from_millis(1000));
        assert_eq!(options.delay_for(1), Duration::from_millis(2000));
        assert_eq!(options.delay_for(2), Duration::from_millis(4000));
        assert_eq!(options.delay_for(10), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn no_retry_sends_exactly_once() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .with(always())
            .times(1)
            .returning(|_| Err(TransportError::Simulated.into()));

        let client = FetchClient::new(Arc::new(transport), FetchOptions::no_retry());
        let result = client.query("users", ApiRequest::get("/api/users")).await;
        assert!(result.unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn default_options_retry_queries_three_times() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(4)
            .returning(|_| Ok(ApiResponse::empty(StatusCode::SERVICE_UNAVAILABLE)));

        let client = FetchClient::new(Arc::new(transport), fast_retry());
        let response = client
            .query("users", ApiRequest::get("/api/users"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(client.cache_len(), 0);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Ok(ApiResponse::empty(StatusCode::NOT_FOUND)));

        let client = FetchClient::new(Arc::new(transport), fast_retry());
        let response = client
            .query("user-999", ApiRequest::get("/api/users/999"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mutations_are_not_retried_by_default() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_| Err(TransportError::Simulated.into()));

        let client = FetchClient::new(Arc::new(transport), fast_retry());
        assert!(client.mutate(ApiRequest::post("/api/users")).await.is_err());
    }

    #[tokio::test]
    async fn successful_query_is_cached() {
        let server = server().await;
        let client = FetchClient::new(server.clone(), FetchOptions::no_retry());

        let first = client
            .query("users", ApiRequest::get("/api/users"))
            .await
            .unwrap();
        let second = client
            .query("users", ApiRequest::get("/api/users"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(server.requests().len(), 1);
        assert!(client.cached("users").is_some());
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let server = server().await;
        let client = FetchClient::new(server.clone(), FetchOptions::no_retry());

        client
            .query("users", ApiRequest::get("/api/users"))
            .await
            .unwrap();
        assert!(client.invalidate("users"));
        assert!(!client.invalidate("users"));
        client
            .query("users", ApiRequest::get("/api/users"))
            .await
            .unwrap();

        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn error_responses_are_not_cached() {
        let server = server().await;
        let client = FetchClient::new(server.clone(), FetchOptions::no_retry());

        let response = client
            .query("user-999", ApiRequest::get("/api/users/999"))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(client.cached("user-999").is_none());
    }

    #[tokio::test]
    async fn offline_transport_fails_every_request() {
        let client = FetchClient::new(Arc::new(OfflineTransport), FetchOptions::no_retry());
        let err = client
            .query("users", ApiRequest::get("/api/users"))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Transport(TransportError::Offline));
    }

    #[test]
    fn clones_share_one_cache() {
        let client = FetchClient::new(Arc::new(OfflineTransport), FetchOptions::no_retry());
        let clone = client.clone();
        assert_eq!(client.id(), clone.id());
        client.clear();
        assert_eq!(clone.cache_len(), 0);
    }
}
