//! Navigation provider

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::{self, Next},
    Router,
};

use crate::error::HarnessError;
use crate::render::CurrentLocation;

/// In-memory location history
#[derive(Debug, Clone)]
pub struct Navigator {
    history: Arc<Mutex<Vec<String>>>,
}

impl Navigator {
    pub fn new(initial: &str) -> Self {
        Self {
            history: Arc::new(Mutex::new(vec![initial.to_string()])),
        }
    }

    pub fn location(&self) -> String {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(|| "/".to_string())
    }

    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn push(&self, path: &str) {
        tracing::debug!(path, "Navigating");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(path.to_string());
    }

    /// Pop the current entry. The first entry is never removed.
    pub fn back(&self) -> Option<String> {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.len() > 1 {
            history.pop();
        }
        history.last().cloned()
    }
}

/// Keep the navigator in step with the requested location and expose it.
///
/// The location after the view ran is reported back, so a `push` from the
/// view decides what the next mount requests.
pub(crate) fn wrap(navigator: &Navigator, view: Router) -> Router {
    let navigator = navigator.clone();
    view.layer(middleware::from_fn(move |mut request: Request, next: Next| {
        let navigator = navigator.clone();
        async move {
            let path = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string());
            if navigator.location() != path {
                navigator.push(&path);
            }
            request.extensions_mut().insert(navigator.clone());
            let mut response = next.run(request).await;
            response
                .extensions_mut()
                .insert(CurrentLocation(navigator.location()));
            response
        }
    }))
}

#[async_trait]
impl<S> FromRequestParts<S> for Navigator
where
    S: Send + Sync,
{
    type Rejection = HarnessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Navigator>()
            .cloned()
            .ok_or(HarnessError::MissingProvider {
                context: "Navigator",
                provider: "navigation provider",
            })
    }
}
