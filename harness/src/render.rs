//! Render primitive
//!
//! A view is an axum `Router`. Mounting it issues a `GET` for the current
//! location, optionally through a wrapper, and captures the response.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, Method, StatusCode},
    Router,
};
use serde::de::DeserializeOwned;
use tower::ServiceExt;

use crate::error::HarnessError;

/// Wraps a view before each mount
pub type Wrapper = Arc<dyn Fn(Router) -> Router + Send + Sync>;

/// Where the view ended up after a mount.
///
/// A layer that navigates puts this in the response extensions; the next
/// mount requests that location instead of the previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentLocation(pub String);

/// Settings applied to every mount request
#[derive(Debug, Clone, Default)]
pub struct MountOptions {
    pub headers: HeaderMap,
}

/// Options understood by [`render`]
#[derive(Clone)]
pub struct BaseRenderOptions {
    pub location: String,
    pub wrapper: Option<Wrapper>,
    pub mount: MountOptions,
}

impl Default for BaseRenderOptions {
    fn default() -> Self {
        Self {
            location: "/".to_string(),
            wrapper: None,
            mount: MountOptions::default(),
        }
    }
}

/// A mounted view
pub struct RenderResult {
    view: Router,
    wrapper: Option<Wrapper>,
    location: String,
    mount: MountOptions,
    status: StatusCode,
    output: String,
}

pub async fn render(view: Router, options: BaseRenderOptions) -> Result<RenderResult, HarnessError> {
    let mut result = RenderResult {
        view,
        wrapper: options.wrapper,
        location: options.location,
        mount: options.mount,
        status: StatusCode::OK,
        output: String::new(),
    };
    result.mount().await?;
    Ok(result)
}

impl RenderResult {
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn contains(&self, text: &str) -> bool {
        self.output.contains(text)
    }

    /// Parse the rendered output as JSON
    pub fn output_json<T: DeserializeOwned>(&self) -> Result<T, HarnessError> {
        serde_json::from_str(&self.output).map_err(|e| HarnessError::Render(e.to_string()))
    }

    /// Replace the view, keeping the wrapper and whatever state it holds
    pub async fn rerender(&mut self, view: Router) -> Result<(), HarnessError> {
        self.view = view;
        self.mount().await
    }

    /// Mount the current view again
    pub async fn refresh(&mut self) -> Result<(), HarnessError> {
        self.mount().await
    }

    pub async fn navigate(&mut self, path: &str) -> Result<(), HarnessError> {
        self.location = path.to_string();
        self.mount().await
    }

    pub fn unmount(self) {
        tracing::debug!(location = %self.location, "Unmounting view");
    }

    async fn mount(&mut self) -> Result<(), HarnessError> {
        let app = match &self.wrapper {
            Some(wrapper) => wrapper(self.view.clone()),
            None => self.view.clone(),
        };

        let mut request = Request::builder()
            .method(Method::GET)
            .uri(self.location.as_str())
            .body(Body::empty())
            .map_err(|e| HarnessError::Render(e.to_string()))?;
        request.headers_mut().extend(self.mount.headers.clone());

        let response = match app.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        self.status = response.status();
        if let Some(CurrentLocation(location)) = response.extensions().get::<CurrentLocation>() {
            self.location = location.clone();
        }
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| HarnessError::Render(e.to_string()))?;
        self.output = String::from_utf8_lossy(&bytes).into_owned();

        tracing::debug!(location = %self.location, status = %self.status, "Rendered view");
        Ok(())
    }
}
