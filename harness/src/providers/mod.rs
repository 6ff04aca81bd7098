//! Provider composition
//!
//! Wraps a view in the same context layers the full application installs, so
//! anything the view extracts behaves as it would in production.

pub mod auth;
pub mod navigation;
pub mod theme;

use std::fmt;
use std::sync::Arc;

use axum::{Extension, Router};
use mockwire_server::HttpTransport;

use crate::error::HarnessError;
use crate::factories::User;
use crate::fetch::{FetchClient, FetchOptions, OfflineTransport};
use crate::render::{render, BaseRenderOptions, MountOptions, RenderResult, Wrapper};

pub use auth::AuthContext;
pub use navigation::Navigator;
pub use theme::{Theme, ThemeContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Navigation,
    FetchCache,
    Theme,
    Auth,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Navigation => write!(f, "navigation"),
            ProviderKind::FetchCache => write!(f, "fetch-cache"),
            ProviderKind::Theme => write!(f, "theme"),
            ProviderKind::Auth => write!(f, "auth"),
        }
    }
}

/// Provider state for one render, shared by every mount of that render
#[derive(Clone)]
pub struct ProviderStack {
    navigator: Navigator,
    fetch: FetchClient,
    theme: ThemeContext,
    auth: AuthContext,
}

impl ProviderStack {
    /// Outermost first. Inner layers may read what outer layers installed.
    pub const ORDER: [ProviderKind; 4] = [
        ProviderKind::Navigation,
        ProviderKind::FetchCache,
        ProviderKind::Theme,
        ProviderKind::Auth,
    ];

    pub fn new(route: &str, fetch: FetchClient, theme: Theme, user: Option<User>) -> Self {
        Self {
            navigator: Navigator::new(route),
            fetch,
            theme: ThemeContext::new(theme),
            auth: AuthContext::new(user),
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn fetch(&self) -> &FetchClient {
        &self.fetch
    }

    pub fn theme(&self) -> &ThemeContext {
        &self.theme
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    /// Wrap `view` in every provider, innermost first
    pub fn compose(&self, view: Router) -> Router {
        Self::ORDER
            .iter()
            .rev()
            .fold(view, |view, kind| self.wrap(*kind, view))
    }

    fn wrap(&self, kind: ProviderKind, view: Router) -> Router {
        match kind {
            ProviderKind::Navigation => navigation::wrap(&self.navigator, view),
            ProviderKind::FetchCache => view.layer(Extension(self.fetch.clone())),
            ProviderKind::Theme => theme::wrap(&self.theme, view),
            ProviderKind::Auth => auth::wrap(&self.auth, view),
        }
    }

    pub fn into_wrapper(self) -> Wrapper {
        Arc::new(move |view: Router| self.compose(view))
    }
}

/// Options for [`render_with_providers`]
#[derive(Clone)]
pub struct RenderOptions {
    pub route: String,
    pub user: Option<User>,
    pub theme: Theme,
    pub transport: Option<Arc<dyn HttpTransport>>,
    /// Handed to the render primitive as is. Location and wrapper are
    /// owned by the harness, so they are not part of this.
    pub base: MountOptions,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            route: "/".to_string(),
            user: None,
            theme: Theme::Light,
            transport: None,
            base: MountOptions::default(),
        }
    }
}

impl RenderOptions {
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport: Some(transport),
            ..Self::default()
        }
    }
}

fn test_fetch_client(transport: Option<Arc<dyn HttpTransport>>) -> FetchClient {
    let transport = transport.unwrap_or_else(|| Arc::new(OfflineTransport));
    FetchClient::new(transport, FetchOptions::no_retry())
}

/// Mount `view` inside the full provider stack.
///
/// Every call builds a new fetch cache, so nothing fetched in one render is
/// visible to the next.
pub async fn render_with_providers(
    view: Router,
    options: RenderOptions,
) -> Result<RenderResult, HarnessError> {
    let stack = ProviderStack::new(
        &options.route,
        test_fetch_client(options.transport),
        options.theme,
        options.user,
    );
    tracing::debug!(
        route = %options.route,
        theme = %options.theme,
        cache_id = %stack.fetch().id(),
        "Rendering with providers"
    );

    let base = BaseRenderOptions {
        location: options.route,
        wrapper: Some(stack.into_wrapper()),
        mount: options.base,
    };
    render(view, base).await
}

/// Mount `view` with navigation only
pub async fn render_with_router(view: Router, route: &str) -> Result<RenderResult, HarnessError> {
    let navigator = Navigator::new(route);
    let wrapper: Wrapper = Arc::new(move |view: Router| navigation::wrap(&navigator, view));
    let options = BaseRenderOptions {
        location: route.to_string(),
        wrapper: Some(wrapper),
        ..Default::default()
    };
    render(view, options).await
}

/// Mount `view` with a fresh fetch cache only
pub async fn render_with_fetch(
    view: Router,
    transport: Arc<dyn HttpTransport>,
) -> Result<RenderResult, HarnessError> {
    let fetch = test_fetch_client(Some(transport));
    let wrapper: Wrapper = Arc::new(move |view: Router| view.layer(Extension(fetch.clone())));
    let options = BaseRenderOptions {
        wrapper: Some(wrapper),
        ..Default::default()
    };
    render(view, options).await
}
