//! Authentication provider
//!
//! Holds the signed-in user for one render. Login and logout go through the
//! fetch client installed by the enclosing fetch cache provider.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::{self, Next},
    Router,
};
use mockwire_server::ApiRequest;
use serde::Serialize;

use crate::error::HarnessError;
use crate::factories::User;
use crate::fetch::FetchClient;

pub const LOGIN_PATH: &str = "/api/auth/login";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Clone)]
pub struct AuthContext {
    user: Arc<RwLock<Option<User>>>,
    fetch: Option<FetchClient>,
}

impl AuthContext {
    pub fn new(user: Option<User>) -> Self {
        Self {
            user: Arc::new(RwLock::new(user)),
            fetch: None,
        }
    }

    pub fn user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Post credentials to the login endpoint; a 2xx body is the user
    pub async fn login(&self, email: &str, password: &str) -> Result<User, HarnessError> {
        let fetch = self.fetch_client()?;
        let request = ApiRequest::post(LOGIN_PATH).json(&LoginRequest { email, password })?;
        let response = fetch.mutate(request).await?;
        if !response.is_success() {
            tracing::warn!(email, status = %response.status, "Login rejected");
            return Err(HarnessError::Status(response.status));
        }

        let user: User = response.body_as()?;
        tracing::info!(user_id = user.id, "Logged in");
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user.clone());
        Ok(user)
    }

    /// Forget the user and everything fetched on their behalf
    pub fn logout(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
        if let Some(fetch) = &self.fetch {
            fetch.clear();
        }
        tracing::info!("Logged out");
    }

    fn fetch_client(&self) -> Result<&FetchClient, HarnessError> {
        self.fetch.as_ref().ok_or(HarnessError::MissingProvider {
            context: "FetchClient",
            provider: "fetch cache provider",
        })
    }
}

/// Expose the auth context, bound to the fetch client of the enclosing
/// provider when there is one
pub(crate) fn wrap(context: &AuthContext, view: Router) -> Router {
    let context = context.clone();
    view.layer(middleware::from_fn(move |mut request: Request, next: Next| {
        let mut context = context.clone();
        async move {
            context.fetch = request.extensions().get::<FetchClient>().cloned();
            request.extensions_mut().insert(context);
            next.run(request).await
        }
    }))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = HarnessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(HarnessError::MissingProvider {
                context: "AuthContext",
                provider: "auth provider",
            })
    }
}
