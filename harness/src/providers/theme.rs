//! Theme provider

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, Extension, Router};
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(format!("Invalid theme: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThemeContext {
    theme: Arc<RwLock<Theme>>,
}

impl ThemeContext {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme: Arc::new(RwLock::new(theme)),
        }
    }

    pub fn theme(&self) -> Theme {
        *self.theme.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self, theme: Theme) {
        *self.theme.write().unwrap_or_else(PoisonError::into_inner) = theme;
    }

    /// Flip the theme and return the new value
    pub fn toggle(&self) -> Theme {
        let mut theme = self.theme.write().unwrap_or_else(PoisonError::into_inner);
        *theme = theme.toggled();
        *theme
    }
}

pub(crate) fn wrap(context: &ThemeContext, view: Router) -> Router {
    view.layer(Extension(context.clone()))
}

#[async_trait]
impl<S> FromRequestParts<S> for ThemeContext
where
    S: Send + Sync,
{
    type Rejection = HarnessError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ThemeContext>()
            .cloned()
            .ok_or(HarnessError::MissingProvider {
                context: "ThemeContext",
                provider: "theme provider",
            })
    }
}
