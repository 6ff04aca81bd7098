//! Handler registry
//!
//! Holds the base handler set and the per-case overrides. Resolution scans
//! overrides newest-first, then the base set in registration order.

use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::error::PatternError;
use crate::pattern::{PathParams, PathPattern};
use crate::transport::{ApiRequest, Reply};

/// What a responder sees for a matched request
pub struct ResolverContext<'a> {
    pub request: &'a ApiRequest,
    pub params: &'a PathParams,
}

/// Response-producing function
pub type Responder = Arc<dyn Fn(&ResolverContext<'_>) -> Reply + Send + Sync>;

/// Which methods a handler answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodFilter {
    Any,
    Only(Method),
}

impl MethodFilter {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            MethodFilter::Any => true,
            MethodFilter::Only(m) => m == method,
        }
    }
}

impl fmt::Display for MethodFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodFilter::Any => write!(f, "*"),
            MethodFilter::Only(m) => write!(f, "{}", m),
        }
    }
}

/// A registered (method, pattern, responder) triple
#[derive(Clone)]
pub struct Handler {
    method: MethodFilter,
    pattern: PathPattern,
    responder: Responder,
}

impl Handler {
    pub fn new<F>(method: MethodFilter, pattern: &str, responder: F) -> Result<Self, PatternError>
    where
        F: Fn(&ResolverContext<'_>) -> Reply + Send + Sync + 'static,
    {
        Ok(Self {
            method,
            pattern: PathPattern::parse(pattern)?,
            responder: Arc::new(responder),
        })
    }

    pub fn get<F>(pattern: &str, responder: F) -> Result<Self, PatternError>
    where
        F: Fn(&ResolverContext<'_>) -> Reply + Send + Sync + 'static,
    {
        Self::new(MethodFilter::Only(Method::GET), pattern, responder)
    }

    pub fn post<F>(pattern: &str, responder: F) -> Result<Self, PatternError>
    where
        F: Fn(&ResolverContext<'_>) -> Reply + Send + Sync + 'static,
    {
        Self::new(MethodFilter::Only(Method::POST), pattern, responder)
    }

    pub fn put<F>(pattern: &str, responder: F) -> Result<Self, PatternError>
    where
        F: Fn(&ResolverContext<'_>) -> Reply + Send + Sync + 'static,
    {
        Self::new(MethodFilter::Only(Method::PUT), pattern, responder)
    }

    pub fn patch<F>(pattern: &str, responder: F) -> Result<Self, PatternError>
    where
        F: Fn(&ResolverContext<'_>) -> Reply + Send + Sync + 'static,
    {
        Self::new(MethodFilter::Only(Method::PATCH), pattern, responder)
    }

    pub fn delete<F>(pattern: &str, responder: F) -> Result<Self, PatternError>
    where
        F: Fn(&ResolverContext<'_>) -> Reply + Send + Sync + 'static,
    {
        Self::new(MethodFilter::Only(Method::DELETE), pattern, responder)
    }

    /// Answer every method on the pattern
    pub fn all<F>(pattern: &str, responder: F) -> Result<Self, PatternError>
    where
        F: Fn(&ResolverContext<'_>) -> Reply + Send + Sync + 'static,
    {
        Self::new(MethodFilter::Any, pattern, responder)
    }

    pub fn method(&self) -> &MethodFilter {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn responder(&self) -> Responder {
        Arc::clone(&self.responder)
    }

    /// Structural match: method equality plus path pattern
    pub fn matches(&self, method: &Method, path: &str) -> Option<PathParams> {
        if !self.method.allows(method) {
            return None;
        }
        self.pattern.matches(path)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// Summary of a registered handler, in resolution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSummary {
    pub method: MethodFilter,
    pub pattern: String,
    pub is_override: bool,
}

/// A handler selected for a request
pub struct Resolved {
    pub responder: Responder,
    pub params: PathParams,
    pub pattern: String,
    pub is_override: bool,
}

#[derive(Debug, Default)]
pub struct HandlerRegistry {
    base: Vec<Handler>,
    overrides: Vec<Handler>,
}

impl HandlerRegistry {
    pub fn new(base: Vec<Handler>) -> Self {
        Self {
            base,
            overrides: Vec::new(),
        }
    }

    pub fn register_override(&mut self, handler: Handler) {
        self.overrides.push(handler);
    }

    /// Drop all overrides, returning how many were discarded
    pub fn reset_overrides(&mut self) -> usize {
        let count = self.overrides.len();
        self.overrides.clear();
        count
    }

    pub fn base_len(&self) -> usize {
        self.base.len()
    }

    pub fn override_len(&self) -> usize {
        self.overrides.len()
    }

    pub fn resolve(&self, method: &Method, path: &str) -> Option<Resolved> {
        let overrides = self.overrides.iter().rev().map(|h| (h, true));
        let base = self.base.iter().map(|h| (h, false));

        overrides.chain(base).find_map(|(handler, is_override)| {
            handler.matches(method, path).map(|params| Resolved {
                responder: handler.responder(),
                params,
                pattern: handler.pattern.as_str().to_string(),
                is_override,
            })
        })
    }

    pub fn summaries(&self) -> Vec<HandlerSummary> {
        let overrides = self.overrides.iter().rev().map(|h| (h, true));
        let base = self.base.iter().map(|h| (h, false));

        overrides
            .chain(base)
            .map(|(handler, is_override)| HandlerSummary {
                method: handler.method.clone(),
                pattern: handler.pattern.as_str().to_string(),
                is_override,
            })
            .collect()
    }
}
