//! Base handler set
//!
//! Handlers installed when the server is constructed. Per-case overrides
//! shadow these and are discarded on reset.

pub mod users;

use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::registry::Handler;

/// Error body returned with non-2xx simulations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// The base handler set for the `users` resource
pub fn default_handlers() -> Result<Vec<Handler>, PatternError> {
    users::handlers()
}
