//! mockwire interception server
//!
//! Answers outbound HTTP requests from a registered handler table so code under
//! test never touches a real network. Handlers are matched by method and path
//! pattern; per-case overrides shadow the base set until reset.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod intercept;
pub mod pattern;
pub mod registry;
pub mod transport;
pub mod wire;

pub use client::ReqwestTransport;
pub use config::{Config, InterceptConfig, InterceptMode};
pub use error::{FetchError, InterceptError, PatternError, TransportError};
pub use handlers::{default_handlers, ErrorEnvelope};
pub use intercept::{CaseGuard, InterceptServer, RecordedRequest, WeakInterceptServer};
pub use pattern::{PathParams, PathPattern};
pub use registry::{Handler, HandlerSummary, MethodFilter, Responder, ResolverContext};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Reply, RequestId};
