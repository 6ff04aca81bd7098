//! mockwire test harness
//!
//! Mounts a view inside the providers the application installs (navigation,
//! fetch cache, theme, auth), with every request answered by an
//! interception server. Also carries entity factories and assertion
//! predicates shared across suites.

pub mod error;
pub mod factories;
pub mod fetch;
pub mod matchers;
pub mod providers;
pub mod render;
pub mod wait;

pub use error::HarnessError;
pub use factories::{
    create_mock_api_response, create_mock_product, create_mock_products, create_mock_user,
    create_mock_users, ApiEnvelope, EnvelopeOverrides, Product, ProductOverrides, Role, User,
    UserOverrides,
};
pub use fetch::{FetchClient, FetchOptions, OfflineTransport};
pub use matchers::{to_be_in_range, to_contain_object, to_have_exact_length, MatchResult};
pub use providers::{
    render_with_fetch, render_with_providers, render_with_router, AuthContext, Navigator,
    ProviderKind, ProviderStack, RenderOptions, Theme, ThemeContext,
};
pub use render::{render, BaseRenderOptions, CurrentLocation, MountOptions, RenderResult, Wrapper};
pub use wait::{wait_for, wait_for_removal, WaitOptions};
