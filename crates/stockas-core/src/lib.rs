//! Session and token lifecycle for the stockas inventory API.
//!
//! The crate keeps an access/refresh token pair in an expiring store,
//! inspects access-token expiry locally, renews the pair proactively or after
//! a 401, and routes to sign-in when the session cannot be recovered.

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;
pub mod navigation;
pub mod session;

pub use api::{ApiClient, ApiError, RequestOptions, UserProfile};
pub use auth::{AuthError, CredentialPair, CredentialStore, RefreshCoordinator};
pub use config::{Config, RouteConfig, StorageKind};
pub use guard::{GuardDecision, SessionGuard};
pub use navigation::{NavigationLog, Navigator, TracingNavigator};
pub use session::SessionContext;
