//! Authentication module for the session and token lifecycle.
//!
//! This module provides:
//! - `CredentialStore`: the access/refresh token pair over a pluggable backend
//! - `token`: expiry inspection of access tokens without server contact
//! - `RefreshCoordinator`: the refresh-token exchange
//!
//! Access tokens are retained for 1 day and refresh tokens for 7 days by the
//! storage layer, independent of the tokens' own expiry claims.

pub mod credentials;
pub mod error;
pub mod refresh;
pub mod storage;
pub mod token;

pub use credentials::{CredentialPair, CredentialStore};
pub use error::AuthError;
pub use refresh::RefreshCoordinator;
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StoredEntry};
