//! REST API gateway for the stockas inventory service.
//!
//! This module provides the `ApiClient`, the single path for authenticated
//! calls, plus the account endpoints (sign-in, registration, sign-out,
//! profile) built on top of it.
//!
//! The API uses JWT bearer tokens renewed through `/auth/refresh`.

pub mod account;
pub mod client;
pub mod error;

pub use account::UserProfile;
pub use client::{ApiClient, RequestOptions, RetryPolicy};
pub use error::ApiError;
