//! Request gateway for the stockas REST API.
//!
//! Every authenticated call goes through [`ApiClient::call`], which:
//! 1. refreshes proactively when the access token is close to expiry,
//! 2. attaches the bearer token (refusing oversized values),
//! 3. sends the request with the cookie store enabled,
//! 4. on a 401, refreshes once and retries once,
//! 5. hands any other response back untouched.
//!
//! When the session cannot be recovered the store is cleared and the
//! navigator is sent to the sign-in route.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    Client, Method, Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::{token, AuthError, CredentialStore, RefreshCoordinator};
use crate::config::Config;
use crate::navigation::Navigator;

use super::ApiError;

/// A request that can be sent more than once. Kept as plain data so the
/// post-refresh retry is byte-for-byte the same request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Bounded retry settings for calls that tolerate transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

/// Clone is cheap - the reqwest client, store, coordinator and navigator are
/// all shared handles.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: CredentialStore,
    refresher: Arc<RefreshCoordinator>,
    navigator: Arc<dyn Navigator>,
    sign_in_route: String,
    refresh_threshold: Duration,
    max_token_length: usize,
    profile_retry: RetryPolicy,
}

impl ApiClient {
    /// Create a new API client sharing one connection pool with its refresh coordinator
    pub fn new(config: &Config, store: CredentialStore, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        let refresher = Arc::new(RefreshCoordinator::new(
            client.clone(),
            &config.api_base_url,
            store.clone(),
        ));

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            store,
            refresher,
            navigator,
            sign_in_route: config.routes.sign_in.clone(),
            refresh_threshold: config.refresh_threshold(),
            max_token_length: config.max_token_length,
            profile_retry: RetryPolicy {
                max_retries: config.profile_max_retries,
                delay: config.profile_retry_delay(),
            },
        })
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.refresher
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    pub(crate) fn profile_retry(&self) -> RetryPolicy {
        self.profile_retry
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// True when the stored access token decodes and has not expired.
    pub fn is_authenticated(&self) -> bool {
        self.store
            .access_token()
            .map(|t| token::is_valid(&t))
            .unwrap_or(false)
    }

    /// Run the proactive refresh step on its own, without navigating on failure.
    /// A failed refresh has already cleared the store.
    pub async fn ensure_fresh_session(&self) -> Result<(), AuthError> {
        let Some(access_token) = self.store.access_token() else {
            return Ok(());
        };

        if token::is_valid(&access_token)
            && token::is_near_expiry(&access_token, self.refresh_threshold)
        {
            info!("Access token close to expiry, refreshing before request");
            self.refresher.refresh().await?;
        }
        Ok(())
    }

    /// Clear credentials and send the user to sign-in. Safe to call repeatedly.
    pub fn end_session(&self) {
        self.store.clear();
        self.navigator.navigate(&self.sign_in_route);
    }

    /// Send an authenticated request through the refresh-and-retry cycle.
    ///
    /// Returns the raw response for any status the gateway does not handle
    /// itself; business-level error bodies are left to the caller.
    pub async fn call(&self, path: &str, options: RequestOptions) -> Result<Response, ApiError> {
        if let Err(e) = self.ensure_fresh_session().await {
            self.end_session();
            return Err(e.into());
        }

        let access_token = self.store.access_token();
        if let Some(ref t) = access_token {
            self.check_token_length(t)?;
        }

        let response = self.send(path, &options, access_token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(path, "Received 401, refreshing session and retrying once");
        let pair = match self.refresher.refresh().await {
            Ok(pair) => pair,
            Err(e) => {
                self.end_session();
                return Err(e.into());
            }
        };
        self.check_token_length(&pair.access_token)?;

        self.send(path, &options, Some(&pair.access_token)).await
    }

    /// Reject tokens that would poison the Authorization header.
    fn check_token_length(&self, access_token: &str) -> Result<(), ApiError> {
        let length = access_token.chars().count();
        if length > self.max_token_length {
            error!(length, limit = self.max_token_length, "Access token exceeds size limit");
            self.end_session();
            return Err(AuthError::OversizedToken {
                length,
                limit: self.max_token_length,
            }
            .into());
        }
        Ok(())
    }

    async fn send(
        &self,
        path: &str,
        options: &RequestOptions,
        access_token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.endpoint(path);

        let mut request = self
            .client
            .request(options.method.clone(), &url)
            .headers(options.headers.clone())
            .header(header::CONTENT_TYPE, "application/json");

        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        if let Some(t) = access_token {
            request = request.bearer_auth(t);
        }
        if let Some(ref body) = options.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, method = %options.method, path, "API request failed");
            ApiError::NetworkError(e)
        })?;

        debug!(method = %options.method, path, status = %response.status(), "API request completed");
        Ok(response)
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, ApiError> {
        let response = Self::check_response(response).await?;
        response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", path, e))
        })
    }

    // ===== Convenience wrappers =====

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.call(path, RequestOptions::get()).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        self.call(path, Self::with_body(RequestOptions::post(), body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response, ApiError> {
        self.call(path, Self::with_body(RequestOptions::put(), body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<Response, ApiError> {
        self.call(path, RequestOptions::delete()).await
    }

    /// GET and deserialize a successful JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.get(path).await?;
        Self::parse_json(path, response).await
    }

    /// Send a JSON body and deserialize a successful JSON response
    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let options = Self::with_body(RequestOptions::new(method), body)?;
        let response = self.call(path, options).await?;
        Self::parse_json(path, response).await
    }

    fn with_body<B: Serialize + ?Sized>(options: RequestOptions, body: &B) -> Result<RequestOptions, ApiError> {
        options
            .json(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to serialize request body: {}", e)))
    }
}
