//! Account endpoints: sign-in, registration, sign-out and the user profile.
//!
//! Sign-in and registration are unauthenticated and go straight to the
//! HTTP client; on success they seed the credential store. Sign-out and the
//! profile fetch are authenticated and pass through the gateway.

use reqwest::header;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::auth::{token, CredentialPair};

use super::client::RequestOptions;
use super::{ApiClient, ApiError};

/// Server message for an email that already has an account
const EMAIL_TAKEN_MESSAGE: &str = "Email sudah terdaftar";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthTokensResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

impl UserProfile {
    /// Accepts either a profile object or a list whose first element is one.
    fn from_json(data: &Value) -> Option<Self> {
        let profile = match data {
            Value::Array(items) => items.first()?,
            other => other,
        };
        let profile = profile.as_object()?;

        let text = |key: &str| {
            profile
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            name: text("name").unwrap_or_else(|| "User".to_string()),
            email: text("email").unwrap_or_default(),
        })
    }
}

/// True if a registration error body says the email is already registered.
fn is_email_taken(body: &Value) -> bool {
    let mentions = |v: Option<&Value>| match v {
        Some(Value::String(s)) => s.contains(EMAIL_TAKEN_MESSAGE),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|s| s.contains(EMAIL_TAKEN_MESSAGE)),
        _ => false,
    };

    let errors = body.get("errors");
    mentions(errors.and_then(|e| e.get("Email")))
        || mentions(errors.and_then(|e| e.get("email")))
        || mentions(body.get("message"))
}

impl ApiClient {
    /// Sign in and persist the returned token pair.
    pub async fn login(&self, email: &str, password: &str) -> Result<CredentialPair, ApiError> {
        let response = self
            .http()
            .post(self.endpoint("/auth/login"))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&LoginRequest { email, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Login rejected");
            return Err(match status.as_u16() {
                401 | 403 => ApiError::InvalidCredentials,
                429 => ApiError::RateLimited,
                500 => ApiError::ServerError("Please try again later".to_string()),
                other => ApiError::LoginFailed(other),
            });
        }

        let pair = self.store_auth_response(response).await?;
        info!("Signed in");
        Ok(pair)
    }

    /// Create an account and persist the returned token pair.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<CredentialPair, ApiError> {
        let response = self
            .http()
            .post(self.endpoint("/auth/register"))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&RegisterRequest { name, email, password })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<Value> = response.json().await.ok();
            warn!(status = %status, "Registration rejected");

            return Err(match body {
                Some(ref body) if is_email_taken(body) => ApiError::EmailAlreadyRegistered,
                Some(body) => ApiError::RegistrationFailed(
                    body.get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Please try again")
                        .to_string(),
                ),
                None => ApiError::RegistrationFailed("Please try again".to_string()),
            });
        }

        let pair = self.store_auth_response(response).await?;
        info!("Account registered");
        Ok(pair)
    }

    async fn store_auth_response(&self, response: reqwest::Response) -> Result<CredentialPair, ApiError> {
        let tokens: AuthTokensResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse auth response: {}", e)))?;

        let pair = match (tokens.token, tokens.refresh_token) {
            (Some(t), Some(r)) if !t.is_empty() && !r.is_empty() => CredentialPair::new(t, r),
            _ => {
                return Err(ApiError::InvalidResponse(
                    "Auth response is missing the token pair".to_string(),
                ))
            }
        };

        self.store()
            .save_pair(&pair)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to store credentials: {}", e)))?;
        Ok(pair)
    }

    /// Sign out on the server, then drop the local session.
    ///
    /// Returns `false` without touching local state when there is no session
    /// or the server refuses; the caller decides whether to clear anyway.
    pub async fn logout(&self) -> bool {
        if self.store().access_token().is_none() {
            return false;
        }

        match self.call("/auth/logout", RequestOptions::post()).await {
            Ok(response) if response.status().is_success() => {
                self.store().clear();
                info!("Signed out");
                true
            }
            Ok(response) => {
                warn!(status = %response.status(), "Logout rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "Logout failed");
                false
            }
        }
    }

    /// Fetch the signed-in user's profile, retrying transient failures.
    ///
    /// The user id comes from the access token's `sub` claim. Failures are
    /// retried up to the configured count with a fixed delay between
    /// attempts; an ended session is never retried.
    pub async fn fetch_user_profile(&self) -> Result<UserProfile, ApiError> {
        let policy = self.profile_retry();
        let mut attempt = 0;

        loop {
            let access_token = self.store().access_token().ok_or(ApiError::NotAuthenticated)?;
            let user_id = token::subject(&access_token).ok_or(ApiError::NotAuthenticated)?;

            let error = match self.fetch_profile_once(&user_id).await {
                Ok(profile) => return Ok(profile),
                Err(e) if e.is_session_ended() => return Err(e),
                Err(e) => e,
            };

            if attempt >= policy.max_retries {
                return Err(error);
            }
            attempt += 1;
            warn!(error = %error, attempt, max_retries = policy.max_retries, "Profile fetch failed, retrying");
            tokio::time::sleep(policy.delay).await;
        }
    }

    async fn fetch_profile_once(&self, user_id: &str) -> Result<UserProfile, ApiError> {
        let path = format!("/auth/profile/{}", user_id);
        let data: Value = self.get_json(&path).await?;
        debug!("Profile response received");
        UserProfile::from_json(&data)
            .ok_or_else(|| ApiError::InvalidResponse("Unexpected profile response shape".to_string()))
    }
}
