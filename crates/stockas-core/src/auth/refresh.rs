//! Refresh-token exchange.
//!
//! `POST {base}/auth/refresh` with `{ accessToken, refreshToken }` and expect
//! `{ token, refreshToken }` back. On any failure the credential store is
//! cleared before the error is returned, so a failed refresh never leaves a
//! stale session behind. There is no internal retry.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{AuthError, CredentialPair, CredentialStore};

const REFRESH_PATH: &str = "/auth/refresh";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    // The current token may already be gone from storage; the server checks
    // pair affinity only when it is sent
    #[serde(skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl RefreshResponse {
    fn into_pair(self) -> Option<CredentialPair> {
        match (self.token, self.refresh_token) {
            (Some(token), Some(refresh)) if !token.is_empty() && !refresh.is_empty() => {
                Some(CredentialPair::new(token, refresh))
            }
            _ => None,
        }
    }
}

pub struct RefreshCoordinator {
    client: Client,
    refresh_url: String,
    store: CredentialStore,
    // One exchange at a time; see `refresh`
    in_flight: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(client: Client, api_base_url: &str, store: CredentialStore) -> Self {
        Self {
            client,
            refresh_url: format!("{}{}", api_base_url.trim_end_matches('/'), REFRESH_PATH),
            store,
            in_flight: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Trade the stored refresh token for a new pair.
    ///
    /// Concurrent callers are serialized. A caller that waited while another
    /// exchange rotated the refresh token gets the rotated pair instead of
    /// spending the new refresh token on a second exchange.
    pub async fn refresh(&self) -> Result<CredentialPair, AuthError> {
        let observed = self.store.refresh_token();
        let _guard = self.in_flight.lock().await;

        if let Some(pair) = self.store.get() {
            if observed.as_deref() != Some(pair.refresh_token.as_str()) {
                debug!("Session already refreshed by a concurrent caller");
                return Ok(pair);
            }
        }

        match self.exchange().await {
            Ok(pair) => {
                info!("Access token refreshed");
                Ok(pair)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                self.store.clear();
                Err(e)
            }
        }
    }

    async fn exchange(&self) -> Result<CredentialPair, AuthError> {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or(AuthError::NoRefreshToken)?;
        let access_token = self.store.access_token();

        let body = RefreshRequest {
            access_token: access_token.as_deref(),
            refresh_token: &refresh_token,
        };

        debug!(url = %self.refresh_url, has_access_token = access_token.is_some(), "Sending refresh request");
        let response = self.client.post(&self.refresh_url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
            });
        }

        let pair = response
            .json::<RefreshResponse>()
            .await
            .ok()
            .and_then(RefreshResponse::into_pair)
            .ok_or(AuthError::MalformedRefreshResponse)?;

        self.store.save_pair(&pair)?;
        Ok(pair)
    }
}
