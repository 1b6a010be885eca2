//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use stockas_core::{ApiClient, Config, CredentialStore, NavigationLog, RouteConfig, SessionGuard};
use wiremock::MockServer;

/// Build an unsigned JWT-shaped token expiring `exp_offset_secs` from now.
pub fn make_token(exp_offset_secs: i64, sub: &str) -> String {
    let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::json!({"exp": exp, "sub": sub}).to_string());
    let signature = URL_SAFE_NO_PAD.encode("fake-signature");
    format!("{}.{}.{}", header, payload, signature)
}

pub fn test_config(server: &MockServer) -> Config {
    Config {
        api_base_url: server.uri(),
        request_timeout_secs: 5,
        profile_max_retries: 2,
        profile_retry_delay_ms: 10,
        ..Config::default()
    }
}

pub struct Harness {
    pub api: ApiClient,
    pub store: CredentialStore,
    pub navigation: NavigationLog,
}

impl Harness {
    pub fn new(server: &MockServer) -> Self {
        Self::with_parts(test_config(server), CredentialStore::in_memory())
    }

    pub fn with_parts(config: Config, store: CredentialStore) -> Self {
        let navigation = NavigationLog::new();
        let api = ApiClient::new(&config, store.clone(), Arc::new(navigation.clone()))
            .expect("client should build");
        Self {
            api,
            store,
            navigation,
        }
    }

    pub fn guard(&self) -> SessionGuard {
        SessionGuard::new(self.api.clone(), RouteConfig::default())
    }
}
