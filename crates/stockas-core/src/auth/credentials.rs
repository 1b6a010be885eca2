use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::{MemoryStorage, SessionStorage};

/// Storage name of the access token
pub const ACCESS_TOKEN_KEY: &str = "token";

/// Storage name of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Access tokens are kept for at most one day regardless of their `exp` claim.
const ACCESS_TOKEN_RETENTION_DAYS: i64 = 1;

/// Refresh tokens are kept for at most seven days.
const REFRESH_TOKEN_RETENTION_DAYS: i64 = 7;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Token values stay out of logs and panic messages
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &format_args!("<{} chars>", self.access_token.len()))
            .field("refresh_token", &format_args!("<{} chars>", self.refresh_token.len()))
            .finish()
    }
}

/// Process-wide holder of the current credential pair.
/// Clone is cheap; clones share the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn SessionStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Store backed by process memory, for tests and throwaway sessions
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Persist both tokens. The refresh token goes first so a concurrent
    /// reader never finds a fresh access token without its refresh token.
    /// A partial write is rolled back by clearing both values.
    pub fn save(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let result = self
            .storage
            .write(
                REFRESH_TOKEN_KEY,
                refresh_token,
                Duration::days(REFRESH_TOKEN_RETENTION_DAYS),
            )
            .and_then(|_| {
                self.storage.write(
                    ACCESS_TOKEN_KEY,
                    access_token,
                    Duration::days(ACCESS_TOKEN_RETENTION_DAYS),
                )
            });

        match result {
            Ok(()) => {
                debug!(access_len = access_token.len(), "Credential pair saved");
                Ok(())
            }
            Err(e) => {
                self.clear();
                Err(e)
            }
        }
    }

    pub fn save_pair(&self, pair: &CredentialPair) -> Result<()> {
        self.save(&pair.access_token, &pair.refresh_token)
    }

    /// Both tokens, or `None` if either one is missing or past retention.
    pub fn get(&self) -> Option<CredentialPair> {
        let refresh_token = self.refresh_token()?;
        let access_token = self.access_token()?;
        Some(CredentialPair {
            access_token,
            refresh_token,
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.read_value(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read_value(REFRESH_TOKEN_KEY)
    }

    /// Remove both tokens. Safe to call repeatedly.
    pub fn clear(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.storage.remove_entry(key) {
                warn!(error = %e, key, "Failed to remove session value");
            }
        }
        debug!("Credential store cleared");
    }

    fn read_value(&self, key: &str) -> Option<String> {
        match self.storage.read(key) {
            Ok(entry) => entry.map(|e| e.value),
            Err(e) => {
                warn!(error = %e, key, "Failed to read session value");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_get() {
        let store = CredentialStore::in_memory();
        store.save("access", "refresh").unwrap();

        let pair = store.get().expect("pair should be stored");
        assert_eq!(pair, CredentialPair::new("access", "refresh"));
    }

    #[test]
    fn test_clear_then_get_is_absent() {
        let store = CredentialStore::in_memory();
        store.save("access", "refresh").unwrap();

        store.clear();
        assert!(store.get().is_none());
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());

        // Idempotent
        store.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_get_requires_both_tokens() {
        let storage = Arc::new(MemoryStorage::new());
        let store = CredentialStore::new(storage.clone());

        storage
            .write(REFRESH_TOKEN_KEY, "refresh", Duration::days(7))
            .unwrap();
        assert!(store.get().is_none());
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn test_expired_access_token_leaves_refresh_token() {
        let storage = Arc::new(MemoryStorage::new());
        let store = CredentialStore::new(storage.clone());
        store.save("access", "refresh").unwrap();

        // Simulate the one-day retention lapsing
        storage
            .write(ACCESS_TOKEN_KEY, "access", Duration::seconds(-1))
            .unwrap();

        assert!(store.get().is_none());
        assert!(store.access_token().is_none());
        assert_eq!(store.refresh_token().as_deref(), Some("refresh"));
    }

    #[test]
    fn test_retention_windows() {
        let storage = Arc::new(MemoryStorage::new());
        let store = CredentialStore::new(storage.clone());
        store.save("access", "refresh").unwrap();

        let access = storage.load_entry(ACCESS_TOKEN_KEY).unwrap().unwrap();
        let refresh = storage.load_entry(REFRESH_TOKEN_KEY).unwrap().unwrap();
        let gap = refresh.expires_at - access.expires_at;
        assert!((gap - Duration::days(6)).num_seconds().abs() < 5);
    }

    #[test]
    fn test_clones_share_state() {
        let store = CredentialStore::in_memory();
        let other = store.clone();
        store.save("access", "refresh").unwrap();
        assert!(other.get().is_some());
        other.clear();
        assert!(store.get().is_none());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let pair = CredentialPair::new("secret-access", "secret-refresh");
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("13 chars"));
    }
}
