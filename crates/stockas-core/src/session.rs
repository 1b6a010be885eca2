use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::api::ApiClient;
use crate::auth::{CredentialStore, SessionStorage};
use crate::config::Config;
use crate::guard::SessionGuard;
use crate::navigation::Navigator;

/// The store, gateway and guard wired together over one storage backend.
pub struct SessionContext {
    pub config: Config,
    pub store: CredentialStore,
    pub api: ApiClient,
    pub guard: SessionGuard,
}

impl SessionContext {
    pub fn new(config: Config, storage: Arc<dyn SessionStorage>, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let store = CredentialStore::new(storage);
        let api = ApiClient::new(&config, store.clone(), navigator)?;
        let guard = SessionGuard::new(api.clone(), config.routes.clone());

        Ok(Self {
            config,
            store,
            api,
            guard,
        })
    }

    /// Build with the storage backend the configuration names
    pub fn from_config(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let storage = config.build_storage()?;
        debug!(storage = ?config.storage, base_url = %config.api_base_url, "Session context created");
        Self::new(config, storage, navigator)
    }
}
