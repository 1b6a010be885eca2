//! Application configuration management.
//!
//! This module handles loading and saving the configuration: the API base
//! URL, refresh thresholds, route tables and the session storage backend.
//!
//! Configuration is stored at `~/.config/stockas/config.json`; selected
//! fields can be overridden from the environment.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "stockas";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_BASE_URL: &str = "https://stockas.azurewebsites.net/api";

/// Hard ceiling on the length of a bearer token before it is attached to a header.
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 4096;

const ENV_API_BASE_URL: &str = "STOCKAS_API_BASE_URL";
const ENV_STORAGE: &str = "STOCKAS_STORAGE";
const ENV_REFRESH_THRESHOLD_SECS: &str = "STOCKAS_REFRESH_THRESHOLD_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::str::FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

/// Routes the session guard and the gateway navigate between.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub sign_in: String,
    pub landing: String,
    pub auth_pages: Vec<String>,
    pub protected_prefixes: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            sign_in: "/login".to_string(),
            landing: "/dashboard".to_string(),
            auth_pages: vec!["/login".to_string(), "/register".to_string()],
            protected_prefixes: vec![
                "/dashboard".to_string(),
                "/transactions".to_string(),
                "/products".to_string(),
            ],
        }
    }
}

impl RouteConfig {
    pub fn is_auth_page(&self, pathname: &str) -> bool {
        self.auth_pages.iter().any(|page| page == pathname)
    }

    pub fn is_protected(&self, pathname: &str) -> bool {
        self.protected_prefixes
            .iter()
            .any(|prefix| pathname.starts_with(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub refresh_threshold_secs: u64,
    pub max_token_length: usize,
    pub request_timeout_secs: u64,
    pub profile_max_retries: u32,
    pub profile_retry_delay_ms: u64,
    pub storage: StorageKind,
    pub routes: RouteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            refresh_threshold_secs: 300,
            max_token_length: DEFAULT_MAX_TOKEN_LENGTH,
            request_timeout_secs: 30,
            profile_max_retries: 3,
            profile_retry_delay_ms: 1000,
            storage: StorageKind::File,
            routes: RouteConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    /// Load from disk, then apply environment overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Ok(raw) = std::env::var(ENV_STORAGE) {
            match raw.parse() {
                Ok(kind) => self.storage = kind,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_STORAGE),
            }
        }
        if let Ok(raw) = std::env::var(ENV_REFRESH_THRESHOLD_SECS) {
            match raw.trim().parse() {
                Ok(secs) => self.refresh_threshold_secs = secs,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_REFRESH_THRESHOLD_SECS),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn profile_retry_delay(&self) -> Duration {
        Duration::from_millis(self.profile_retry_delay_ms)
    }

    /// Filesystem- and keychain-safe name for the API origin, so sessions for
    /// different servers never share storage.
    pub fn origin_key(&self) -> Result<String> {
        let url = Url::parse(&self.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.api_base_url))?;
        let origin = url.origin().ascii_serialization();
        let key = origin
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
            .collect::<String>();
        Ok(key)
    }

    /// Per-origin directory for the file session backend
    pub fn session_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(self.origin_key()?))
    }

    /// Directory for log files
    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join("logs"))
    }

    pub fn build_storage(&self) -> Result<Arc<dyn SessionStorage>> {
        let storage: Arc<dyn SessionStorage> = match self.storage {
            StorageKind::File => Arc::new(FileStorage::new(self.session_dir()?)),
            StorageKind::Keyring => Arc::new(KeyringStorage::new(self.origin_key()?)),
            StorageKind::Memory => Arc::new(MemoryStorage::new()),
        };
        Ok(storage)
    }
}
