//! Storage backends for persisted session values.
//!
//! Each value is written with its own retention window. A backend never hands
//! back a value whose window has passed; expired entries are purged on read,
//! so an abandoned refresh token disappears even if nobody clears it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Session file name inside the per-origin directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name; accounts are `<origin>:<value name>`
const KEYRING_SERVICE: &str = "stockas";

/// A persisted value together with the instant it stops being readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn new(value: impl Into<String>, retention: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at: Utc::now() + retention,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Backend for the credential store.
///
/// Implementors only move raw entries around; retention is enforced by the
/// provided [`read`](SessionStorage::read) method.
pub trait SessionStorage: Send + Sync {
    fn load_entry(&self, name: &str) -> Result<Option<StoredEntry>>;

    fn store_entry(&self, name: &str, entry: StoredEntry) -> Result<()>;

    /// Removing a missing entry is not an error.
    fn remove_entry(&self, name: &str) -> Result<()>;

    /// Read a value, purging it if its retention window has passed.
    fn read(&self, name: &str) -> Result<Option<StoredEntry>> {
        match self.load_entry(name)? {
            Some(entry) if entry.is_expired() => {
                debug!(key = name, expired_at = %entry.expires_at, "Purging expired session value");
                self.remove_entry(name)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn write(&self, name: &str, value: &str, retention: Duration) -> Result<()> {
        self.store_entry(name, StoredEntry::new(value, retention))
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredEntry>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("Session storage lock poisoned"))
    }
}

impl SessionStorage for MemoryStorage {
    fn load_entry(&self, name: &str) -> Result<Option<StoredEntry>> {
        Ok(self.lock()?.get(name).cloned())
    }

    fn store_entry(&self, name: &str, entry: StoredEntry) -> Result<()> {
        self.lock()?.insert(name.to_string(), entry);
        Ok(())
    }

    fn remove_entry(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

// ============================================================================
// File backend
// ============================================================================

/// All values for one origin live in a single JSON document.
pub struct FileStorage {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    /// Load every entry. An unparseable document is deleted and treated as
    /// empty, so a damaged file cannot block sign-in.
    fn load_all(&self) -> Result<HashMap<String, StoredEntry>> {
        let path = self.path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Discarding unreadable session file");
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e).context("Failed to remove unreadable session file"),
                }
                Ok(HashMap::new())
            }
        }
    }

    fn save_all(&self, entries: &HashMap<String, StoredEntry>) -> Result<()> {
        let path = self.path();
        if entries.is_empty() {
            if path.exists() {
                std::fs::remove_file(&path).context("Failed to remove session file")?;
            }
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).context("Failed to create session directory")?;
        let contents = serde_json::to_string_pretty(entries)?;

        // Write to a sibling file and rename so readers never see a torn document
        let tmp = self.dir.join(format!("{}.tmp", SESSION_FILE));
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &path).context("Failed to replace session file")?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, StoredEntry>),
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("Session file lock poisoned"))?;
        let mut entries = self.load_all()?;
        f(&mut entries);
        self.save_all(&entries)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("Failed to restrict session file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

impl SessionStorage for FileStorage {
    fn load_entry(&self, name: &str) -> Result<Option<StoredEntry>> {
        Ok(self.load_all()?.remove(name))
    }

    fn store_entry(&self, name: &str, entry: StoredEntry) -> Result<()> {
        self.modify(|entries| {
            entries.insert(name.to_string(), entry);
        })
    }

    fn remove_entry(&self, name: &str) -> Result<()> {
        self.modify(|entries| {
            entries.remove(name);
        })
    }
}

// ============================================================================
// Keychain backend
// ============================================================================

/// OS keychain storage. The keychain has no notion of expiry, so each entry
/// holds the serialized [`StoredEntry`] and retention is checked on read.
///
/// Entries are created once per value name and reused.
pub struct KeyringStorage {
    origin: String,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl KeyringStorage {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, name: &str) -> Result<Arc<Entry>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Keyring entry cache lock poisoned"))?;
        if let Some(entry) = entries.get(name) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(
            Entry::new(KEYRING_SERVICE, &format!("{}:{}", self.origin, name))
                .context("Failed to create keyring entry")?,
        );
        entries.insert(name.to_string(), Arc::clone(&entry));
        Ok(entry)
    }
}

impl SessionStorage for KeyringStorage {
    fn load_entry(&self, name: &str) -> Result<Option<StoredEntry>> {
        match self.entry(name)?.get_password() {
            Ok(raw) => {
                let entry = serde_json::from_str(&raw)
                    .context("Failed to parse keychain session value")?;
                Ok(Some(entry))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session value from keychain"),
        }
    }

    fn store_entry(&self, name: &str, entry: StoredEntry) -> Result<()> {
        let raw = serde_json::to_string(&entry)?;
        self.entry(name)?
            .set_password(&raw)
            .context("Failed to store session value in keychain")
    }

    fn remove_entry(&self, name: &str) -> Result<()> {
        match self.entry(name)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session value from keychain"),
        }
    }
}
