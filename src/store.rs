//! Key-value persistence and the credential/progress adapter on top of it.
//!
//! [`LocalStore`] is the raw string store (in-memory or a JSON file).
//! [`CredentialStore`] knows which keys hold the saved credential, the
//! processed-artist list and the acting user, and never lets a store failure
//! escape: reads fall back to empty, writes are logged and dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use crate::error::StoreError;
use crate::state_machine::Credential;

/// String key-value storage with get/set/remove and key enumeration.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Process-local store, used when embedding and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }
}

/// Store backed by a single JSON object on disk.
///
/// The file is re-read on every access so values written by another process
/// (for example a token dropped in while polling) are picked up.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        mutate(&mut entries);
        self.write_all(&entries)
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.read_all()?.into_keys().collect())
    }
}

/// Names of the keys the adapter reads and writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreKeys {
    /// Holds a previously captured credential.
    pub credential: String,
    /// Holds the JSON array of processed artist ids.
    pub processed: String,
    /// Keys starting with this prefix never name the acting user.
    pub anonymous_prefix: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            credential: "spotifyAccessToken".to_string(),
            processed: "spoderBlockedArtists".to_string(),
            anonymous_prefix: "anonymous:".to_string(),
        }
    }
}

/// Credential and progress persistence on top of a [`LocalStore`].
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn LocalStore>,
    keys: StoreKeys,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn LocalStore>, keys: StoreKeys) -> Self {
        Self { store, keys }
    }

    /// Saved credential, normalized to carry the scheme prefix.
    pub fn load_credential(&self) -> Option<Credential> {
        match self.store.get(&self.keys.credential) {
            Ok(Some(raw)) => Credential::from_stored(&raw),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stored credential");
                None
            }
        }
    }

    pub fn save_credential(&self, raw: &str) {
        if let Err(e) = self.store.set(&self.keys.credential, raw) {
            tracing::warn!(error = %e, "failed to save credential");
        }
    }

    pub fn clear_credential(&self) {
        if let Err(e) = self.store.remove(&self.keys.credential) {
            tracing::warn!(error = %e, "failed to remove stored credential");
        }
    }

    /// Persisted processed ids. Missing or unreadable state counts as empty.
    pub fn load_processed(&self) -> Vec<String> {
        let raw = match self.store.get(&self.keys.processed) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read processed list");
                return Vec::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "processed list is not a JSON string array");
                Vec::new()
            }
        }
    }

    pub fn save_processed(&self, ids: &BTreeSet<String>) {
        let encoded = match serde_json::to_string(ids) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode processed list");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.keys.processed, &encoded) {
            tracing::warn!(error = %e, "failed to save processed list");
        }
    }

    pub fn clear_processed(&self) {
        if let Err(e) = self.store.remove(&self.keys.processed) {
            tracing::warn!(error = %e, "failed to remove processed list");
        }
    }

    /// Acting user, taken from the first `"<user>:..."` key that is not anonymous.
    pub fn acting_user(&self) -> Option<String> {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "failed to enumerate store keys");
                return None;
            }
        };
        keys.iter()
            .find(|k| k.contains(':') && !k.starts_with(&self.keys.anonymous_prefix))
            .and_then(|k| k.split(':').next())
            .filter(|user| !user.is_empty())
            .map(str::to_string)
    }
}
