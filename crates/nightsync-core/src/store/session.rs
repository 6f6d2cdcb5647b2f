// ── Session storage ──
//
// String key/value store backing local preference documents. Backed by a
// single JSON file when a path is given, otherwise kept in memory for the
// lifetime of the process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::CoreError;

pub const SITE_CONFIG_KEY: &str = "siteconfig";
pub const EFFECT_CONFIG_KEY: &str = "effectconfig";
/// Older panels stored effect options under this key.
pub const LEGACY_EFFECT_CONFIG_KEY: &str = "config";

#[derive(Debug, Clone, Default)]
pub struct SessionStorage {
    inner: Arc<SessionInner>,
}

#[derive(Debug, Default)]
struct SessionInner {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl SessionStorage {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open (or lazily create) the storage file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| CoreError::Storage {
                    message: format!("{}: {e}", path.display()),
                })?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = entries.len(), "session storage opened");
        Ok(Self {
            inner: Arc::new(SessionInner {
                path: Some(path),
                entries: Mutex::new(entries),
            }),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: String) -> Result<(), CoreError> {
        let snapshot = {
            let mut entries = self.entries();
            entries.insert(key.to_owned(), value);
            entries.clone()
        };
        self.flush(&snapshot)
    }

    pub fn remove(&self, key: &str) -> Result<(), CoreError> {
        let snapshot = {
            let mut entries = self.entries();
            if entries.remove(key).is_none() {
                return Ok(());
            }
            entries.clone()
        };
        self.flush(&snapshot)
    }

    /// Decode the first of `keys` that holds valid JSON for `T`.
    pub fn load_json<T: DeserializeOwned>(&self, keys: &[&str]) -> Option<T> {
        keys.iter().find_map(|key| {
            let raw = self.get(key)?;
            match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "ignoring unreadable session entry");
                    None
                }
            }
        })
    }

    pub fn store_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CoreError> {
        self.set(key, serde_json::to_string(value)?)
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), CoreError> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn in_memory_round_trip() {
        let storage = SessionStorage::in_memory();
        storage.store_json(SITE_CONFIG_KEY, &json!({"a": 1})).unwrap();
        let value: Value = storage.load_json(&[SITE_CONFIG_KEY]).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let storage = SessionStorage::open(&path).unwrap();
        storage.set(EFFECT_CONFIG_KEY, "{}".into()).unwrap();
        drop(storage);

        let reopened = SessionStorage::open(&path).unwrap();
        assert_eq!(reopened.get(EFFECT_CONFIG_KEY).as_deref(), Some("{}"));
    }

    #[test]
    fn load_falls_back_to_legacy_key() {
        let storage = SessionStorage::in_memory();
        storage.set(LEGACY_EFFECT_CONFIG_KEY, r#"{"Fire":{}}"#.into()).unwrap();
        let value: Value = storage
            .load_json(&[EFFECT_CONFIG_KEY, LEGACY_EFFECT_CONFIG_KEY])
            .unwrap();
        assert!(value.get("Fire").is_some());
    }

    #[test]
    fn corrupt_entry_is_skipped() {
        let storage = SessionStorage::in_memory();
        storage.set(SITE_CONFIG_KEY, "{".into()).unwrap();
        assert!(storage.load_json::<Value>(&[SITE_CONFIG_KEY]).is_none());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SessionStorage::open(&path),
            Err(CoreError::Storage { .. })
        ));
    }
}
