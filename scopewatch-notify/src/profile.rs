//! Persisted key/value profile store
//!
//! The application owns the real user profile; this module only defines the
//! interface the notification client needs plus two implementations: a TOML
//! file (one table per owning component) and an in-memory map.

use crate::error::{NotifyError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

type Tables = BTreeMap<String, BTreeMap<String, ProfileValue>>;

/// Key/value storage scoped per owning component.
pub trait ProfileStore: Send + Sync {
    fn get(&self, scope: &str, key: &str) -> Option<ProfileValue>;

    /// Store a value. Writes are synchronous; the last write wins.
    fn set(&self, scope: &str, key: &str, value: ProfileValue) -> Result<()>;

    fn get_int(&self, scope: &str, key: &str, default: i64) -> i64 {
        match self.get(scope, key) {
            Some(ProfileValue::Int(v)) => v,
            _ => default,
        }
    }

    fn get_string(&self, scope: &str, key: &str, default: &str) -> String {
        match self.get(scope, key) {
            Some(ProfileValue::Str(v)) => v,
            _ => default.to_string(),
        }
    }

    fn get_bool(&self, scope: &str, key: &str, default: bool) -> bool {
        match self.get(scope, key) {
            Some(ProfileValue::Bool(v)) => v,
            _ => default,
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    tables: Mutex<Tables>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(&self, scope: &str, key: &str) -> Option<ProfileValue> {
        self.tables.lock().get(scope).and_then(|t| t.get(key)).cloned()
    }

    fn set(&self, scope: &str, key: &str, value: ProfileValue) -> Result<()> {
        self.tables
            .lock()
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

/// Profile persisted as a TOML document, rewritten on every `set`.
#[derive(Debug)]
pub struct TomlProfileStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl TomlProfileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| NotifyError::Storage(format!("read {}: {}", path.display(), e)))?;
            toml::from_str(&content)
                .map_err(|e| NotifyError::Storage(format!("parse {}: {}", path.display(), e)))?
        } else {
            Tables::new()
        };

        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, tables: &Tables) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| NotifyError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        let content = toml::to_string_pretty(tables).map_err(|e| NotifyError::Storage(e.to_string()))?;
        std::fs::write(&self.path, content)
            .map_err(|e| NotifyError::Storage(format!("write {}: {}", self.path.display(), e)))
    }
}

impl ProfileStore for TomlProfileStore {
    fn get(&self, scope: &str, key: &str) -> Option<ProfileValue> {
        self.tables.lock().get(scope).and_then(|t| t.get(key)).cloned()
    }

    fn set(&self, scope: &str, key: &str, value: ProfileValue) -> Result<()> {
        let mut tables = self.tables.lock();
        tables
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self.write(&tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_defaults() {
        let store = MemoryProfileStore::new();
        assert_eq!(store.get_int("auth", "system_id", -1), -1);
        assert_eq!(store.get_string("auth", "auth_key", "none"), "none");
        assert!(!store.get_bool("notifications", "enabled", false));

        // Wrong type falls back to the default.
        store.set("auth", "system_id", ProfileValue::Str("x".into())).unwrap();
        assert_eq!(store.get_int("auth", "system_id", -1), -1);
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = MemoryProfileStore::new();
        store.set("auth", "enabled", ProfileValue::Bool(true)).unwrap();
        assert!(store.get_bool("auth", "enabled", false));
        assert!(!store.get_bool("notifications", "enabled", false));
    }

    #[test]
    fn test_toml_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile").join("profile.toml");

        {
            let store = TomlProfileStore::open(&path).unwrap();
            store.set("auth", "system_id", ProfileValue::Int(42)).unwrap();
            store.set("auth", "auth_key", ProfileValue::Str("k3y".into())).unwrap();
            store.set("notifications", "enabled", ProfileValue::Bool(true)).unwrap();
        }

        let reopened = TomlProfileStore::open(&path).unwrap();
        assert_eq!(reopened.get_int("auth", "system_id", -1), 42);
        assert_eq!(reopened.get_string("auth", "auth_key", ""), "k3y");
        assert!(reopened.get_bool("notifications", "enabled", false));
    }

    #[test]
    fn test_toml_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.toml");
        std::fs::write(&path, "this is [not toml").unwrap();
        assert!(matches!(TomlProfileStore::open(&path), Err(NotifyError::Storage(_))));
    }
}
