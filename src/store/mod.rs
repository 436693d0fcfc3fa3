// Persistent workflow store
//
// Key-value storage for workflow artifacts that outlives any single workflow
// instance. Injected into the tracker, orchestrator and navigator so tests can
// swap the file-backed store for the in-memory one.

pub mod file;
pub mod keys;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

pub use file::FileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Durable key-value storage of workflow artifacts.
///
/// Writes never fail from the caller's point of view and reads treat
/// malformed entries as absent.
pub trait WorkflowStore: Send + Sync {
    /// Store an already-serialized value
    fn set_raw(&self, key: &str, value: String);

    /// Fetch the serialized value stored under `key`
    fn get_raw(&self, key: &str) -> Option<String>;

    fn remove(&self, key: &str);

    fn keys(&self) -> Vec<String>;

    /// Remove every key (logout / session invalidation)
    fn clear_all(&self);

    /// Serialize `value` and store it under `key`, overwriting any prior value
    fn set(&self, key: &str, value: &Value) {
        match serde_json::to_string(value) {
            Ok(serialized) => self.set_raw(key, serialized),
            Err(e) => warn!(key = %key, error = %e, "Failed to serialize store value"),
        }
    }

    /// Deserialized value, or `None` when absent or malformed
    fn get(&self, key: &str) -> Option<Value> {
        let raw = self.get_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = %key, error = %e, "Ignoring malformed store entry");
                None
            }
        }
    }

    fn set_string(&self, key: &str, value: &str) {
        self.set(key, &Value::String(value.to_string()));
    }

    fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Remove a named group of keys, leaving everything else in place
    fn clear_subset(&self, keys: &[&str]) {
        for key in keys {
            self.remove(key);
        }
    }

    /// Pick up writes made by other handles to the same backing storage
    fn reload(&self) {}
}

/// Load a typed value, treating decode failures like absent entries
pub fn load<T: DeserializeOwned>(store: &dyn WorkflowStore, key: &str) -> Option<T> {
    let value = store.get(key)?;
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(e) => {
            debug!(key = %key, error = %e, "Stored value has unexpected shape");
            None
        }
    }
}

/// Store a typed value
pub fn save<T: Serialize>(store: &dyn WorkflowStore, key: &str, value: &T) {
    match serde_json::to_value(value) {
        Ok(json) => store.set(key, &json),
        Err(e) => warn!(key = %key, error = %e, "Failed to serialize store value"),
    }
}

/// In-memory store, used for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkflowStore for MemoryStore {
    fn set_raw(&self, key: &str, value: String) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), value);
            }
            Err(e) => warn!(key = %key, error = %e, "Store lock poisoned; write dropped"),
        }
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_all(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}
