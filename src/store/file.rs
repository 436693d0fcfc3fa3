use fd_lock::RwLock as FileLock;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};

use super::{StoreError, WorkflowStore};

/// File-backed store holding every entry in one JSON object.
///
/// Each mutation re-reads the file, applies the change and rewrites it
/// through a temporary file and a rename, holding an exclusive lock on
/// `<file>.lock` throughout. Reads are served from memory until `reload`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store at `path`.
    ///
    /// A corrupt file opens as an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let entries = read_entries(&path)?;
        info!(file = ?path, entries = entries.len(), "Workflow store opened");

        let lock_path = PathBuf::from(format!("{}.lock", path.display()));
        Ok(Self {
            path,
            lock_path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_file(&self) -> Result<FileLock<std::fs::File>, StoreError> {
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        Ok(FileLock::new(lock_file))
    }

    /// Read-modify-write of the file under the exclusive lock
    fn persist<F>(&self, entries: &mut BTreeMap<String, String>, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut lock = self.lock_file()?;
        let _guard = lock.write()?;

        *entries = read_entries(&self.path)?;
        f(entries);

        let serialized = serde_json::to_string_pretty(&*entries)?;
        let temp_file = format!("{}.tmp", self.path.display());
        fs::write(&temp_file, serialized)?;
        fs::rename(&temp_file, &self.path)?;
        Ok(())
    }

    fn mutate<F>(&self, key_hint: &str, f: F)
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(key = %key_hint, error = %e, "Store lock poisoned; write dropped");
                return;
            }
        };
        if let Err(e) = self.persist(&mut entries, f) {
            warn!(
                key = %key_hint,
                file = ?self.path,
                error = %e,
                "Failed to persist workflow store"
            );
        }
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
    if !path.exists() {
        debug!(file = ?path, "No workflow store file found");
        return Ok(BTreeMap::new());
    }
    let contents = fs::read_to_string(path)?;
    match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            warn!(file = ?path, error = %e, "Workflow store file is corrupt, starting empty");
            Ok(BTreeMap::new())
        }
    }
}

impl WorkflowStore for FileStore {
    fn set_raw(&self, key: &str, value: String) {
        self.mutate(key, |entries| {
            entries.insert(key.to_string(), value);
        });
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn remove(&self, key: &str) {
        self.mutate(key, |entries| {
            entries.remove(key);
        });
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_all(&self) {
        self.mutate("*", |entries| entries.clear());
    }

    fn clear_subset(&self, keys: &[&str]) {
        self.mutate("subset", |entries| {
            for key in keys {
                entries.remove(*key);
            }
        });
    }

    fn reload(&self) {
        match read_entries(&self.path) {
            Ok(fresh) => {
                if let Ok(mut entries) = self.entries.write() {
                    *entries = fresh;
                }
            }
            Err(e) => warn!(file = ?self.path, error = %e, "Failed to reload workflow store"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("workflow.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.set("claimResponse", &json!({"resourceType": "ClaimResponse"}));
            store.set_string("selectedPatientId", "101");
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("claimResponse"),
            Some(json!({"resourceType": "ClaimResponse"}))
        );
        assert_eq!(reopened.get_string("selectedPatientId").as_deref(), Some("101"));
    }

    #[test]
    fn test_corrupt_file_opens_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("workflow.json");
        std::fs::write(&path, "not-json").unwrap();

        let store = FileStore::open(&path).unwrap();
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_clear_subset_is_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("workflow.json");

        let store = FileStore::open(&path).unwrap();
        store.set_string("loggedUser", "dr-who");
        store.set_string("timestamp", "2025-03-02T00:00:00Z");
        store.clear_subset(&["timestamp"]);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get_string("timestamp"), None);
        assert_eq!(reopened.get_string("loggedUser").as_deref(), Some("dr-who"));
    }

    #[test]
    fn test_two_handles_do_not_clobber_each_other() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("workflow.json");

        let first = FileStore::open(&path).unwrap();
        let second = FileStore::open(&path).unwrap();
        first.set_string("timestamp", "t1");
        second.set_string("selectedPatientId", "101");

        assert_eq!(first.get_string("selectedPatientId"), None);
        first.reload();
        assert_eq!(first.get_string("selectedPatientId").as_deref(), Some("101"));
        assert_eq!(second.get_string("timestamp").as_deref(), Some("t1"));
    }
}
