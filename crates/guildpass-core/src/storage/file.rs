use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use super::{KeyValueStore, StorageError};

/// Session file name in the config directory
pub const SESSION_FILE: &str = "session.json";

/// Durable tier persisted as a flat JSON object on disk.
///
/// The file is re-read on every operation so that a second process writing the
/// same file is picked up; concurrent writers are last-writer-wins.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Store in `dir/session.json`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", self.path.display(), e)))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| StorageError::Corrupt(format!("{}: {}", self.path.display(), e)))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if entries.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)
                    .map_err(|e| StorageError::Io(format!("Failed to remove {}: {}", self.path.display(), e)))?;
                debug!(path = %self.path.display(), "Removed empty session file");
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StorageError::Io(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        std::fs::write(&self.path, contents)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("guildpass-test-{}-{}", name, std::process::id()))
            .join(SESSION_FILE)
    }

    #[test]
    fn test_persists_across_instances() {
        let path = temp_path("persist");
        let _ = std::fs::remove_file(&path);

        let store = FileStore::new(path.clone());
        store.set("refresh_token", "R1").unwrap();

        // A fresh instance sees the same data, as after a restart
        let reopened = FileStore::new(path.clone());
        assert_eq!(reopened.get("refresh_token").unwrap().as_deref(), Some("R1"));

        reopened.remove("refresh_token").unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let path = temp_path("missing");
        let _ = std::fs::remove_file(&path);

        let store = FileStore::new(path);
        assert_eq!(store.get("access_token").unwrap(), None);
        store.remove("access_token").unwrap();
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let path = temp_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(path.clone());
        assert!(matches!(store.get("user"), Err(StorageError::Corrupt(_))));

        let _ = std::fs::remove_file(&path);
    }
}
