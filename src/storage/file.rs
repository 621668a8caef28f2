//! File-backed storage medium: one file per storage key.
//!
//! File names are `<normalized key>.<hex of key>.json`. The readable prefix is
//! lossy; the hex part keeps distinct keys in distinct files, also on
//! case-insensitive file systems.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::Storage;
use crate::error::{CacheError, Result};
use crate::utils::normalize_key;

/// Storage writing each blob to its own file under `dir`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the blob of `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(
            "{}.{}.json",
            normalize_key(key),
            hex::encode(key.as_bytes())
        ))
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> CacheError {
    CacheError::storage(format!("Failed to {} {}: {}", action, path.display(), e))
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error("read", &path, e)),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        // Replace atomically
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(|e| storage_error("write", &tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| storage_error("replace", &path, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("snapshots")).unwrap();

        assert_eq!(storage.read("cache:users").unwrap(), None);

        storage.write("cache:users", b"[]").unwrap();
        assert!(storage
            .dir()
            .join("cache-users.63616368653a7573657273.json")
            .exists());
        assert_eq!(storage.read("cache:users").unwrap(), Some(b"[]".to_vec()));

        storage.remove("cache:users").unwrap();
        assert_eq!(storage.read("cache:users").unwrap(), None);

        // Removing again is fine
        storage.remove("cache:users").unwrap();
    }

    #[test]
    fn test_keys_differing_in_case_get_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        storage.write("cache:User", b"upper").unwrap();
        storage.write("cache:user", b"lower").unwrap();
        storage.write("cache:Search Results", b"spaced").unwrap();
        storage.write("cache:search-results", b"dashed").unwrap();

        assert_ne!(storage.path_for("cache:User"), storage.path_for("cache:user"));
        assert_eq!(storage.read("cache:User").unwrap(), Some(b"upper".to_vec()));
        assert_eq!(storage.read("cache:user").unwrap(), Some(b"lower".to_vec()));
        assert_eq!(
            storage.read("cache:Search Results").unwrap(),
            Some(b"spaced".to_vec())
        );
        assert_eq!(
            storage.read("cache:search-results").unwrap(),
            Some(b"dashed".to_vec())
        );
    }

    #[test]
    fn test_io_failure_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        // A directory where the blob file should be cannot be read as a file
        std::fs::create_dir(storage.path_for("cache:blocked")).unwrap();

        let err = storage.read("cache:blocked").unwrap_err();
        assert!(matches!(err, CacheError::Storage(_)));
    }
}
