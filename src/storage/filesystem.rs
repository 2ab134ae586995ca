use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{ObjectStore, StorageError, StorageResult};

/// Stores each object as `{root}/{key}`.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: &Path) -> StorageResult<Self> {
        if !root.exists() {
            info!(path = %root.display(), "Creating object storage directory");
            fs::create_dir_all(root)?;
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are single path components; anything that could escape the
    /// root is rejected.
    fn object_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key == "." || key == ".." || key.contains('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    /// Write an object, replacing any existing content.
    pub fn put(&self, key: &str, content: &[u8]) -> StorageResult<()> {
        let path = self.object_path(key)?;
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &path)?;
        debug!(key, size = content.len(), "Stored object");
        Ok(())
    }

    pub fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.object_path(key)?.is_file())
    }
}

impl ObjectStore for FilesystemStore {
    fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key, "Object already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();

        store.put("3f2a", b"jpeg bytes").unwrap();
        assert!(store.exists("3f2a").unwrap());

        store.delete("3f2a").unwrap();
        assert!(!store.exists("3f2a").unwrap());

        // Deleting again is not an error
        store.delete("3f2a").unwrap();
    }

    #[test]
    fn test_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();

        for key in ["", "..", "../etc/passwd", "a/b", "a\\b"] {
            assert!(
                matches!(store.delete(key), Err(StorageError::InvalidKey(_))),
                "key {key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_new_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a").join("b");
        let store = FilesystemStore::new(&root).unwrap();
        assert!(root.is_dir());
        assert_eq!(store.root(), root.as_path());
    }
}
