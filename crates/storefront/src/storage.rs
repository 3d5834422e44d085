//! Key-value persistence for client state.
//!
//! Each key is stored as one JSON file inside the data directory. Writes go
//! through a temporary file and a rename so readers never observe a partial
//! value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt value for key {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },

    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),
}

/// JSON file store rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a store rooted at `root`. The directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the stored files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read and decode a value. Missing keys yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys, I/O failures, and undecodable content.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    /// Encode and write a value.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys or I/O failures.
    pub async fn set<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec(value).map_err(StorageError::Encode)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Delete a value. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys or I/O failures.
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get::<Vec<u32>>("cart_guest").await.unwrap(), None);
        storage.set("cart_guest", &vec![1_u32, 2]).await.unwrap();
        assert_eq!(storage.get::<Vec<u32>>("cart_guest").await.unwrap(), Some(vec![1, 2]));

        storage.remove("cart_guest").await.unwrap();
        storage.remove("cart_guest").await.unwrap();
        assert_eq!(storage.get::<Vec<u32>>("cart_guest").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        for key in ["", "../user", "a/b", "user.json"] {
            assert!(matches!(
                storage.set(key, &1).await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_corrupt_value() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        std::fs::write(dir.path().join("user.json"), b"{not json").unwrap();
        assert!(matches!(
            storage.get::<serde_json::Value>("user").await,
            Err(StorageError::Corrupt { .. })
        ));
    }
}
