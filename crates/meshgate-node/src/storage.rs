//! Mapping-table persistence.
//!
//! Confirmed address mappings live in one file under the storage directory.
//! Writes go to `.tmp` first and are renamed into place so a crash never
//! leaves a half-written table behind.

use std::path::{Path, PathBuf};

use tokio::fs;

use meshgate_transport::AddressMapping;

use crate::storage_codec;

/// File name for the serialized mapping table.
const MAPPINGS_FILE: &str = "address_mappings";

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("failed to determine storage directory: {0}")]
    Directory(String),
}

/// Persistent storage for gateway state.
#[derive(Debug)]
pub struct Storage {
    base_dir: PathBuf,
}

impl Storage {
    /// Create a storage instance, creating the directory if needed.
    ///
    /// # Note
    /// This performs blocking I/O (`create_dir_all`). Call at startup.
    pub fn new(base_dir: PathBuf) -> Result<Self, StorageError> {
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// Create storage at the default path (`~/.meshgate/storage`).
    pub fn default_path() -> Result<Self, StorageError> {
        let home = dirs::home_dir()
            .ok_or_else(|| StorageError::Directory("could not determine home directory".into()))?;
        Self::new(home.join(".meshgate").join("storage"))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn mappings_path(&self) -> PathBuf {
        self.base_dir.join(MAPPINGS_FILE)
    }

    /// Rewrite the mapping file with the confirmed entries of `mappings`.
    pub async fn save_mappings(&self, mappings: &[AddressMapping]) -> Result<(), StorageError> {
        let bytes = storage_codec::serialize_mappings(mappings)
            .map_err(|e| StorageError::Serialize(e.to_string()))?;
        self.atomic_write(&self.mappings_path(), &bytes).await
    }

    /// Load the mapping file. Returns an empty list if it doesn't exist.
    pub async fn load_mappings(&self) -> Result<Vec<AddressMapping>, StorageError> {
        match fs::read(self.mappings_path()).await {
            Ok(bytes) => storage_codec::deserialize_mappings(&bytes)
                .map_err(|e| StorageError::Deserialize(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgate_core::{CryptoIdentity, RadioNodeId};

    fn mapping(b: u8, confirmed: bool) -> AddressMapping {
        AddressMapping {
            crypto: CryptoIdentity::new([b; 16]),
            radio: RadioNodeId::new(u32::from(b) * 100),
            confirmed,
            created_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_mappings_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();

        let mappings = vec![mapping(1, true), mapping(2, true), mapping(3, false)];
        storage.save_mappings(&mappings).await.unwrap();

        let loaded = storage.load_mappings().await.unwrap();
        assert_eq!(loaded, vec![mapping(1, true), mapping(2, true)]);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();
        assert!(storage.load_mappings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();
        std::fs::write(storage.mappings_path(), [0xFF; 7]).unwrap();
        assert!(matches!(
            storage.load_mappings().await,
            Err(StorageError::Deserialize(_))
        ));
    }

    #[tokio::test]
    async fn test_rewrite_replaces_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();
        storage
            .save_mappings(&[mapping(1, true), mapping(2, true)])
            .await
            .unwrap();
        storage.save_mappings(&[mapping(3, true)]).await.unwrap();
        assert_eq!(storage.load_mappings().await.unwrap(), vec![mapping(3, true)]);
    }

    #[tokio::test]
    async fn test_atomic_write_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();

        let path = dir.path().join("test_file");
        storage.atomic_write(&path, b"hello").await.unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_tmp_file_from_previous_crash_ignored_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().to_path_buf()).unwrap();
        storage.save_mappings(&[mapping(4, true)]).await.unwrap();
        std::fs::write(storage.mappings_path().with_extension("tmp"), b"partial").unwrap();

        assert_eq!(storage.load_mappings().await.unwrap(), vec![mapping(4, true)]);
    }

    #[test]
    fn test_storage_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c");

        assert!(!nested.exists());
        let storage = Storage::new(nested.clone()).unwrap();
        assert!(nested.exists());
        assert_eq!(storage.base_dir(), nested.as_path());
    }
}
