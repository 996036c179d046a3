pub mod memory_store;

#[cfg(feature = "file-backend")]
pub mod file_store;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, StorageBackend};
use crate::error::StorageError;
use crate::types::UserId;

#[cfg(feature = "file-backend")]
pub use file_store::FileKvStore;
pub use memory_store::MemoryKvStore;

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Trait for session blob storage engines.
///
/// One logical collection, one opaque blob per user. Every operation other
/// than `init` fails with [`StorageError::NotInitialized`] until `init` has
/// succeeded once.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Engine name for logs (e.g., "file", "memory").
    fn name(&self) -> &str;

    /// Open the collection, creating it if absent. Safe to call repeatedly.
    async fn init(&self) -> Result<(), StorageError>;

    /// Insert or overwrite the blob for `key`.
    async fn put(&self, key: UserId, value: &[u8]) -> Result<(), StorageError>;

    /// Read the blob for `key`; `None` when no record exists.
    async fn get(&self, key: UserId) -> Result<Option<Vec<u8>>, StorageError>;

    /// Remove the record for `key`. Removing a missing record succeeds.
    async fn delete(&self, key: UserId) -> Result<(), StorageError>;

    /// True iff `get` would return a blob.
    async fn exists(&self, key: UserId) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Build the storage engine selected in the config.
pub fn open_store(config: &Config) -> Arc<dyn KvStore> {
    match config.storage.backend {
        #[cfg(feature = "file-backend")]
        StorageBackend::File => Arc::new(FileKvStore::from_config(config)),
        #[cfg(not(feature = "file-backend"))]
        StorageBackend::File => {
            tracing::warn!("file backend not compiled in, falling back to memory store");
            Arc::new(MemoryKvStore::new())
        }
        StorageBackend::Memory => Arc::new(MemoryKvStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_store_selects_backend() {
        let mut cfg = Config::default();
        cfg.storage.backend = StorageBackend::Memory;
        assert_eq!(open_store(&cfg).name(), "memory");

        let tmp = tempfile::tempdir().unwrap();
        cfg.storage.backend = StorageBackend::File;
        cfg.storage.data_dir = tmp.path().display().to_string();
        assert_eq!(open_store(&cfg).name(), "file");
    }

    /// Engine that only implements `get`, to exercise the default `exists`.
    struct GetOnly;

    #[async_trait]
    impl KvStore for GetOnly {
        fn name(&self) -> &str {
            "get-only"
        }
        async fn init(&self) -> Result<(), StorageError> {
            Ok(())
        }
        async fn put(&self, _key: UserId, _value: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Engine("read-only".into()))
        }
        async fn get(&self, key: UserId) -> Result<Option<Vec<u8>>, StorageError> {
            Ok((key.get() == 1).then(|| vec![1]))
        }
        async fn delete(&self, _key: UserId) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_default_exists_derives_from_get() {
        assert!(GetOnly.exists(UserId(1)).await.unwrap());
        assert!(!GetOnly.exists(UserId(2)).await.unwrap());
    }
}
