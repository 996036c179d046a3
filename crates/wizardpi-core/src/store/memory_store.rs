use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StorageError;
use crate::types::UserId;

use super::KvStore;

/// In-process store. Nothing survives a restart; used for tests and
/// `--ephemeral` runs.
#[derive(Default)]
pub struct MemoryKvStore {
    records: DashMap<String, Vec<u8>>,
    opened: AtomicBool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ready(&self) -> Result<(), StorageError> {
        if self.opened.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn init(&self) -> Result<(), StorageError> {
        self.opened.store(true, Ordering::Release);
        Ok(())
    }

    async fn put(&self, key: UserId, value: &[u8]) -> Result<(), StorageError> {
        self.ready()?;
        self.records.insert(key.storage_key(), value.to_vec());
        Ok(())
    }

    async fn get(&self, key: UserId) -> Result<Option<Vec<u8>>, StorageError> {
        self.ready()?;
        Ok(self.records.get(&key.storage_key()).map(|r| r.value().clone()))
    }

    async fn delete(&self, key: UserId) -> Result<(), StorageError> {
        self.ready()?;
        self.records.remove(&key.storage_key());
        Ok(())
    }

    async fn exists(&self, key: UserId) -> Result<bool, StorageError> {
        self.ready()?;
        Ok(self.records.contains_key(&key.storage_key()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_before_init_fail() {
        let store = MemoryKvStore::new();
        let id = UserId(7);
        assert_eq!(store.put(id, b"x").await, Err(StorageError::NotInitialized));
        assert_eq!(store.get(id).await, Err(StorageError::NotInitialized));
        assert_eq!(store.delete(id).await, Err(StorageError::NotInitialized));
        assert_eq!(store.exists(id).await, Err(StorageError::NotInitialized));
    }

    #[tokio::test]
    async fn test_put_get_overwrite_delete() {
        let store = MemoryKvStore::new();
        store.init().await.unwrap();
        store.init().await.unwrap();

        let id = UserId(7);
        assert_eq!(store.get(id).await.unwrap(), None);
        store.put(id, &[1, 2]).await.unwrap();
        store.put(id, &[3]).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), Some(vec![3]));
        assert_eq!(store.len(), 1);

        store.delete(id).await.unwrap();
        store.delete(id).await.unwrap();
        assert!(!store.exists(id).await.unwrap());
        assert!(store.is_empty());
    }
}
