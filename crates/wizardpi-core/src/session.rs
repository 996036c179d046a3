use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::{StorageError, SyncError};
use crate::store::KvStore;
use crate::types::UserId;

/// Result of looking up a session for the sync flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Found(Vec<u8>),
    Missing,
}

impl SessionLookup {
    pub fn into_option(self) -> Option<Vec<u8>> {
        match self {
            SessionLookup::Found(data) => Some(data),
            SessionLookup::Missing => None,
        }
    }
}

/// Typed façade over the session blob store.
///
/// Every call goes straight to the engine; nothing is cached in memory.
/// Callers own one instance (usually behind an `Arc`) for the whole process.
pub struct SessionCache {
    store: Arc<dyn KvStore>,
}

impl SessionCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// Name of the engine behind this cache.
    pub fn engine(&self) -> &str {
        self.store.name()
    }

    pub async fn init_db(&self) -> Result<(), StorageError> {
        self.store.init().await.map_err(|e| {
            error!("Error opening session store ({}): {}", self.store.name(), e);
            e
        })
    }

    pub async fn save_user_session(&self, user_id: UserId, data: &[u8]) -> Result<(), StorageError> {
        match self.store.put(user_id, data).await {
            Ok(()) => {
                info!("Session saved for user: {}", user_id);
                Ok(())
            }
            Err(e) => {
                error!("Error saving session for user {}: {}", user_id, e);
                Err(e)
            }
        }
    }

    pub async fn get_user_session(&self, user_id: UserId) -> Result<Option<Vec<u8>>, StorageError> {
        self.store.get(user_id).await.map_err(|e| {
            error!("Error loading session for user {}: {}", user_id, e);
            e
        })
    }

    pub async fn delete_user_session(&self, user_id: UserId) -> Result<(), StorageError> {
        match self.store.delete(user_id).await {
            Ok(()) => {
                info!("Session deleted for user: {}", user_id);
                Ok(())
            }
            Err(e) => {
                error!("Error deleting session for user {}: {}", user_id, e);
                Err(e)
            }
        }
    }

    pub async fn check_session_exists(&self, user_id: UserId) -> Result<bool, StorageError> {
        self.store.exists(user_id).await
    }

    /// Existence check followed by a read.
    ///
    /// A record that disappears between the two steps reports `Missing`.
    pub async fn extract_session(&self, user_id: UserId) -> Result<SessionLookup, StorageError> {
        if !self.check_session_exists(user_id).await? {
            debug!("No session found for user: {}", user_id);
            return Ok(SessionLookup::Missing);
        }

        match self.get_user_session(user_id).await? {
            Some(data) => Ok(SessionLookup::Found(data)),
            None => {
                debug!("Session for user {} vanished before it could be read", user_id);
                Ok(SessionLookup::Missing)
            }
        }
    }

    /// Load a raw session file exported from another device and store it.
    ///
    /// Reads `<dir>/<user_id>.session`, saves it, and reads it back to
    /// confirm. Returns the number of bytes stored.
    pub async fn seed_from_dir(&self, user_id: UserId, dir: &Path) -> Result<usize, SyncError> {
        let path = dir.join(format!("{}.session", user_id));
        let data = tokio::fs::read(&path).await?;

        self.save_user_session(user_id, &data).await?;
        match self.get_user_session(user_id).await? {
            Some(saved) if saved == data => {
                info!("Session {} seeded from {}", user_id, path.display());
                Ok(saved.len())
            }
            _ => Err(StorageError::Engine(format!(
                "session for user {} did not read back after seeding",
                user_id
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    fn cache() -> SessionCache {
        SessionCache::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn test_requires_init() {
        let cache = cache();
        assert_eq!(
            cache.save_user_session(UserId(1), &[1]).await,
            Err(StorageError::NotInitialized)
        );
        assert_eq!(
            cache.check_session_exists(UserId(1)).await,
            Err(StorageError::NotInitialized)
        );
        cache.init_db().await.unwrap();
        assert!(!cache.check_session_exists(UserId(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let cache = cache();
        cache.init_db().await.unwrap();
        let id = UserId(42);

        assert!(!cache.check_session_exists(id).await.unwrap());
        cache.save_user_session(id, &[1, 2, 3]).await.unwrap();
        assert!(cache.check_session_exists(id).await.unwrap());
        assert_eq!(cache.get_user_session(id).await.unwrap(), Some(vec![1, 2, 3]));
        cache.delete_user_session(id).await.unwrap();
        assert_eq!(cache.get_user_session(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_extract_session() {
        let cache = cache();
        cache.init_db().await.unwrap();

        assert_eq!(cache.extract_session(UserId(9)).await.unwrap(), SessionLookup::Missing);
        cache.save_user_session(UserId(9), b"blob").await.unwrap();
        let found = cache.extract_session(UserId(9)).await.unwrap();
        assert_eq!(found.into_option(), Some(b"blob".to_vec()));
    }

    #[tokio::test]
    async fn test_seed_from_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("77.session"), [4u8, 5, 6]).unwrap();

        let cache = cache();
        cache.init_db().await.unwrap();
        let n = cache.seed_from_dir(UserId(77), tmp.path()).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(cache.get_user_session(UserId(77)).await.unwrap(), Some(vec![4, 5, 6]));

        let missing = cache.seed_from_dir(UserId(78), tmp.path()).await;
        assert!(matches!(missing, Err(SyncError::Io(_))));
    }
}
