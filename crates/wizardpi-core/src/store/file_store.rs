use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::StorageError;
use crate::types::UserId;

use super::{KvStore, SCHEMA_VERSION};

const SCHEMA_FILE: &str = "schema.json";

/// Database marker written next to the collection directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SchemaMarker {
    name: String,
    version: u32,
    #[serde(default)]
    collections: Vec<String>,
}

/// Durable store: one directory per database, one subdirectory per
/// collection, one `<key>.bin` file per record.
///
/// Writes go to a temp file in the collection directory and are renamed
/// over the target, so a reader sees either the old blob or the new one.
pub struct FileKvStore {
    database: String,
    collection: String,
    db_dir: PathBuf,
    collection_dir: PathBuf,
    opened: OnceCell<()>,
}

impl FileKvStore {
    pub fn new(root: &Path, database: &str, collection: &str) -> Self {
        let db_dir = root.join(database);
        let collection_dir = db_dir.join(collection);
        Self {
            database: database.to_string(),
            collection: collection.to_string(),
            db_dir,
            collection_dir,
            opened: OnceCell::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.data_dir(),
            &config.storage.database,
            &config.storage.collection,
        )
    }

    /// Directory holding the record files.
    pub fn collection_dir(&self) -> &Path {
        &self.collection_dir
    }

    fn record_path(&self, key: UserId) -> PathBuf {
        self.collection_dir.join(format!("{}.bin", key.storage_key()))
    }

    fn ready(&self) -> Result<(), StorageError> {
        if self.opened.initialized() {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    async fn open(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.db_dir).await?;

        let marker_path = self.db_dir.join(SCHEMA_FILE);
        let existing = match fs::read(&marker_path).await {
            Ok(bytes) => Some(serde_json::from_slice::<SchemaMarker>(&bytes).map_err(|e| {
                StorageError::Engine(format!("corrupt schema marker {}: {}", marker_path.display(), e))
            })?),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(marker) = &existing {
            if marker.version > SCHEMA_VERSION {
                return Err(StorageError::SchemaMismatch {
                    found: marker.version,
                    supported: SCHEMA_VERSION,
                });
            }
        }

        fs::create_dir_all(&self.collection_dir).await?;

        let mut marker = existing.clone().unwrap_or_else(|| SchemaMarker {
            name: self.database.clone(),
            version: SCHEMA_VERSION,
            collections: Vec::new(),
        });
        let mut changed = existing.is_none() || marker.version != SCHEMA_VERSION;
        marker.version = SCHEMA_VERSION;
        if !marker.collections.contains(&self.collection) {
            marker.collections.push(self.collection.clone());
            changed = true;
        }

        if changed {
            let bytes = serde_json::to_vec_pretty(&marker)
                .map_err(|e| StorageError::Engine(e.to_string()))?;
            write_atomic(&self.db_dir, &marker_path, &bytes).await?;
            info!(
                "Created collection {}/{} (schema v{})",
                self.database, self.collection, SCHEMA_VERSION
            );
        }

        Ok(())
    }
}

/// Write `bytes` to `target` via a synced temp file in `dir` and a rename.
async fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, target).await
    }
    .await;

    if let Err(e) = result {
        fs::remove_file(&tmp).await.ok();
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl KvStore for FileKvStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn init(&self) -> Result<(), StorageError> {
        self.opened.get_or_try_init(|| self.open()).await?;
        Ok(())
    }

    async fn put(&self, key: UserId, value: &[u8]) -> Result<(), StorageError> {
        self.ready()?;
        let path = self.record_path(key);
        write_atomic(&self.collection_dir, &path, value).await?;
        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    async fn get(&self, key: UserId) -> Result<Option<Vec<u8>>, StorageError> {
        self.ready()?;
        match fs::read(self.record_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: UserId) -> Result<(), StorageError> {
        self.ready()?;
        match fs::remove_file(self.record_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: UserId) -> Result<bool, StorageError> {
        self.ready()?;
        match fs::metadata(self.record_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
