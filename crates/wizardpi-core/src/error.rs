use std::path::PathBuf;

/// Core error types for wizardpi.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the persistent key-value store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Database is not initialized")]
    NotInitialized,

    /// The underlying engine failed; carries the engine's own diagnostic.
    #[error("{0}")]
    Engine(String),

    #[error("Schema version {found} is newer than supported version {supported}")]
    SchemaMismatch { found: u32, supported: u32 },
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Engine(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Bridge is already installed on this host surface")]
    AlreadyInstalled,

    #[error("Unknown operation: {0}")]
    UnknownOp(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BridgeError {
    /// Stable label sent to the foreign host alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::AlreadyInstalled => "already_installed",
            BridgeError::UnknownOp(_) => "unknown_op",
            BridgeError::BadRequest(_) => "bad_request",
            BridgeError::Storage(StorageError::NotInitialized) => "not_initialized",
            BridgeError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_keeps_engine_message() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk quota exceeded");
        let err: StorageError = io.into();
        assert_eq!(err, StorageError::Engine("disk quota exceeded".to_string()));
        assert_eq!(err.to_string(), "disk quota exceeded");
    }

    #[test]
    fn test_bridge_error_kind() {
        assert_eq!(BridgeError::Storage(StorageError::NotInitialized).kind(), "not_initialized");
        assert_eq!(BridgeError::Storage(StorageError::Engine("x".into())).kind(), "storage");
        assert_eq!(BridgeError::UnknownOp("nope".into()).kind(), "unknown_op");
        assert_eq!(BridgeError::BadRequest("bad".into()).kind(), "bad_request");
    }

    #[test]
    fn test_sync_error_from_storage() {
        let err: SyncError = StorageError::NotInitialized.into();
        assert!(matches!(err, SyncError::Storage(StorageError::NotInitialized)));
        assert_eq!(err.to_string(), "Storage error: Database is not initialized");
    }
}
