use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Root configuration for wizardpi.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

impl Config {
    /// Get expanded data directory.
    pub fn data_dir(&self) -> PathBuf {
        let path = &self.storage.data_dir;
        if path.starts_with("~/") || path.starts_with("~\\") {
            if let Some(home) = dirs::home_dir() {
                return home.join(&path[2..]);
            }
        }
        PathBuf::from(path)
    }

    /// Full URL of the user-action endpoint.
    pub fn action_url(&self) -> String {
        join_url(&self.sync.base_url, &self.sync.action_path)
    }

    /// Full URL of the avatar endpoint (without query).
    pub fn avatar_url(&self) -> String {
        join_url(&self.sync.base_url, &self.sync.avatar_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Which engine backs the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(ConfigError::Invalid(format!("unknown storage backend: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub database: String,
    pub collection: String,
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.wizardpi/data".to_string(),
            database: "UserData".to_string(),
            collection: "userSessions".to_string(),
            backend: StorageBackend::File,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub base_url: String,
    pub action_path: String,
    pub avatar_path: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "https://v3.spb.ru".to_string(),
            action_path: "/wizard_pi_user_action".to_string(),
            avatar_path: "/get_user_avatar".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 5,
            user_agent: format!("wizardpi/{}", crate::VERSION),
        }
    }
}

// ====== Config loading/saving ======

/// Load configuration from environment variables.
///
/// Priority:
/// 1. `WIZARDPI_CONFIG` env var: full JSON config
/// 2. Individual env vars (merged on top of the file config)
/// 3. File fallback (`~/.wizardpi/config.json`)
pub fn load_config_from_env() -> Config {
    if let Ok(json) = std::env::var("WIZARDPI_CONFIG") {
        match serde_json::from_str::<Config>(&json) {
            Ok(config) => return config,
            Err(e) => {
                tracing::warn!("Failed to parse WIZARDPI_CONFIG: {}", e);
            }
        }
    }

    let mut cfg = load_config(None);
    apply_env_overrides(&mut cfg);
    cfg
}

/// Overlay individual `WIZARDPI_*` variables onto an existing config.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("WIZARDPI_BASE_URL") {
        cfg.sync.base_url = v;
    }
    if let Ok(v) = std::env::var("WIZARDPI_DATA_DIR") {
        cfg.storage.data_dir = v;
    }
    if let Ok(v) = std::env::var("WIZARDPI_STORAGE_BACKEND") {
        match v.parse() {
            Ok(backend) => cfg.storage.backend = backend,
            Err(e) => tracing::warn!("Ignoring WIZARDPI_STORAGE_BACKEND: {}", e),
        }
    }
}

/// Get the default configuration file path.
pub fn get_config_path() -> PathBuf {
    get_home_dir().join("config.json")
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wizardpi")
}

/// Load configuration from an explicit file; a missing file is an error.
pub fn load_config_file(path: &Path) -> std::result::Result<Config, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(ConfigError::Invalid(format!("{}: {}", path.display(), e))),
    };
    Ok(serde_json::from_str(&content)?)
}

/// Load configuration from file or create default.
pub fn load_config(config_path: Option<&Path>) -> Config {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Config>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse config from {}: {}", path.display(), e);
                    tracing::warn!("Using default configuration.");
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read config from {}: {}", path.display(), e);
                tracing::warn!("Using default configuration.");
            }
        }
    }

    Config::default()
}

/// Save configuration to file.
pub fn save_config(config: &Config, config_path: Option<&Path>) -> std::result::Result<(), ConfigError> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_config_path);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }

    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    Ok(())
}
