//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! server URL, session storage backend, request timeout and the last used
//! username.
//!
//! Configuration is stored at `~/.config/modsentry/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::auth::{FileStore, KeyValueStore, KeyringStore, MemoryStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "modsentry";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the server URL
pub const API_URL_ENV: &str = "MODSENTRY_API_URL";

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where the session's tokens and profile are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub storage: StorageBackend,
    pub request_timeout_secs: Option<u64>,
    pub last_username: Option<String>,
    /// Directory for rolling log files; stderr only when unset
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Server URL: environment first, then config file, then the default
    pub fn api_base_url(&self) -> String {
        std::env::var(API_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Build the configured session storage backend
    pub fn session_storage(&self) -> Result<Arc<dyn KeyValueStore>> {
        let storage: Arc<dyn KeyValueStore> = match self.storage {
            StorageBackend::File => Arc::new(FileStore::in_dir(&self.data_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStore::default()),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage, StorageBackend::File);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_config_file_parses() {
        let config: Config =
            serde_json::from_str(r#"{"storage": "keyring", "request_timeout_secs": 5}"#).unwrap();
        assert_eq!(config.storage, StorageBackend::Keyring);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert!(config.api_base_url.is_none());
    }

    #[test]
    fn test_memory_storage_backend() {
        let config = Config {
            storage: StorageBackend::Memory,
            ..Default::default()
        };
        let storage = config.session_storage().unwrap();
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    }
}
