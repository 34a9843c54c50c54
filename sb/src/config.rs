//! Switchboard configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main switchboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level override (TRACE, DEBUG, INFO, WARN, ERROR)
    pub log_level: Option<String>,

    /// Store locations
    pub storage: StorageConfig,

    /// Worker tuning
    pub worker: WorkerConfig,
}

/// Store locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the contacts database
    #[serde(default = "default_contacts_db")]
    pub contacts_db: PathBuf,

    /// Path to the SPA configuration file
    #[serde(default = "default_spa_store")]
    pub spa_store: PathBuf,
}

fn default_contacts_db() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("switchboard")
        .join("contacts.db")
}

fn default_spa_store() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("switchboard")
        .join("spa.jsonl")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            contacts_db: default_contacts_db(),
            spa_store: default_spa_store(),
        }
    }
}

/// Worker tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Channel buffer size for worker requests
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Channel buffer size for per-port broadcasts
    #[serde(default = "default_port_buffer")]
    pub port_buffer: usize,

    /// Username field used when no adapter is loaded
    #[serde(default = "default_username_field")]
    pub default_username_field: String,
}

fn default_channel_buffer() -> usize {
    256
}

fn default_port_buffer() -> usize {
    64
}

fn default_username_field() -> String {
    "username".to_string()
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: default_channel_buffer(),
            port_buffer: default_port_buffer(),
            default_username_field: default_username_field(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .switchboard.yml
        let local_config = PathBuf::from(".switchboard.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/switchboard/switchboard.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("switchboard").join("switchboard.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.storage.contacts_db.ends_with("switchboard/contacts.db"));
        assert!(config.storage.spa_store.ends_with("switchboard/spa.jsonl"));
        assert_eq!(config.worker.channel_buffer, 256);
        assert_eq!(config.worker.port_buffer, 64);
        assert_eq!(config.worker.default_username_field, "username");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("worker:\n  channel_buffer: 16\n").unwrap();
        assert_eq!(config.worker.channel_buffer, 16);
        assert_eq!(config.worker.port_buffer, 64);
        assert!(config.storage.contacts_db.ends_with("contacts.db"));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("switchboard.yml");
        std::fs::write(&path, "log_level: DEBUG\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("DEBUG"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let path = PathBuf::from("/nonexistent/switchboard.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
