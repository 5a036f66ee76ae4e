//! botsync configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::RetentionConfig;
use crate::coordinator::CoordinatorConfig;

/// Main botsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Coordinator socket; defaults to the runtime directory
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,

    pub coordinator: CoordinatorConfig,

    /// Log history limits
    pub retention: RetentionConfig,

    pub storage: StorageConfig,

    pub client: ClientConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .botsync.yml
        let local_config = PathBuf::from(".botsync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/botsync/botsync.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("botsync").join("botsync.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Log level from config, read before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(crate::ipc::get_socket_path)
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding durable values such as preferences
    #[serde(rename = "durable-path")]
    pub durable_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            durable_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("botsync")
                .join(sessionstore::DEFAULT_STORE_FILE),
        }
    }
}

/// CLI client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Socket I/O timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.log_level.is_none());
        assert_eq!(config.retention.max_entries_per_type, 1000);
        assert_eq!(config.coordinator.channel_buffer, 256);
        assert_eq!(config.client.timeout(), Duration::from_secs(5));
        assert!(config.storage.durable_path.ends_with("botsync/durable.json"));
        assert!(config.socket_path().ends_with("coordinator.sock"));
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("botsync.yml");
        fs::write(
            &path,
            "log-level: debug\nsocket-path: /tmp/x.sock\nretention:\n  max-entries-per-type: 0\nclient:\n  timeout-ms: 250\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.socket_path(), PathBuf::from("/tmp/x.sock"));
        assert_eq!(config.retention.limit(), None);
        assert_eq!(config.client.timeout(), Duration::from_millis(250));
        // Untouched sections keep their defaults
        assert_eq!(config.coordinator.push_buffer, 64);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }

    #[test]
    fn test_bad_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yml");
        fs::write(&path, "retention: [1, 2").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
