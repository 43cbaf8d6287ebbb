use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::bluetooth::constants::{
    DEFAULT_RADIO_OPERATION_TIMEOUT_MS, DEFAULT_SCAN_RESULT_PACING_MS, DEFAULT_SCAN_TIMEOUT_MS,
    VEHICLE_NAME_FILTER,
};

pub const DEFAULT_CONFIG_FILE: &str = "bridge_config.json";

/// Where the control server listens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// How long one SCAN listens for advertisements
    pub scan_timeout_ms: u64,
    /// Delay between two `SCAN;...` result lines, 0 to disable
    pub result_pacing_ms: u64,
    /// Substring an advertised name must contain
    pub name_filter: String,
    /// Merge each discovery pass into the registry instead of replacing it
    pub merge_registry: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
            result_pacing_ms: DEFAULT_SCAN_RESULT_PACING_MS,
            name_filter: VEHICLE_NAME_FILTER.to_string(),
            merge_registry: true,
        }
    }
}

impl DiscoveryConfig {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn result_pacing(&self) -> Duration {
        Duration::from_millis(self.result_pacing_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RadioConfig {
    /// Upper bound for connect, discovery, subscribe, write and disconnect
    pub operation_timeout_ms: u64,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_RADIO_OPERATION_TIMEOUT_MS,
        }
    }
}

impl RadioConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub discovery: DiscoveryConfig,
    pub radio: RadioConfig,
}

impl BridgeConfig {
    /// Loads the config from `path`, falling back to defaults when the file is missing.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("Invalid config file {:?}", path))?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the config to `path`, creating missing parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize bridge config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;

        info!("Bridge config saved to {:?}.", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.server.address(), "127.0.0.1:5000");
        assert_eq!(config.discovery.scan_timeout(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, r#"{ "server": { "port": 6000 }, "discovery": { "merge_registry": false } }"#).unwrap();

        let config = BridgeConfig::load(&path).await.unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 6000);
        assert!(!config.discovery.merge_registry);
        assert_eq!(config.discovery.name_filter, "Drive");
        assert_eq!(config.radio, RadioConfig::default());
    }

    #[tokio::test]
    async fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(&path, "host: localhost").unwrap();

        assert!(BridgeConfig::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_CONFIG_FILE);
        let mut config = BridgeConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.discovery.result_pacing_ms = 0;

        config.save(&path).await.unwrap();

        assert_eq!(BridgeConfig::load(&path).await.unwrap(), config);
    }
}
