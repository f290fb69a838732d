pub mod scan_config;
pub mod session_config;

use std::path::Path;

use anyhow::Result;
use log::{error, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::scan_config::ScanConfig;
use crate::config::session_config::SessionConfig;
use crate::logging::level_from_name;
use crate::utils::ensure_directory_exists;

pub const CONFIG_FILE_NAME: &str = "ble_explorer.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub session: SessionConfig,
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            scan: ScanConfig::default(),
            session: SessionConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn log_level_filter(&self) -> LevelFilter {
        level_from_name(&self.log_level)
    }

    /// Loads the config from `path`, falling back to the defaults when the
    /// file does not exist.
    pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await.unwrap_or(false) {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the config to `path`, creating its directory if needed.
    pub async fn save_config<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory_exists(parent).await?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json).await?;

        info!("Config saved to {:?}.", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::types::ScanMode;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir()
            .join(format!("ble-explorer-config-{}-{}", name, std::process::id()))
            .join(CONFIG_FILE_NAME)
    }

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let config = AppConfig::load_config(temp_path("missing")).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scan.scan_mode, ScanMode::LowLatency);
        assert_eq!(config.log_level_filter(), LevelFilter::Info);
    }

    #[tokio::test]
    async fn save_then_load() {
        let path = temp_path("roundtrip");
        let mut config = AppConfig::default();
        config.scan.scan_mode = ScanMode::Balanced;
        config.session.command_buffer = 4;
        config.log_level = "debug".to_string();

        config.save_config(&path).await.unwrap();
        let loaded = AppConfig::load_config(&path).await.unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.log_level_filter(), LevelFilter::Debug);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "scan": { "scan_mode": "LowPower" } }"#).unwrap();
        assert_eq!(config.scan.scan_mode, ScanMode::LowPower);
        assert_eq!(config.session, SessionConfig::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(serde_json::from_str::<AppConfig>("{ \"scan\": 3 }").is_err());
    }
}
