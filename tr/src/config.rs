//! TagReader configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::coordinator::CoordinatorConfig;

/// Main TagReader configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Which tool and device to read from
    pub reader: ReaderConfig,

    /// Timing policy and read defaults
    pub coordinator: CoordinatorConfig,
}

/// Tool and device a Coordinator drives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Path to the scan tool executable
    #[serde(rename = "tool-path")]
    pub tool_path: PathBuf,

    /// Device URL passed to the tool
    #[serde(rename = "device-url")]
    pub device_url: String,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this after CLI overrides are applied so a missing tool or device
    /// fails before any read is attempted.
    pub fn validate(&self) -> Result<()> {
        debug!("Config::validate: called");
        if self.reader.tool_path.as_os_str().is_empty() {
            return Err(eyre::eyre!(
                "Reader tool path not set. Use --tool or set reader.tool-path in the config file."
            ));
        }
        if self.reader.device_url.is_empty() {
            return Err(eyre::eyre!(
                "Reader device URL not set. Use --device or set reader.device-url in the config file."
            ));
        }
        let c = &self.coordinator;
        if !c.timing_is_valid(c.default_read_timeout_ms, c.default_timeout_ms) {
            return Err(eyre::eyre!(
                "default-read-timeout-ms ({}) + read-buffer-ms ({}) exceeds default-timeout-ms ({})",
                c.default_read_timeout_ms,
                c.read_buffer_ms,
                c.default_timeout_ms
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .tagreader.yml
        let local_config = PathBuf::from(".tagreader.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tagreader/tagreader.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tagreader").join("tagreader.yml");
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

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed here; the full load reports them later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".tagreader.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("tagreader").join("tagreader.yml"));
                }
                paths
            }
        };

        candidates
            .iter()
            .find(|path| path.exists())
            .and_then(|path| Self::load_from_file(path).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
