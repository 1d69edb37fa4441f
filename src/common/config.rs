//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Device selection settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Run defaults
    #[serde(default)]
    pub run: RunConfig,
}

/// Timeout settings in seconds
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Time allowed for a single read or write to resolve
    #[serde(default = "default_operation")]
    pub operation_secs: u64,

    /// Time allowed to connect and discover services
    #[serde(default = "default_connect")]
    pub connect_secs: u64,

    /// How long to scan for the device before giving up
    #[serde(default = "default_scan")]
    pub scan_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            operation_secs: default_operation(),
            connect_secs: default_connect(),
            scan_secs: default_scan(),
        }
    }
}

fn default_operation() -> u64 {
    10
}
fn default_connect() -> u64 {
    20
}
fn default_scan() -> u64 {
    5
}

impl Timeouts {
    pub fn operation(&self) -> Duration {
        Duration::from_secs(self.operation_secs)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn scan(&self) -> Duration {
        Duration::from_secs(self.scan_secs)
    }
}

/// Device selection
#[derive(Debug, Deserialize, Default)]
pub struct DeviceConfig {
    /// Name or address fragment of the device under test
    pub filter: Option<String>,
}

/// Run defaults
#[derive(Debug, Deserialize, Default)]
pub struct RunConfig {
    /// Run the optional (lock/unlock) subset by default
    #[serde(default)]
    pub include_optional: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| super::Error::file_read(path, e))?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }
}
