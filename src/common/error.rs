//! Error types for the validator
//!
//! Protocol status mismatches are never errors: they are recorded as failed
//! entries in a run report. The variants here cover everything that stops the
//! validator itself from doing its job.

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the validator
#[derive(Error, Debug)]
pub enum Error {
    // === Script Construction Errors ===
    #[error("Invalid script '{script}': {reason}")]
    Builder { script: String, reason: String },

    #[error("Unknown test suite '{0}'. Use 'uribeacon-validator list' to see available suites")]
    UnknownSuite(String),

    #[error("Unknown characteristic '{0}'. Use a UUID or one of: lock_state, lock, unlock, data, flags, power_levels, power_mode, period, reset")]
    UnknownCharacteristic(String),

    #[error("Unknown status code '{0}'")]
    UnknownStatus(String),

    // === Device / Transport Errors ===
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("No device matching '{0}' found. Make sure it is advertising and in range")]
    DeviceNotFound(String),

    #[error("No Bluetooth adapter available")]
    NoAdapter,

    #[error("This build has no Bluetooth LE support. Rebuild with '--features ble' or use '--replay <file>'")]
    BleUnavailable,

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a builder misuse error for the named script
    pub fn builder(script: &str, reason: impl Into<String>) -> Self {
        Self::Builder {
            script: script.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_error_message() {
        let e = Error::builder("Spec UriBeacon Tests", "no action declared");
        assert_eq!(
            e.to_string(),
            "Invalid script 'Spec UriBeacon Tests': no action declared"
        );
    }
}
