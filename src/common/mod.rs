//! Common utilities shared by the library and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Decode a hex payload as written in script and replay files
///
/// Accepts upper or lower case, with optional whitespace or `:` separators
/// between bytes. An empty string is an empty payload.
pub fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    data_encoding::HEXLOWER_PERMISSIVE
        .decode(cleaned.as_bytes())
        .map_err(|e| Error::Config(format!("Invalid hex payload '{}': {}", s, e)))
}

/// Encode bytes as lowercase hex for display
pub fn to_hex(bytes: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(bytes)
}
