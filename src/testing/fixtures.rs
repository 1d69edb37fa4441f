//! Payload fixtures for the configuration service
//!
//! Each writable characteristic has a fixed length. "Short" and "long"
//! payloads miss it by one byte; the device must reject both with
//! `INVALID_ATTRIBUTE_LENGTH` while unlocked.

use crate::gatt::GattStatus;

/// Nineteen bytes: one over the 18-byte URI limit
pub const LONG_URI: &[u8] = &[
    0x00, b'u', b'r', b'i', b'b', b'e', b'a', b'c', b'o', b'n', b'-', b'v', b'a', b'l', b'i',
    b'd', b'a', b't', 0x08,
];

pub const SHORT_FLAGS: &[u8] = &[];
pub const LONG_FLAGS: &[u8] = &[0x00, 0x00];

/// Advertised TX power for each of the four power modes, in dBm
pub const BASIC_TX_POWER_LEVELS: &[u8] = &[0xc5, 0xdd, 0xdf, 0xeb];
pub const SHORT_TX_POWER_LEVELS: &[u8] = &[0xc5, 0xdd, 0xdf];
pub const LONG_TX_POWER_LEVELS: &[u8] = &[0xc5, 0xdd, 0xdf, 0xeb, 0xf0];

pub const SHORT_POWER_MODE: &[u8] = &[];
pub const LONG_POWER_MODE: &[u8] = &[0x01, 0x01];
/// Valid length, but only modes 0..=3 exist
pub const INVALID_POWER_MODE: &[u8] = &[0x04];

/// 1000 ms, little-endian
pub const BASIC_PERIOD: &[u8] = &[0xe8, 0x03];
pub const SHORT_PERIOD: &[u8] = &[0xe8];
pub const LONG_PERIOD: &[u8] = &[0xe8, 0x03, 0x00];

pub const SHORT_RESET: &[u8] = &[];
pub const LONG_RESET: &[u8] = &[0x01, 0x01];

/// One byte of valid data for the single-byte characteristics (flags, power mode, reset)
pub const BASIC_GENERAL_DATA: &[u8] = &[0x00];

/// The lock key is 16 bytes
pub const BASIC_LOCK_KEY: &[u8] = &[
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f,
];
pub const SHORT_LOCK_KEY: &[u8] = &[
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
];
pub const LONG_LOCK_KEY: &[u8] = &[
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e,
    0x0f, 0x10,
];

pub const LOCKED_STATE: &[u8] = &[0x01];
pub const UNLOCKED_STATE: &[u8] = &[0x00];

/// While locked, a wrong-length write may be refused for either reason
pub const VALID_LENGTH_AUTHORIZATION_ERRORS: [GattStatus; 2] = [
    GattStatus::INSUFFICIENT_AUTHORIZATION,
    GattStatus::INVALID_ATTRIBUTE_LENGTH,
];
