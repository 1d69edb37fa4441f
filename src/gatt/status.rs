//! GATT status codes
//!
//! Values follow the ATT error codes from the Bluetooth Core specification,
//! widened to `u16` so the host-side `GATT_FAILURE` (0x101) also fits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::Error;

/// A status code reported by the device for a read or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "StatusRepr", into = "String")]
pub struct GattStatus(pub u16);

impl GattStatus {
    pub const SUCCESS: Self = Self(0x00);
    pub const READ_NOT_PERMITTED: Self = Self(0x02);
    pub const WRITE_NOT_PERMITTED: Self = Self(0x03);
    pub const INSUFFICIENT_AUTHENTICATION: Self = Self(0x05);
    pub const REQUEST_NOT_SUPPORTED: Self = Self(0x06);
    pub const INSUFFICIENT_AUTHORIZATION: Self = Self(0x08);
    pub const INVALID_ATTRIBUTE_LENGTH: Self = Self(0x0d);
    pub const FAILURE: Self = Self(0x101);

    const KNOWN: &'static [(Self, &'static str)] = &[
        (Self::SUCCESS, "SUCCESS"),
        (Self::READ_NOT_PERMITTED, "READ_NOT_PERMITTED"),
        (Self::WRITE_NOT_PERMITTED, "WRITE_NOT_PERMITTED"),
        (Self::INSUFFICIENT_AUTHENTICATION, "INSUFFICIENT_AUTHENTICATION"),
        (Self::REQUEST_NOT_SUPPORTED, "REQUEST_NOT_SUPPORTED"),
        (Self::INSUFFICIENT_AUTHORIZATION, "INSUFFICIENT_AUTHORIZATION"),
        (Self::INVALID_ATTRIBUTE_LENGTH, "INVALID_ATTRIBUTE_LENGTH"),
        (Self::FAILURE, "FAILURE"),
    ];

    /// Symbolic name, if this is a well-known code
    pub fn name(self) -> Option<&'static str> {
        Self::KNOWN
            .iter()
            .find(|(status, _)| *status == self)
            .map(|(_, name)| *name)
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:02x}", self.0),
        }
    }
}

impl FromStr for GattStatus {
    type Err = Error;

    /// Parse `INSUFFICIENT_AUTHORIZATION`, `gatt_insufficient_authorization`,
    /// `8`, or `0x08`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let symbol = upper.strip_prefix("GATT_").unwrap_or(&upper);

        if let Some((status, _)) = Self::KNOWN.iter().find(|(_, name)| *name == symbol) {
            return Ok(*status);
        }

        let parsed = match trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        {
            Some(hex) => u16::from_str_radix(hex, 16),
            None => trimmed.parse::<u16>(),
        };
        parsed
            .map(GattStatus)
            .map_err(|_| Error::UnknownStatus(s.to_string()))
    }
}

impl From<GattStatus> for String {
    fn from(status: GattStatus) -> Self {
        status.to_string()
    }
}

/// Script files may spell a status as a name or as a number
#[derive(Deserialize)]
#[serde(untagged)]
enum StatusRepr {
    Code(u16),
    Text(String),
}

impl TryFrom<StatusRepr> for GattStatus {
    type Error = Error;

    fn try_from(repr: StatusRepr) -> Result<Self, Self::Error> {
        match repr {
            StatusRepr::Code(code) => Ok(GattStatus(code)),
            StatusRepr::Text(text) => text.parse(),
        }
    }
}
