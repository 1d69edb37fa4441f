//! UriBeacon configuration service (v2) identifiers

use uuid::Uuid;

use crate::common::{Error, Result};

/// The configuration GATT service
pub const CONFIG_SERVICE: Uuid = Uuid::from_u128(0xee0c2080_8786_40ba_ab96_99b91ac981d8);

/// Reads back 1 when the beacon is locked, 0 when unlocked
pub const LOCK_STATE: Uuid = Uuid::from_u128(0xee0c2081_8786_40ba_ab96_99b91ac981d8);
pub const LOCK: Uuid = Uuid::from_u128(0xee0c2082_8786_40ba_ab96_99b91ac981d8);
pub const UNLOCK: Uuid = Uuid::from_u128(0xee0c2083_8786_40ba_ab96_99b91ac981d8);
pub const DATA: Uuid = Uuid::from_u128(0xee0c2084_8786_40ba_ab96_99b91ac981d8);
pub const FLAGS: Uuid = Uuid::from_u128(0xee0c2085_8786_40ba_ab96_99b91ac981d8);
pub const POWER_LEVELS: Uuid = Uuid::from_u128(0xee0c2086_8786_40ba_ab96_99b91ac981d8);
pub const POWER_MODE: Uuid = Uuid::from_u128(0xee0c2087_8786_40ba_ab96_99b91ac981d8);
pub const PERIOD: Uuid = Uuid::from_u128(0xee0c2088_8786_40ba_ab96_99b91ac981d8);
pub const RESET: Uuid = Uuid::from_u128(0xee0c2089_8786_40ba_ab96_99b91ac981d8);

const ALIASES: &[(&str, Uuid)] = &[
    ("lock_state", LOCK_STATE),
    ("lock", LOCK),
    ("unlock", UNLOCK),
    ("data", DATA),
    ("flags", FLAGS),
    ("power_levels", POWER_LEVELS),
    ("power_mode", POWER_MODE),
    ("period", PERIOD),
    ("reset", RESET),
];

/// Resolve a characteristic alias (`flags`, `power-mode`, ...) or a literal UUID
pub fn resolve(name: &str) -> Result<Uuid> {
    let key = name.trim().to_ascii_lowercase().replace('-', "_");
    if let Some((_, uuid)) = ALIASES.iter().find(|(alias, _)| *alias == key) {
        return Ok(*uuid);
    }
    Uuid::parse_str(name.trim()).map_err(|_| Error::UnknownCharacteristic(name.to_string()))
}

/// Short alias for a known characteristic, for display
pub fn alias(uuid: &Uuid) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(_, known)| known == uuid)
        .map(|(alias, _)| *alias)
}

/// Human-readable characteristic label: alias if known, UUID otherwise
pub fn describe(uuid: &Uuid) -> String {
    alias(uuid)
        .map(str::to_string)
        .unwrap_or_else(|| uuid.to_string())
}
