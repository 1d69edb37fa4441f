//! GATT vocabulary used by scripts and transports

pub mod config_service;
pub mod status;

pub use status::GattStatus;
