//! UriBeacon Validator - conformance testing for the UriBeacon configuration service
//!
//! This library drives a device under test through ordered scripts of GATT
//! reads and writes and checks every answer against the status codes the
//! configuration service mandates, including the lock/unlock gate.

pub mod cli;
pub mod commands;
pub mod common;
pub mod gatt;
pub mod testing;
pub mod transport;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use gatt::GattStatus;
pub use testing::{RunOptions, RunSummary, Script, ScriptBuilder, Sequencer};
