//! Built-in conformance suites
//!
//! Suites are plain functions from a run context to a script; there is no
//! global registry to mutate.

use std::sync::Arc;

use super::builder::ScriptBuilder;
use super::fixtures::*;
use super::report::RunObserver;
use super::script::Script;
use crate::common::{Error, Result};
use crate::gatt::config_service::{
    CONFIG_SERVICE, DATA, FLAGS, LOCK, LOCK_STATE, PERIOD, POWER_LEVELS, POWER_MODE, RESET, UNLOCK,
};
use crate::gatt::GattStatus;

const RETURN_CODES: &str =
    "https://github.com/google/uribeacon/blob/master/specification/ConfigService.md#13-return-codes";
const LOCK_SECTION: &str =
    "https://github.com/google/uribeacon/blob/master/specification/ConfigService.md#32-lock";
const UNLOCK_SECTION: &str =
    "https://github.com/google/uribeacon/blob/master/specification/ConfigService.md#33-unlock";
const TX_POWER_MODE_SECTION: &str =
    "https://github.com/google/uribeacon/blob/master/specification/ConfigService.md#37-tx-power-mode";

pub const SPEC_TESTS: &str = "Spec UriBeacon Tests";

/// What a suite needs to know to declare its script
#[derive(Clone, Default)]
pub struct LibraryContext {
    /// Declare the optional lock/unlock subset
    pub include_optional: bool,
    /// Session observer bound to the script
    pub observer: Option<Arc<dyn RunObserver>>,
}

/// A named suite
pub struct SuiteInfo {
    pub name: &'static str,
    /// Short identifier accepted on the command line
    pub id: &'static str,
    pub description: &'static str,
    declare: fn(&LibraryContext) -> Result<Script>,
}

impl SuiteInfo {
    pub fn script(&self, ctx: &LibraryContext) -> Result<Script> {
        (self.declare)(ctx)
    }
}

/// Every built-in suite, in display order
pub fn suites() -> &'static [SuiteInfo] {
    const SUITES: &[SuiteInfo] = &[SuiteInfo {
        name: SPEC_TESTS,
        id: "spec",
        description: "Return codes for malformed writes, plus lock/unlock gating (optional)",
        declare: spec_tests,
    }];
    SUITES
}

/// Resolve a suite by id or full name (case-insensitive)
pub fn load(name: &str, ctx: &LibraryContext) -> Result<Script> {
    suites()
        .iter()
        .find(|suite| suite.id.eq_ignore_ascii_case(name) || suite.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnknownSuite(name.to_string()))?
        .script(ctx)
}

/// The configuration-service conformance suite
pub fn spec_tests(ctx: &LibraryContext) -> Result<Script> {
    ScriptBuilder::new(SPEC_TESTS)
        .name("Connecting...")
        .connect()
        .name("Try Long UriData")
        .reference(RETURN_CODES)
        .write(DATA, LONG_URI, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Short Flags")
        .reference(RETURN_CODES)
        .write(FLAGS, SHORT_FLAGS, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Long Flags")
        .reference(RETURN_CODES)
        .write(FLAGS, LONG_FLAGS, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Short Advertised Tx Power Levels")
        .reference(RETURN_CODES)
        .write(POWER_LEVELS, SHORT_TX_POWER_LEVELS, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Long Advertised Tx Power Levels")
        .reference(RETURN_CODES)
        .write(POWER_LEVELS, LONG_TX_POWER_LEVELS, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Short Power Mode")
        .reference(RETURN_CODES)
        .write(POWER_MODE, SHORT_POWER_MODE, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Long Power Mode")
        .reference(RETURN_CODES)
        .write(POWER_MODE, LONG_POWER_MODE, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Invalid Power Mode")
        .reference(TX_POWER_MODE_SECTION)
        .write(POWER_MODE, INVALID_POWER_MODE, [GattStatus::WRITE_NOT_PERMITTED])
        .name("Try Short Period")
        .reference(RETURN_CODES)
        .write(PERIOD, SHORT_PERIOD, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Long Period")
        .reference(RETURN_CODES)
        .write(PERIOD, LONG_PERIOD, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Short Reset")
        .reference(RETURN_CODES)
        .write(RESET, SHORT_RESET, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Long Reset")
        .reference(RETURN_CODES)
        .write(RESET, LONG_RESET, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .include_if(ctx.include_optional, |b| b.optional(lock_tests))
        .name("Disconnecting...")
        .disconnect()
        .set_up(CONFIG_SERVICE, ctx.observer.clone())
        .build()
}

fn lock(b: ScriptBuilder, name: &str) -> ScriptBuilder {
    b.name(name)
        .write(LOCK, BASIC_LOCK_KEY, [GattStatus::SUCCESS])
        .assert_equals(LOCK_STATE, LOCKED_STATE, GattStatus::SUCCESS)
}

fn unlock(b: ScriptBuilder, name: &str) -> ScriptBuilder {
    b.name(name)
        .write(UNLOCK, BASIC_LOCK_KEY, [GattStatus::SUCCESS])
        .assert_equals(LOCK_STATE, UNLOCKED_STATE, GattStatus::SUCCESS)
}

/// Lock key handling and write gating while locked
fn lock_tests(b: ScriptBuilder) -> ScriptBuilder {
    let b = b
        .name("Try Lock with Short Key")
        .reference(RETURN_CODES)
        .write(LOCK, SHORT_LOCK_KEY, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Lock with Long Key")
        .reference(RETURN_CODES)
        .write(LOCK, LONG_LOCK_KEY, [GattStatus::INVALID_ATTRIBUTE_LENGTH]);

    let b = lock(b, "Locking beacon...")
        .name("Locked: Try Lock with Short Key")
        .reference(LOCK_SECTION)
        .write(LOCK, SHORT_LOCK_KEY, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Lock with Valid Key")
        .reference(LOCK_SECTION)
        .write(LOCK, BASIC_LOCK_KEY, [GattStatus::INSUFFICIENT_AUTHORIZATION])
        .name("Locked: Try Lock with Long Key")
        .reference(LOCK_SECTION)
        .write(LOCK, LONG_LOCK_KEY, VALID_LENGTH_AUTHORIZATION_ERRORS);

    let b = unlock(b, "Unlocking beacon...")
        .name("Try Unlock with Short Key")
        .reference(RETURN_CODES)
        .write(UNLOCK, SHORT_LOCK_KEY, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .name("Try Unlock with Valid Key")
        .reference(UNLOCK_SECTION)
        .write(UNLOCK, BASIC_LOCK_KEY, [GattStatus::SUCCESS])
        .name("Try Unlock with Long Key")
        .reference(RETURN_CODES)
        .write(UNLOCK, LONG_LOCK_KEY, [GattStatus::INVALID_ATTRIBUTE_LENGTH]);

    // A wrong-length unlock must leave the beacon locked
    let b = lock(b, "Locking beacon...")
        .name("Locked: Try to Unlock with Short Key")
        .reference(UNLOCK_SECTION)
        .write(UNLOCK, SHORT_LOCK_KEY, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .assert_equals(LOCK_STATE, LOCKED_STATE, GattStatus::SUCCESS)
        .name("Locked: Try Unlock with Long Key")
        .reference(UNLOCK_SECTION)
        .write(UNLOCK, LONG_LOCK_KEY, [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .assert_equals(LOCK_STATE, LOCKED_STATE, GattStatus::SUCCESS);

    let b = unlock(b, "Unlocking...");
    let b = lock(b, "Locking...");

    locked_writes(b)
        .name("Unlocking...")
        .write(UNLOCK, BASIC_LOCK_KEY, [GattStatus::SUCCESS])
}

/// Every writable characteristic must refuse writes while locked
fn locked_writes(b: ScriptBuilder) -> ScriptBuilder {
    let refused = [GattStatus::INSUFFICIENT_AUTHORIZATION];
    b.name("Locked: Try Long Data")
        .reference(LOCK_SECTION)
        .write(DATA, LONG_URI, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Short Flags")
        .reference(LOCK_SECTION)
        .write(FLAGS, SHORT_FLAGS, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Valid Flags")
        .reference(LOCK_SECTION)
        .write(FLAGS, BASIC_GENERAL_DATA, refused)
        .name("Locked: Try Long Flags")
        .reference(LOCK_SECTION)
        .write(FLAGS, LONG_FLAGS, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Short Advertised Tx Power Levels")
        .reference(LOCK_SECTION)
        .write(POWER_LEVELS, SHORT_TX_POWER_LEVELS, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Valid Advertised Tx Power Levels")
        .reference(LOCK_SECTION)
        .write(POWER_LEVELS, BASIC_TX_POWER_LEVELS, refused)
        .name("Locked: Try Long Advertised Tx Power Levels")
        .reference(LOCK_SECTION)
        .write(POWER_LEVELS, LONG_TX_POWER_LEVELS, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Short Power Mode")
        .reference(LOCK_SECTION)
        .write(POWER_MODE, SHORT_POWER_MODE, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Valid Power Mode")
        .reference(LOCK_SECTION)
        .write(POWER_MODE, BASIC_GENERAL_DATA, refused)
        .name("Locked: Invalid Power Mode")
        .reference(LOCK_SECTION)
        .write(POWER_MODE, INVALID_POWER_MODE, refused)
        .name("Locked: Try Long Power Mode")
        .reference(LOCK_SECTION)
        .write(POWER_MODE, LONG_POWER_MODE, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Short Period")
        .reference(LOCK_SECTION)
        .write(PERIOD, SHORT_PERIOD, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Valid Period")
        .reference(LOCK_SECTION)
        .write(PERIOD, BASIC_PERIOD, refused)
        .name("Locked: Try Long Period")
        .reference(LOCK_SECTION)
        .write(PERIOD, LONG_PERIOD, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Short Reset")
        .reference(LOCK_SECTION)
        .write(RESET, SHORT_RESET, VALID_LENGTH_AUTHORIZATION_ERRORS)
        .name("Locked: Try Valid Reset")
        .reference(LOCK_SECTION)
        .write(RESET, BASIC_GENERAL_DATA, refused)
        .name("Locked: Try Long Reset")
        .reference(LOCK_SECTION)
        .write(RESET, LONG_RESET, VALID_LENGTH_AUTHORIZATION_ERRORS)
}
