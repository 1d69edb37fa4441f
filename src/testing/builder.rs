//! Fluent script declaration
//!
//! ```
//! use validator::gatt::{config_service, GattStatus};
//! use validator::testing::ScriptBuilder;
//!
//! let script = ScriptBuilder::new("Flags")
//!     .name("Connecting...")
//!     .connect()
//!     .name("Try Short Flags")
//!     .reference("https://github.com/google/uribeacon/blob/master/specification/ConfigService.md#13-return-codes")
//!     .write(config_service::FLAGS, [0u8; 0], [GattStatus::INVALID_ATTRIBUTE_LENGTH])
//!     .name("Disconnecting...")
//!     .disconnect()
//!     .set_up(config_service::CONFIG_SERVICE, None)
//!     .build()
//!     .unwrap();
//! assert_eq!(script.len(), 3);
//! ```
//!
//! `name` and `reference` are sticky: they label every following operation
//! until the next `name`, so a write and its read-back check form one named
//! test case. Misuse is remembered where it happens and reported by `build`.

use std::sync::Arc;

use uuid::Uuid;

use super::operation::{Action, ExpectedOutcomes, Operation};
use super::report::RunObserver;
use super::script::Script;
use crate::common::{Error, Result};
use crate::gatt::GattStatus;

/// Accumulates operations for one script
pub struct ScriptBuilder {
    script: String,
    operations: Vec<Operation>,
    name: Option<String>,
    reference: Option<String>,
    /// A `name` was declared and no action has used it yet
    name_unused: bool,
    optional_depth: usize,
    service: Option<Uuid>,
    observer: Option<Arc<dyn RunObserver>>,
    error: Option<String>,
}

impl ScriptBuilder {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            operations: Vec::new(),
            name: None,
            reference: None,
            name_unused: false,
            optional_depth: 0,
            service: None,
            observer: None,
            error: None,
        }
    }

    fn fail(&mut self, reason: String) {
        if self.error.is_none() {
            self.error = Some(reason);
        }
    }

    /// Start a new named test case
    pub fn name(mut self, name: impl Into<String>) -> Self {
        if self.name_unused {
            let previous = self.name.clone().unwrap_or_default();
            self.fail(format!("'{}' declares no action", previous));
        }
        self.name = Some(name.into());
        self.reference = None;
        self.name_unused = true;
        self
    }

    /// Documentation link for the current test case
    pub fn reference(mut self, url: impl Into<String>) -> Self {
        if self.name.is_none() {
            self.fail("reference declared before any name".to_string());
        }
        self.reference = Some(url.into());
        self
    }

    fn push(mut self, action: Action, expected: Option<ExpectedOutcomes>) -> Self {
        let name = self.name.clone().unwrap_or_else(|| action.to_string());
        let Some(expected) = expected else {
            self.fail(format!("'{}' has no expected outcome", name));
            return self;
        };
        self.operations.push(Operation {
            name,
            reference: self.reference.clone(),
            action,
            expected,
            optional: self.optional_depth > 0,
        });
        self.name_unused = false;
        self
    }

    /// Connect to the device; passes when the connection is established
    pub fn connect(self) -> Self {
        self.push(Action::Connect, Some(ExpectedOutcomes::single(GattStatus::SUCCESS)))
    }

    /// Disconnect from the device; passes when the connection is torn down
    pub fn disconnect(self) -> Self {
        self.push(
            Action::Disconnect,
            Some(ExpectedOutcomes::single(GattStatus::SUCCESS)),
        )
    }

    /// Write `payload` to `target`; any status in `expected` passes
    pub fn write(
        self,
        target: Uuid,
        payload: impl Into<Vec<u8>>,
        expected: impl IntoIterator<Item = GattStatus>,
    ) -> Self {
        let action = Action::Write {
            target,
            payload: payload.into(),
        };
        self.push(action, ExpectedOutcomes::new(expected))
    }

    /// Read `target`; passes on `status` with a value byte-equal to `expected_value`
    pub fn assert_equals(
        self,
        target: Uuid,
        expected_value: impl Into<Vec<u8>>,
        status: GattStatus,
    ) -> Self {
        let action = Action::ReadAssert {
            target,
            expected_value: expected_value.into(),
        };
        self.push(action, Some(ExpectedOutcomes::single(status)))
    }

    /// Declare a sub-sequence that runs only when the optional subset is enabled
    pub fn optional(mut self, declare: impl FnOnce(Self) -> Self) -> Self {
        self.optional_depth += 1;
        let mut builder = declare(self);
        builder.optional_depth -= 1;
        builder
    }

    /// Declare a sub-sequence only when `condition` holds
    pub fn include_if(self, condition: bool, declare: impl FnOnce(Self) -> Self) -> Self {
        if condition {
            declare(self)
        } else {
            self
        }
    }

    /// Bind the service to connect to and an optional session observer
    pub fn set_up(mut self, service: Uuid, observer: Option<Arc<dyn RunObserver>>) -> Self {
        if self.service.is_some() {
            self.fail("set_up called twice".to_string());
            return self;
        }
        self.service = Some(service);
        self.observer = observer;
        self
    }

    /// Freeze the declaration into an immutable script
    pub fn build(self) -> Result<Script> {
        if let Some(reason) = self.error {
            return Err(Error::builder(&self.script, reason));
        }
        if self.name_unused {
            let name = self.name.unwrap_or_default();
            return Err(Error::builder(
                &self.script,
                format!("'{}' declares no action", name),
            ));
        }
        if self.operations.is_empty() {
            return Err(Error::builder(&self.script, "no action declared"));
        }
        let Some(service) = self.service else {
            return Err(Error::builder(&self.script, "no service bound, call set_up"));
        };

        Ok(Script {
            name: self.script,
            service,
            operations: self.operations.into(),
            observer: self.observer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::config_service::{CONFIG_SERVICE, FLAGS, LOCK, LOCK_STATE};

    fn expect_builder_error(result: Result<Script>, needle: &str) {
        match result {
            Err(Error::Builder { reason, .. }) => {
                assert!(reason.contains(needle), "unexpected reason: {}", reason)
            }
            other => panic!("expected builder error, got {:?}", other),
        }
    }

    #[test]
    fn test_metadata_is_sticky_until_next_name() {
        let script = ScriptBuilder::new("lock")
            .name("Locking beacon...")
            .reference("https://example.invalid/#32-lock")
            .write(LOCK, [0u8; 16], [GattStatus::SUCCESS])
            .assert_equals(LOCK_STATE, [1u8], GattStatus::SUCCESS)
            .name("Disconnecting...")
            .disconnect()
            .set_up(CONFIG_SERVICE, None)
            .build()
            .unwrap();

        let ops = script.operations();
        assert_eq!(ops[0].name, "Locking beacon...");
        assert_eq!(ops[1].name, "Locking beacon...");
        assert_eq!(ops[1].reference.as_deref(), Some("https://example.invalid/#32-lock"));
        assert_eq!(ops[2].name, "Disconnecting...");
        assert!(ops[2].reference.is_none());
    }

    #[test]
    fn test_unnamed_action_uses_description() {
        let script = ScriptBuilder::new("anon")
            .write(FLAGS, [0x10u8], [GattStatus::SUCCESS])
            .set_up(CONFIG_SERVICE, None)
            .build()
            .unwrap();
        assert_eq!(script.operations()[0].name, "write flags [10]");
    }

    #[test]
    fn test_optional_section_marks_operations() {
        let script = ScriptBuilder::new("opt")
            .connect()
            .optional(|b| b.name("lock").write(LOCK, [0u8; 16], [GattStatus::SUCCESS]))
            .disconnect()
            .set_up(CONFIG_SERVICE, None)
            .build()
            .unwrap();

        let flags: Vec<bool> = script.operations().iter().map(|op| op.optional).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(script.runnable(false), 2);
        assert_eq!(script.runnable(true), 3);
    }

    #[test]
    fn test_include_if_false_leaves_script_unchanged() {
        let script = ScriptBuilder::new("cond")
            .connect()
            .include_if(false, |b| b.disconnect())
            .set_up(CONFIG_SERVICE, None)
            .build()
            .unwrap();
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn test_build_without_action_fails() {
        expect_builder_error(
            ScriptBuilder::new("empty").set_up(CONFIG_SERVICE, None).build(),
            "no action declared",
        );
    }

    #[test]
    fn test_name_without_action_fails() {
        expect_builder_error(
            ScriptBuilder::new("dangling")
                .connect()
                .name("Try Short Flags")
                .set_up(CONFIG_SERVICE, None)
                .build(),
            "'Try Short Flags' declares no action",
        );
        expect_builder_error(
            ScriptBuilder::new("twice")
                .name("first")
                .name("second")
                .connect()
                .set_up(CONFIG_SERVICE, None)
                .build(),
            "'first' declares no action",
        );
    }

    #[test]
    fn test_set_up_twice_fails() {
        expect_builder_error(
            ScriptBuilder::new("bind")
                .connect()
                .set_up(CONFIG_SERVICE, None)
                .set_up(CONFIG_SERVICE, None)
                .build(),
            "set_up called twice",
        );
    }

    #[test]
    fn test_missing_set_up_fails() {
        expect_builder_error(ScriptBuilder::new("unbound").connect().build(), "no service bound");
    }

    #[test]
    fn test_empty_expected_set_fails() {
        expect_builder_error(
            ScriptBuilder::new("noexp")
                .name("Try Flags")
                .write(FLAGS, [0u8], Vec::new())
                .set_up(CONFIG_SERVICE, None)
                .build(),
            "'Try Flags' has no expected outcome",
        );
    }

    #[test]
    fn test_reference_without_name_fails() {
        expect_builder_error(
            ScriptBuilder::new("ref")
                .reference("https://example.invalid")
                .connect()
                .set_up(CONFIG_SERVICE, None)
                .build(),
            "reference declared before any name",
        );
    }
}
