//! Script files
//!
//! Defines the YAML form of a script so suites can be written without
//! recompiling. Loading validates everything the builder would.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::builder::ScriptBuilder;
use super::report::RunObserver;
use super::script::Script;
use crate::common::{parse_hex, Error, Result};
use crate::gatt::{config_service, GattStatus};

/// A complete script loaded from a YAML file
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct ScriptFile {
    /// Name of the script
    pub name: String,
    /// Optional description of what the script verifies
    pub description: Option<String>,
    /// Service to bind to (UUID); defaults to the UriBeacon configuration service
    pub service: Option<String>,
    /// The steps to execute, in order
    pub steps: Vec<StepRecord>,
}

/// One step of a script file
#[derive(Deserialize, Debug)]
pub struct StepRecord {
    /// Display name; steps without one share the previous step's name
    pub name: Option<String>,
    /// Documentation link shown when the step fails
    pub reference: Option<String>,
    /// Part of the optional subset
    #[serde(default)]
    pub optional: bool,
    #[serde(flatten)]
    pub action: StepAction,
    /// Acceptable statuses (default: SUCCESS)
    pub expect: Option<Vec<GattStatus>>,
}

/// What a step does
///
/// Receives every key the step itself does not know, so a misspelled key is
/// rejected here rather than dropped.
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum StepAction {
    Connect {},
    Disconnect {},
    Write {
        /// Characteristic alias or UUID
        target: String,
        /// Hex-encoded payload
        payload: String,
    },
    ReadAssert {
        /// Characteristic alias or UUID
        target: String,
        /// Hex-encoded expected value
        value: String,
    },
}

impl ScriptFile {
    /// Load and parse a script file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read script '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse script: {}", e)))
    }

    /// Turn the file into a runnable script
    pub fn into_script(self, observer: Option<Arc<dyn RunObserver>>) -> Result<Script> {
        let service = match &self.service {
            Some(uuid) => uuid::Uuid::parse_str(uuid)
                .map_err(|e| Error::Config(format!("Invalid service UUID '{}': {}", uuid, e)))?,
            None => config_service::CONFIG_SERVICE,
        };

        let mut builder = ScriptBuilder::new(&self.name);
        for (i, step) in self.steps.into_iter().enumerate() {
            builder = add_step(builder, step)
                .map_err(|e| Error::Config(format!("Step {}: {}", i + 1, e)))?;
        }
        builder.set_up(service, observer).build()
    }
}

fn add_step(builder: ScriptBuilder, step: StepRecord) -> Result<ScriptBuilder> {
    let expected = step.expect.unwrap_or_else(|| vec![GattStatus::SUCCESS]);
    let action = match step.action {
        StepAction::Connect {} => Resolved::Connect,
        StepAction::Disconnect {} => Resolved::Disconnect,
        StepAction::Write { target, payload } => Resolved::Write {
            target: config_service::resolve(&target)?,
            payload: parse_hex(&payload)?,
            expected,
        },
        StepAction::ReadAssert { target, value } => {
            let [status] = expected.as_slice() else {
                return Err(Error::Config(
                    "read_assert takes exactly one expected status".to_string(),
                ));
            };
            Resolved::ReadAssert {
                target: config_service::resolve(&target)?,
                value: parse_hex(&value)?,
                status: *status,
            }
        }
    };

    let mut builder = builder;
    if let Some(name) = step.name {
        builder = builder.name(name);
    }
    if let Some(reference) = step.reference {
        builder = builder.reference(reference);
    }

    let declare = |b: ScriptBuilder| match action {
        Resolved::Connect => b.connect(),
        Resolved::Disconnect => b.disconnect(),
        Resolved::Write {
            target,
            payload,
            expected,
        } => b.write(target, payload, expected),
        Resolved::ReadAssert {
            target,
            value,
            status,
        } => b.assert_equals(target, value, status),
    };

    Ok(if step.optional {
        builder.optional(declare)
    } else {
        declare(builder)
    })
}

/// A step with its target and payload decoded
enum Resolved {
    Connect,
    Disconnect,
    Write {
        target: uuid::Uuid,
        payload: Vec<u8>,
        expected: Vec<GattStatus>,
    },
    ReadAssert {
        target: uuid::Uuid,
        value: Vec<u8>,
        status: GattStatus,
    },
}
