//! Operations: one step against the device plus what it must answer

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::common::to_hex;
use crate::gatt::{config_service, GattStatus};

/// What an operation does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    Connect,
    Disconnect,
    Write {
        target: Uuid,
        #[serde(serialize_with = "hex_bytes")]
        payload: Vec<u8>,
    },
    ReadAssert {
        target: Uuid,
        #[serde(serialize_with = "hex_bytes")]
        expected_value: Vec<u8>,
    },
}

fn hex_bytes<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_hex(bytes))
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Connect => f.write_str("connect"),
            Action::Disconnect => f.write_str("disconnect"),
            Action::Write { target, payload } => write!(
                f,
                "write {} [{}]",
                config_service::describe(target),
                to_hex(payload)
            ),
            Action::ReadAssert {
                target,
                expected_value,
            } => write!(
                f,
                "read {} == [{}]",
                config_service::describe(target),
                to_hex(expected_value)
            ),
        }
    }
}

/// Non-empty set of acceptable statuses, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExpectedOutcomes(Vec<GattStatus>);

impl ExpectedOutcomes {
    /// Build from a list of statuses; `None` if the list is empty
    pub fn new(statuses: impl IntoIterator<Item = GattStatus>) -> Option<Self> {
        let mut unique: Vec<GattStatus> = Vec::new();
        for status in statuses {
            if !unique.contains(&status) {
                unique.push(status);
            }
        }
        (!unique.is_empty()).then_some(Self(unique))
    }

    pub fn single(status: GattStatus) -> Self {
        Self(vec![status])
    }

    pub fn contains(&self, status: GattStatus) -> bool {
        self.0.contains(&status)
    }

    /// First listed outcome
    pub fn primary(&self) -> GattStatus {
        self.0[0]
    }

    pub fn as_slice(&self) -> &[GattStatus] {
        &self.0
    }
}

impl fmt::Display for ExpectedOutcomes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// What the device actually did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub status: GattStatus,
    /// Value read back, for read assertions
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "hex_opt")]
    pub value: Option<Vec<u8>>,
}

fn hex_opt<S: serde::Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(bytes) => serializer.serialize_str(&to_hex(bytes)),
        None => serializer.serialize_none(),
    }
}

impl Observation {
    pub fn status(status: GattStatus) -> Self {
        Self {
            status,
            value: None,
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} [{}]", self.status, to_hex(value)),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Outcome of comparing an observation against an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

/// One immutable step of a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub action: Action,
    pub expected: ExpectedOutcomes,
    /// Part of the optional subset, skipped unless the run includes it
    pub optional: bool,
}

impl Operation {
    /// Compare an observation against this operation's expectations
    ///
    /// A read assertion needs both an accepted status and a byte-equal value.
    pub fn evaluate(&self, observed: &Observation) -> Verdict {
        if !self.expected.contains(observed.status) {
            return Verdict::Fail(format!(
                "expected {}, got {}",
                self.expected, observed.status
            ));
        }

        if let Action::ReadAssert { expected_value, .. } = &self.action {
            match &observed.value {
                Some(value) if value == expected_value => {}
                Some(value) => {
                    return Verdict::Fail(format!(
                        "expected value [{}], got [{}]",
                        to_hex(expected_value),
                        to_hex(value)
                    ))
                }
                None => return Verdict::Fail("no value read back".to_string()),
            }
        }

        Verdict::Pass
    }
}
