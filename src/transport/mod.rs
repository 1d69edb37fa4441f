//! Transport boundary to the device under test
//!
//! A transport provides four capabilities: connect, disconnect, write a
//! characteristic and read a characteristic. Each call resolves exactly once.
//! A returned [`GattStatus`] is what the device said, even when it is an
//! error status; a [`TransportError`] means we never got a usable answer.

pub mod scripted;

#[cfg(feature = "ble")]
pub mod ble;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::gatt::GattStatus;

pub use scripted::{Response, ScriptedTransport};

/// A failure below the protocol level. Always aborts a run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportError {
    #[error("device disconnected")]
    Disconnected,

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("attribute {0} not found on device")]
    NotFound(Uuid),

    #[error("{0}")]
    Backend(String),
}

/// Result of a single transport call
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// What the device answered to a read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadResponse {
    pub status: GattStatus,
    pub value: Vec<u8>,
}

/// Asynchronous capability set of the device under test
///
/// Implementations must not retry on their own account unless that is an
/// explicit part of their contract; the sequencer executes every operation
/// exactly once.
#[async_trait]
pub trait Transport: Send {
    /// Connect to the device and bind to `service`
    async fn connect(&mut self, service: Uuid) -> TransportResult<()>;

    /// Tear down the connection
    async fn disconnect(&mut self) -> TransportResult<()>;

    /// Write `payload` to characteristic `target`
    async fn write_attribute(&mut self, target: Uuid, payload: &[u8]) -> TransportResult<GattStatus>;

    /// Read characteristic `target`
    async fn read_attribute(&mut self, target: Uuid) -> TransportResult<ReadResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn connect(&mut self, service: Uuid) -> TransportResult<()> {
        (**self).connect(service).await
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        (**self).disconnect().await
    }

    async fn write_attribute(&mut self, target: Uuid, payload: &[u8]) -> TransportResult<GattStatus> {
        (**self).write_attribute(target, payload).await
    }

    async fn read_attribute(&mut self, target: Uuid) -> TransportResult<ReadResponse> {
        (**self).read_attribute(target).await
    }
}
