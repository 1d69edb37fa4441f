//! Scripted transport
//!
//! Answers every call from a queue of canned responses and records the calls
//! it received. Used by the test-suite and by `run --replay`, which re-evaluates
//! a script against responses captured from a real device.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

use super::{ReadResponse, Transport, TransportError, TransportResult};
use crate::common::{parse_hex, Error, Result};
use crate::gatt::GattStatus;

/// One canned answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A status with no value (writes, connect, disconnect)
    Status(GattStatus),
    /// A status plus the value read back
    Value { status: GattStatus, value: Vec<u8> },
    /// A transport failure
    Fail(TransportError),
    /// Never resolves; exercises the caller's timeout
    Stall,
}

impl Response {
    pub fn ok() -> Self {
        Response::Status(GattStatus::SUCCESS)
    }

    pub fn value(value: impl Into<Vec<u8>>) -> Self {
        Response::Value {
            status: GattStatus::SUCCESS,
            value: value.into(),
        }
    }
}

impl From<GattStatus> for Response {
    fn from(status: GattStatus) -> Self {
        Response::Status(status)
    }
}

/// A call received by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(Uuid),
    Disconnect,
    Write { target: Uuid, payload: Vec<u8> },
    Read(Uuid),
}

/// Shared view of the calls a [`ScriptedTransport`] has received
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    /// Copy of every call received so far, in order
    pub fn snapshot(&self) -> Vec<Call> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|calls| calls.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transport that replays a fixed sequence of responses
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: VecDeque<Response>,
    latency: Option<Duration>,
    calls: CallLog,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = Response>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            latency: None,
            calls: CallLog::default(),
        }
    }

    /// Delay every answer by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Handle to the call log, usable after the transport has been moved
    pub fn calls(&self) -> CallLog {
        self.calls.clone()
    }

    /// Responses not yet consumed
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }

    /// Load responses from a YAML replay file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML list of `{status, value?}` or `{transport_error}` entries
    pub fn from_yaml(content: &str) -> Result<Self> {
        let records: Vec<ReplayRecord> = serde_yaml::from_str(content)?;
        let responses = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                record
                    .into_response()
                    .map_err(|e| Error::Config(format!("Replay entry {}: {}", i + 1, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(responses))
    }

    async fn next(&mut self, call: Call) -> Answer {
        tracing::trace!(?call, "scripted transport call");
        self.calls.push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.responses.pop_front() {
            Some(Response::Status(status)) => Answer::Status(status, None),
            Some(Response::Value { status, value }) => Answer::Status(status, Some(value)),
            Some(Response::Fail(e)) => Answer::Fail(e),
            Some(Response::Stall) => std::future::pending().await,
            None => Answer::Fail(TransportError::Backend(
                "scripted transport has no response left".to_string(),
            )),
        }
    }
}

/// A resolved response
enum Answer {
    Status(GattStatus, Option<Vec<u8>>),
    Fail(TransportError),
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self, service: Uuid) -> TransportResult<()> {
        match self.next(Call::Connect(service)).await {
            Answer::Status(status, _) if status.is_success() => Ok(()),
            Answer::Status(status, _) => Err(TransportError::Backend(format!(
                "connection refused with status {}",
                status
            ))),
            Answer::Fail(e) => Err(e),
        }
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        match self.next(Call::Disconnect).await {
            Answer::Status(..) => Ok(()),
            Answer::Fail(e) => Err(e),
        }
    }

    async fn write_attribute(&mut self, target: Uuid, payload: &[u8]) -> TransportResult<GattStatus> {
        let call = Call::Write {
            target,
            payload: payload.to_vec(),
        };
        match self.next(call).await {
            Answer::Status(status, _) => Ok(status),
            Answer::Fail(e) => Err(e),
        }
    }

    async fn read_attribute(&mut self, target: Uuid) -> TransportResult<ReadResponse> {
        match self.next(Call::Read(target)).await {
            Answer::Status(status, value) => Ok(ReadResponse {
                status,
                value: value.unwrap_or_default(),
            }),
            Answer::Fail(e) => Err(e),
        }
    }
}

/// On-disk form of a replay entry
#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
struct ReplayRecord {
    status: Option<GattStatus>,
    /// Hex-encoded value for reads
    value: Option<String>,
    /// Text of a transport failure; `timeout` and `disconnected` are recognised
    transport_error: Option<String>,
}

impl ReplayRecord {
    fn into_response(self) -> Result<Response> {
        match (self.status, self.value, self.transport_error) {
            (None, None, Some(text)) => Ok(Response::Fail(match text.as_str() {
                "disconnected" => TransportError::Disconnected,
                "timeout" => TransportError::Timeout(Duration::ZERO),
                _ => TransportError::Backend(text),
            })),
            (status, Some(value), None) => Ok(Response::Value {
                status: status.unwrap_or(GattStatus::SUCCESS),
                value: parse_hex(&value)?,
            }),
            (Some(status), None, None) => Ok(Response::Status(status)),
            _ => Err(Error::Config(
                "expected either 'status'/'value' or 'transport_error'".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::config_service::{FLAGS, LOCK_STATE};

    #[tokio::test]
    async fn test_answers_in_order_and_logs_calls() {
        let mut transport = ScriptedTransport::new([
            Response::ok(),
            GattStatus::INVALID_ATTRIBUTE_LENGTH.into(),
            Response::value([0x01]),
        ]);
        let calls = transport.calls();

        transport.connect(FLAGS).await.unwrap();
        let status = transport.write_attribute(FLAGS, &[]).await.unwrap();
        assert_eq!(status, GattStatus::INVALID_ATTRIBUTE_LENGTH);
        let read = transport.read_attribute(LOCK_STATE).await.unwrap();
        assert_eq!(read.value, vec![0x01]);

        assert_eq!(
            calls.snapshot(),
            vec![
                Call::Connect(FLAGS),
                Call::Write {
                    target: FLAGS,
                    payload: vec![]
                },
                Call::Read(LOCK_STATE),
            ]
        );
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_queue_is_transport_failure() {
        let mut transport = ScriptedTransport::default();
        let err = transport.write_attribute(FLAGS, &[0]).await.unwrap_err();
        assert!(matches!(err, TransportError::Backend(_)));
    }

    #[tokio::test]
    async fn test_refused_connect_is_transport_failure() {
        let mut transport = ScriptedTransport::new([Response::Status(GattStatus::FAILURE)]);
        assert!(transport.connect(FLAGS).await.is_err());
    }

    #[test]
    fn test_from_yaml() {
        let transport = ScriptedTransport::from_yaml(
            "- status: SUCCESS\n- status: 0x0d\n- value: \"01\"\n- transport_error: disconnected\n",
        )
        .unwrap();
        assert_eq!(
            transport.responses,
            VecDeque::from(vec![
                Response::ok(),
                Response::Status(GattStatus::INVALID_ATTRIBUTE_LENGTH),
                Response::value([0x01]),
                Response::Fail(TransportError::Disconnected),
            ])
        );
    }

    #[test]
    fn test_from_yaml_rejects_mixed_entry() {
        let err = ScriptedTransport::from_yaml("- status: SUCCESS\n  transport_error: boom\n")
            .unwrap_err();
        assert!(err.to_string().contains("Replay entry 1"));
    }
}
