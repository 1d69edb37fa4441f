//! Run results
//!
//! The reporter is an append-only log. Each record is handed to registered
//! observers as soon as it is appended, so a UI can stream progress, and kept
//! for the final summary. Only the sequencer driving the run writes to it;
//! any number of [`ReportHandle`]s may read it concurrently.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::operation::{Action, ExpectedOutcomes, Observation, Operation, Verdict};
use super::sequencer::SequencerState;
use crate::transport::TransportError;

/// One evaluated operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunRecord {
    /// Position of the operation in the script
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub action: Action,
    pub expected: ExpectedOutcomes,
    pub observed: Observation,
    pub passed: bool,
    /// Why the record failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Milliseconds since the Unix epoch
    #[serde(skip)]
    pub timestamp_ms: u64,
}

impl RunRecord {
    pub(crate) fn new(index: usize, operation: &Operation, observed: Observation) -> Self {
        let verdict = operation.evaluate(&observed);
        Self {
            index,
            name: operation.name.clone(),
            reference: operation.reference.clone(),
            action: operation.action.clone(),
            expected: operation.expected.clone(),
            observed,
            passed: verdict.passed(),
            detail: match verdict {
                Verdict::Pass => None,
                Verdict::Fail(reason) => Some(reason),
            },
            timestamp_ms: now_ms(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "error", rename_all = "snake_case")]
pub enum AbortReason {
    /// The connection to the device failed; nothing after this is meaningful
    Transport(TransportError),
    /// The caller asked the run to stop
    Cancelled,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::Transport(e) => write!(f, "transport failure: {}", e),
            AbortReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Where and why a run was aborted
///
/// Kept apart from [`RunRecord`]s so a lost connection is never mistaken for
/// a device that violated the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbortRecord {
    /// Operation that was in flight or about to be issued; the script length
    /// for a cancel that arrived after the last one
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub reason: AbortReason,
}

/// Diagnostic entry for a failed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub index: usize,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub expected: ExpectedOutcomes,
    pub observed: Observation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<&RunRecord> for FailureDetail {
    fn from(record: &RunRecord) -> Self {
        Self {
            index: record.index,
            name: record.name.clone(),
            reference: record.reference.clone(),
            expected: record.expected.clone(),
            observed: record.observed.clone(),
            detail: record.detail.clone(),
        }
    }
}

/// Final result of one script run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub script: String,
    pub state: SequencerState,
    pub total_passed: usize,
    pub total_failed: usize,
    /// Optional operations left out of the run
    pub skipped: usize,
    pub failures: Vec<FailureDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort: Option<AbortRecord>,
    pub records: Vec<RunRecord>,
}

impl RunSummary {
    /// Every operation ran and passed
    pub fn passed(&self) -> bool {
        self.state == SequencerState::Completed
    }
}

/// Receives results as a run progresses
///
/// Called synchronously from the sequencer; implementations should be quick.
pub trait RunObserver: Send + Sync {
    fn on_record(&self, record: &RunRecord);

    fn on_abort(&self, _abort: &AbortRecord) {}

    fn on_finish(&self, _summary: &RunSummary) {}
}

/// Read-only view of a reporter's log
#[derive(Debug, Clone)]
pub struct ReportHandle(Arc<RwLock<Vec<RunRecord>>>);

impl ReportHandle {
    /// Records appended so far
    pub fn snapshot(&self) -> Vec<RunRecord> {
        match self.0.read() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self.0.read() {
            Ok(records) => records.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only result log for one run
pub struct Reporter {
    script: String,
    records: Arc<RwLock<Vec<RunRecord>>>,
    observers: Vec<Arc<dyn RunObserver>>,
    skipped: usize,
    abort: Option<AbortRecord>,
}

impl Reporter {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            records: Arc::new(RwLock::new(Vec::new())),
            observers: Vec::new(),
            skipped: 0,
            abort: None,
        }
    }

    /// Register an observer for subsequent records
    pub fn observe(&mut self, observer: Arc<dyn RunObserver>) {
        self.observers.push(observer);
    }

    pub fn handle(&self) -> ReportHandle {
        ReportHandle(Arc::clone(&self.records))
    }

    pub(crate) fn append(&mut self, record: RunRecord) {
        for observer in &self.observers {
            observer.on_record(&record);
        }
        match self.records.write() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
    }

    pub(crate) fn skip(&mut self) {
        self.skipped += 1;
    }

    pub(crate) fn abort(&mut self, abort: AbortRecord) {
        for observer in &self.observers {
            observer.on_abort(&abort);
        }
        self.abort = Some(abort);
    }

    /// Close the log and produce the summary
    pub(crate) fn finish(self, state: SequencerState) -> RunSummary {
        let records = self.handle().snapshot();
        let failures: Vec<FailureDetail> = records
            .iter()
            .filter(|record| !record.passed)
            .map(FailureDetail::from)
            .collect();

        let summary = RunSummary {
            script: self.script,
            state,
            total_passed: records.len() - failures.len(),
            total_failed: failures.len(),
            skipped: self.skipped,
            failures,
            abort: self.abort,
            records,
        };

        for observer in &self.observers {
            observer.on_finish(&summary);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatt::config_service::FLAGS;
    use crate::gatt::GattStatus;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl RunObserver for Collect {
        fn on_record(&self, record: &RunRecord) {
            self.0.lock().unwrap().push(record.name.clone());
        }

        fn on_finish(&self, summary: &RunSummary) {
            self.0.lock().unwrap().push(format!("done:{}", summary.total_failed));
        }
    }

    fn op(name: &str) -> Operation {
        Operation {
            name: name.into(),
            reference: Some("https://example.invalid/#13".into()),
            action: Action::Write {
                target: FLAGS,
                payload: vec![],
            },
            expected: ExpectedOutcomes::single(GattStatus::INVALID_ATTRIBUTE_LENGTH),
            optional: false,
        }
    }

    #[test]
    fn test_observers_see_records_in_order() {
        let observer = Arc::new(Collect::default());
        let mut reporter = Reporter::new("flags");
        reporter.observe(observer.clone());
        let handle = reporter.handle();

        reporter.append(RunRecord::new(
            0,
            &op("a"),
            Observation::status(GattStatus::INVALID_ATTRIBUTE_LENGTH),
        ));
        assert_eq!(handle.len(), 1);
        reporter.append(RunRecord::new(1, &op("b"), Observation::status(GattStatus::SUCCESS)));

        let summary = reporter.finish(SequencerState::Failed);
        assert_eq!(summary.total_passed, 1);
        assert_eq!(summary.total_failed, 1);
        assert_eq!(summary.failures[0].name, "b");
        assert_eq!(
            summary.failures[0].reference.as_deref(),
            Some("https://example.invalid/#13")
        );
        assert_eq!(
            *observer.0.lock().unwrap(),
            vec!["a".to_string(), "b".to_string(), "done:1".to_string()]
        );
    }

    #[test]
    fn test_records_survive_a_poisoned_lock() {
        let mut reporter = Reporter::new("flags");
        reporter.append(RunRecord::new(
            0,
            &op("a"),
            Observation::status(GattStatus::INVALID_ATTRIBUTE_LENGTH),
        ));

        let handle = reporter.handle();
        let writer = handle.clone();
        let panicked = std::thread::spawn(move || {
            let _guard = writer.0.write().unwrap();
            panic!("observer panicked while holding the log");
        })
        .join();
        assert!(panicked.is_err());
        assert!(handle.0.is_poisoned());

        assert_eq!(handle.len(), 1);
        assert_eq!(handle.snapshot()[0].name, "a");

        reporter.append(RunRecord::new(1, &op("b"), Observation::status(GattStatus::SUCCESS)));
        let summary = reporter.finish(SequencerState::Failed);
        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.total_failed, 1);
    }

    #[test]
    fn test_summary_serializes_without_timestamps() {
        let mut reporter = Reporter::new("flags");
        reporter.append(RunRecord::new(
            0,
            &op("a"),
            Observation::status(GattStatus::INVALID_ATTRIBUTE_LENGTH),
        ));
        let summary = reporter.finish(SequencerState::Completed);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["state"], "completed");
        assert_eq!(json["records"][0]["expected"][0], "INVALID_ATTRIBUTE_LENGTH");
        assert!(json["records"][0].get("timestamp_ms").is_none());
    }
}
