//! Script execution
//!
//! The sequencer issues one transport request at a time, waits for it to
//! resolve, records the verdict, and only then issues the next. Later
//! operations depend on device state changed by earlier ones (lock/unlock),
//! so the order is total and never overlapped.
//!
//! Assertion failures are recorded and the run continues, so one pass
//! enumerates every deviation. A transport failure (disconnect, timeout,
//! undecodable response) aborts: nothing after a severed session means
//! anything, so the remaining operations are not attempted and the failing
//! operation produces no record, only an abort marker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::Instrument;

use super::operation::{Action, Observation, Operation};
use super::report::{
    AbortReason, AbortRecord, ReportHandle, Reporter, RunObserver, RunRecord, RunSummary,
};
use super::script::Script;
use crate::gatt::GattStatus;
use crate::transport::{Transport, TransportError, TransportResult};

/// Where the sequencer is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    /// No script bound
    Idle,
    /// Waiting on the operation at `index`
    Running { index: usize },
    /// Every operation ran and passed
    Completed,
    /// Every operation ran, at least one did not pass
    Failed,
    /// Stopped before the operation at `index`; the script length when the
    /// cancel arrived after the last issued operation
    Aborted { index: usize },
}

/// Per-run policy
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// How long a single request may stay unresolved before the run aborts
    pub operation_timeout: Duration,
    /// Budget for a connect, which includes service discovery
    pub connect_timeout: Duration,
    /// Run operations declared optional
    pub include_optional: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(20),
            include_optional: false,
        }
    }
}

/// Cooperative cancel token for a running script
///
/// Takes effect before the next request is issued; an in-flight request is
/// always allowed to resolve (or time out) first.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs scripts against one transport session
pub struct Sequencer<T: Transport> {
    transport: T,
    options: RunOptions,
    state: watch::Sender<SequencerState>,
    abort: AbortHandle,
    observers: Vec<Arc<dyn RunObserver>>,
    report: Option<ReportHandle>,
}

impl<T: Transport> Sequencer<T> {
    pub fn new(transport: T, options: RunOptions) -> Self {
        let (state, _) = watch::channel(SequencerState::Idle);
        Self {
            transport,
            options,
            state,
            abort: AbortHandle::default(),
            observers: Vec::new(),
            report: None,
        }
    }

    /// Register an observer for every run of this sequencer
    pub fn observe(&mut self, observer: Arc<dyn RunObserver>) {
        self.observers.push(observer);
    }

    pub fn state(&self) -> SequencerState {
        *self.state.borrow()
    }

    /// Follow state changes from another task
    pub fn subscribe(&self) -> watch::Receiver<SequencerState> {
        self.state.subscribe()
    }

    /// Token that stops the current (or next) run cooperatively
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Read access to the log of the current or most recent run
    pub fn report(&self) -> Option<ReportHandle> {
        self.report.clone()
    }

    /// Give the transport back, e.g. to close a session left open by an abort
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn set_state(&self, state: SequencerState) {
        self.state.send_replace(state);
    }

    /// Execute every operation of `script` in order and summarise the run
    ///
    /// A cancel requested before the run starts is honoured immediately; a
    /// new run always begins with a cleared token otherwise.
    pub async fn run(&mut self, script: Script) -> RunSummary {
        let span = tracing::info_span!("run", script = %script.name());
        self.run_inner(script).instrument(span).await
    }

    async fn run_inner(&mut self, script: Script) -> RunSummary {
        let mut reporter = Reporter::new(script.name());
        for observer in self.observers.iter().chain(script.observer()) {
            reporter.observe(Arc::clone(observer));
        }
        self.report = Some(reporter.handle());

        tracing::info!(
            operations = script.len(),
            runnable = script.runnable(self.options.include_optional),
            service = %script.service(),
            "starting script"
        );

        for (index, operation) in script.operations().iter().enumerate() {
            if operation.optional && !self.options.include_optional {
                tracing::debug!(index, name = %operation.name, "skipping optional operation");
                reporter.skip();
                continue;
            }

            if self.abort.is_aborted() {
                tracing::warn!(index, name = %operation.name, "run cancelled");
                return self.finish_aborted(
                    reporter,
                    index,
                    operation.name.clone(),
                    operation.reference.clone(),
                    AbortReason::Cancelled,
                );
            }

            self.set_state(SequencerState::Running { index });
            tracing::debug!(index, name = %operation.name, action = %operation.action, "issuing");

            let observed = match self.execute(&script, operation).await {
                Ok(observed) => observed,
                Err(e) => {
                    tracing::warn!(index, name = %operation.name, error = %e, "transport failure, aborting");
                    return self.finish_aborted(
                        reporter,
                        index,
                        operation.name.clone(),
                        operation.reference.clone(),
                        AbortReason::Transport(e),
                    );
                }
            };

            let record = RunRecord::new(index, operation, observed);
            if record.passed {
                tracing::info!(index, name = %record.name, observed = %record.observed, "pass");
            } else {
                tracing::warn!(
                    index,
                    name = %record.name,
                    expected = %record.expected,
                    observed = %record.observed,
                    "fail"
                );
            }
            reporter.append(record);
        }

        // A cancel that arrived while the last request was in flight, or with
        // only skipped operations left, still ends the run as aborted
        if self.abort.is_aborted() {
            tracing::warn!("run cancelled after the last operation");
            return self.finish_aborted(
                reporter,
                script.len(),
                "end of script".to_string(),
                None,
                AbortReason::Cancelled,
            );
        }

        let handle = reporter.handle();
        let state = if handle.snapshot().iter().all(|record| record.passed) {
            SequencerState::Completed
        } else {
            SequencerState::Failed
        };
        self.set_state(state);
        self.abort.reset();

        let summary = reporter.finish(state);
        tracing::info!(
            passed = summary.total_passed,
            failed = summary.total_failed,
            skipped = summary.skipped,
            "script finished"
        );
        summary
    }

    fn finish_aborted(
        &mut self,
        mut reporter: Reporter,
        index: usize,
        name: String,
        reference: Option<String>,
        reason: AbortReason,
    ) -> RunSummary {
        reporter.abort(AbortRecord {
            index,
            name,
            reference,
            reason,
        });
        let state = SequencerState::Aborted { index };
        self.set_state(state);
        self.abort.reset();
        reporter.finish(state)
    }

    /// Issue the request for one operation and wait for it to resolve
    async fn execute(&mut self, script: &Script, operation: &Operation) -> TransportResult<Observation> {
        let timeout = match operation.action {
            Action::Connect => self.options.connect_timeout,
            _ => self.options.operation_timeout,
        };
        let service = script.service();
        let transport = &mut self.transport;
        let request = async move {
            match &operation.action {
                Action::Connect => transport
                    .connect(service)
                    .await
                    .map(|()| Observation::status(GattStatus::SUCCESS)),
                Action::Disconnect => transport
                    .disconnect()
                    .await
                    .map(|()| Observation::status(GattStatus::SUCCESS)),
                Action::Write { target, payload } => transport
                    .write_attribute(*target, payload)
                    .await
                    .map(Observation::status),
                Action::ReadAssert { target, .. } => {
                    transport.read_attribute(*target).await.map(|read| Observation {
                        status: read.status,
                        value: Some(read.value),
                    })
                }
            }
        };

        match tokio::time::timeout(timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }
}
