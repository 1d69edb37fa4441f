//! Conformance test engine
//!
//! Scripts are declared with [`ScriptBuilder`] (or loaded from YAML through
//! [`ScriptFile`]), frozen into an immutable [`Script`], and executed by a
//! [`Sequencer`] against a [`Transport`](crate::transport::Transport). Every
//! evaluated operation lands in the run's [`RunSummary`].

mod builder;
pub mod fixtures;
pub mod library;
mod operation;
mod report;
mod scenario;
mod script;
mod sequencer;

pub use builder::ScriptBuilder;
pub use operation::{Action, ExpectedOutcomes, Observation, Operation, Verdict};
pub use report::{
    AbortReason, AbortRecord, FailureDetail, ReportHandle, Reporter, RunObserver, RunRecord,
    RunSummary,
};
pub use scenario::{ScriptFile, StepAction, StepRecord};
pub use script::Script;
pub use sequencer::{AbortHandle, RunOptions, Sequencer, SequencerState};
