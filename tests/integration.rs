//! End-to-end tests for the validator
//!
//! These tests drive complete scripts through the sequencer against a
//! scripted transport, then run the CLI binary in replay mode.

use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use validator::gatt::config_service::{CONFIG_SERVICE, FLAGS, LOCK, LOCK_STATE, POWER_MODE};
use validator::gatt::GattStatus;
use validator::testing::library::{self, LibraryContext};
use validator::testing::{
    AbortReason, Action, RunObserver, RunOptions, RunRecord, Script, ScriptBuilder, ScriptFile,
    Sequencer, SequencerState,
};
use validator::transport::scripted::Call;
use validator::transport::{Response, ScriptedTransport, TransportError};

const KEY: [u8; 16] = [0; 16];

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// The response a conforming device gives: the first listed expected outcome,
/// with the expected value for read-backs
fn first_expected(script: &Script) -> Vec<Response> {
    script
        .operations()
        .iter()
        .map(|op| match &op.action {
            Action::ReadAssert { expected_value, .. } => Response::Value {
                status: op.expected.primary(),
                value: expected_value.clone(),
            },
            _ => Response::Status(op.expected.primary()),
        })
        .collect()
}

async fn run(script: Script, responses: Vec<Response>, options: RunOptions) -> validator::RunSummary {
    let mut sequencer = Sequencer::new(ScriptedTransport::new(responses), options);
    sequencer.run(script).await
}

fn with_optional() -> RunOptions {
    RunOptions {
        include_optional: true,
        ..RunOptions::default()
    }
}

// ============== Library scripts ==============

#[tokio::test]
async fn test_spec_suite_passes_against_conforming_device() {
    for include_optional in [false, true] {
        let ctx = LibraryContext {
            include_optional,
            observer: None,
        };
        let script = library::spec_tests(&ctx).unwrap();
        let responses = first_expected(&script);
        let total = script.len();

        let options = RunOptions {
            include_optional,
            ..RunOptions::default()
        };
        let summary = run(script, responses, options).await;

        assert_eq!(summary.state, SequencerState::Completed);
        assert_eq!(summary.total_passed, total);
        assert_eq!(summary.total_failed, 0);
        assert!(summary.abort.is_none());
        assert!(summary.records.iter().all(|r| r.passed));
    }
}

#[tokio::test]
async fn test_optional_operations_skipped_when_not_requested() {
    let ctx = LibraryContext {
        include_optional: true,
        observer: None,
    };
    let script = library::spec_tests(&ctx).unwrap();
    let required: Vec<Response> = script
        .operations()
        .iter()
        .filter(|op| !op.optional)
        .map(|op| Response::Status(op.expected.primary()))
        .collect();
    let skipped = script.len() - required.len();

    let summary = run(script, required, RunOptions::default()).await;

    assert_eq!(summary.state, SequencerState::Completed);
    assert_eq!(summary.skipped, skipped);
    assert_eq!(summary.records.len(), 14);
}

// ============== Multi-outcome acceptance ==============

#[tokio::test]
async fn test_any_listed_outcome_passes_and_others_fail() {
    let either = [
        GattStatus::INSUFFICIENT_AUTHORIZATION,
        GattStatus::INVALID_ATTRIBUTE_LENGTH,
    ];
    let script = || {
        ScriptBuilder::new("either")
            .name("Locked: Try Short Flags")
            .write(FLAGS, [0u8; 0], either)
            .set_up(CONFIG_SERVICE, None)
            .build()
            .unwrap()
    };

    for status in either {
        let summary = run(script(), vec![status.into()], RunOptions::default()).await;
        assert!(summary.records[0].passed, "{} should be accepted", status);
    }

    let summary = run(
        script(),
        vec![GattStatus::SUCCESS.into()],
        RunOptions::default(),
    )
    .await;
    assert_eq!(summary.state, SequencerState::Failed);
    assert_eq!(summary.records.len(), 1);
    assert!(!summary.records[0].passed);
    assert_eq!(summary.failures[0].observed.status, GattStatus::SUCCESS);
}

// ============== Sequencing determinism ==============

#[tokio::test]
async fn test_record_order_matches_declaration_regardless_of_latency() {
    let ctx = LibraryContext::default();
    let script = library::spec_tests(&ctx).unwrap();
    let declared: Vec<String> = script.operations().iter().map(|op| op.name.clone()).collect();

    for latency in [Duration::ZERO, Duration::from_millis(3)] {
        let transport =
            ScriptedTransport::new(first_expected(&script)).with_latency(latency);
        let mut sequencer = Sequencer::new(transport, RunOptions::default());
        let summary = sequencer.run(script.clone()).await;

        let recorded: Vec<String> = summary.records.iter().map(|r| r.name.clone()).collect();
        assert_eq!(recorded, declared);
        let indices: Vec<usize> = summary.records.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..declared.len()).collect::<Vec<_>>());
    }
}

// ============== Abort containment ==============

#[tokio::test]
async fn test_no_record_after_transport_failure() {
    let ctx = LibraryContext::default();
    let script = library::spec_tests(&ctx).unwrap();
    let mut responses = first_expected(&script);
    responses.truncate(5);
    responses.push(Response::Fail(TransportError::Disconnected));

    let summary = run(script, responses, RunOptions::default()).await;

    assert_eq!(summary.state, SequencerState::Aborted { index: 5 });
    assert_eq!(summary.records.len(), 5);
    assert!(summary.records.iter().all(|r| r.index < 5));
    let abort = summary.abort.unwrap();
    assert_eq!(abort.index, 5);
    assert_eq!(abort.reason, AbortReason::Transport(TransportError::Disconnected));
    assert!(abort.reference.is_some());
}

#[tokio::test]
async fn test_abort_handle_stops_before_next_operation() {
    struct AbortAfter {
        handle: validator::testing::AbortHandle,
        after: usize,
        seen: Mutex<usize>,
    }

    impl RunObserver for AbortAfter {
        fn on_record(&self, _record: &RunRecord) {
            let mut seen = self.seen.lock().unwrap();
            *seen += 1;
            if *seen == self.after {
                self.handle.abort();
            }
        }
    }

    let ctx = LibraryContext::default();
    let script = library::spec_tests(&ctx).unwrap();
    let transport = ScriptedTransport::new(first_expected(&script));
    let calls = transport.calls();
    let mut sequencer = Sequencer::new(transport, RunOptions::default());
    sequencer.observe(Arc::new(AbortAfter {
        handle: sequencer.abort_handle(),
        after: 3,
        seen: Mutex::new(0),
    }));

    let summary = sequencer.run(script).await;

    assert_eq!(summary.state, SequencerState::Aborted { index: 3 });
    assert_eq!(summary.records.len(), 3);
    assert_eq!(summary.abort.unwrap().reason, AbortReason::Cancelled);
    assert_eq!(calls.len(), 3);
}

// ============== Idempotent evaluation ==============

#[tokio::test]
async fn test_identical_responses_give_identical_results() {
    let ctx = LibraryContext {
        include_optional: true,
        observer: None,
    };
    let script = library::spec_tests(&ctx).unwrap();
    let mut responses = first_expected(&script);
    // One deviation so the failure list is exercised too
    responses[3] = GattStatus::SUCCESS.into();

    let first = run(script.clone(), responses.clone(), with_optional()).await;
    let second = run(script, responses, with_optional()).await;

    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.total_failed, 1);
}

// ============== Concrete scenarios ==============

#[tokio::test]
async fn test_short_write_rejected() {
    let script = ScriptBuilder::new("short write rejected")
        .connect()
        .write(FLAGS, [0u8], [GattStatus::INVALID_ATTRIBUTE_LENGTH])
        .set_up(CONFIG_SERVICE, None)
        .build()
        .unwrap();

    let summary = run(
        script,
        vec![Response::ok(), GattStatus::INVALID_ATTRIBUTE_LENGTH.into()],
        RunOptions::default(),
    )
    .await;

    assert_eq!(summary.records.len(), 2);
    assert!(summary.records.iter().all(|r| r.passed));
    assert_eq!(summary.total_failed, 0);
    assert_eq!(summary.state, SequencerState::Completed);
}

#[tokio::test]
async fn test_lock_gates_writes() {
    let script = || {
        ScriptBuilder::new("lock gates writes")
            .write(LOCK, KEY, [GattStatus::SUCCESS])
            .write(FLAGS, [0x10u8], [GattStatus::INSUFFICIENT_AUTHORIZATION])
            .set_up(CONFIG_SERVICE, None)
            .build()
            .unwrap()
    };

    let gated = run(
        script(),
        vec![Response::ok(), GattStatus::INSUFFICIENT_AUTHORIZATION.into()],
        RunOptions::default(),
    )
    .await;
    assert_eq!(gated.total_passed, 2);
    assert_eq!(gated.state, SequencerState::Completed);

    let ungated = run(
        script(),
        vec![Response::ok(), Response::ok()],
        RunOptions::default(),
    )
    .await;
    assert!(ungated.records[0].passed);
    assert!(!ungated.records[1].passed);
    assert_eq!(ungated.failures.len(), 1);
    let failure = &ungated.failures[0];
    assert_eq!(failure.observed.status, GattStatus::SUCCESS);
    assert_eq!(
        failure.expected.as_slice(),
        &[GattStatus::INSUFFICIENT_AUTHORIZATION]
    );
}

#[tokio::test]
async fn test_disconnect_mid_script() {
    let script = ScriptBuilder::new("disconnect mid-script")
        .connect()
        .write(POWER_MODE, [0x01u8], [GattStatus::SUCCESS])
        .disconnect()
        .set_up(CONFIG_SERVICE, None)
        .build()
        .unwrap();

    let transport = ScriptedTransport::new([
        Response::ok(),
        Response::Fail(TransportError::Timeout(Duration::from_secs(10))),
        Response::ok(),
    ]);
    let calls = transport.calls();
    let mut sequencer = Sequencer::new(transport, RunOptions::default());
    let summary = sequencer.run(script).await;

    assert_eq!(summary.records.len(), 1);
    assert!(summary.records[0].passed);
    assert_eq!(summary.records[0].action, Action::Connect);
    assert_eq!(summary.state, SequencerState::Aborted { index: 1 });
    assert!(!calls.snapshot().contains(&Call::Disconnect));
    assert_eq!(sequencer.into_transport().remaining(), 1);
}

#[tokio::test]
async fn test_stalled_device_times_out_and_aborts() {
    let script = ScriptBuilder::new("stall")
        .connect()
        .assert_equals(LOCK_STATE, [0u8], GattStatus::SUCCESS)
        .disconnect()
        .set_up(CONFIG_SERVICE, None)
        .build()
        .unwrap();

    let timeout = Duration::from_millis(50);
    let options = RunOptions {
        operation_timeout: timeout,
        ..RunOptions::default()
    };
    let summary = run(script, vec![Response::ok(), Response::Stall], options).await;

    assert_eq!(summary.state, SequencerState::Aborted { index: 1 });
    assert_eq!(
        summary.abort.unwrap().reason,
        AbortReason::Transport(TransportError::Timeout(timeout))
    );
}

// ============== Script files ==============

#[tokio::test]
async fn test_script_file_runs_against_replay() {
    let script = ScriptFile::load(&fixtures_dir().join("lock_gate.yaml"))
        .unwrap()
        .into_script(None)
        .unwrap();
    assert_eq!(script.len(), 6);

    let responses = vec![
        Response::ok(),
        Response::ok(),
        Response::value([0x01]),
        GattStatus::INSUFFICIENT_AUTHORIZATION.into(),
        Response::ok(),
        Response::ok(),
    ];
    let summary = run(script, responses, RunOptions::default()).await;

    assert_eq!(summary.state, SequencerState::Completed);
    // The read-back inherits the lock step's name and reference
    assert_eq!(summary.records[2].name, "Locking beacon...");
    assert!(summary.records[2].reference.is_some());
}

#[tokio::test]
async fn test_read_back_mismatch_reports_value() {
    let script = ScriptFile::load(&fixtures_dir().join("lock_gate.yaml"))
        .unwrap()
        .into_script(None)
        .unwrap();
    let responses = vec![
        Response::ok(),
        Response::ok(),
        Response::value([0x00]),
        GattStatus::INSUFFICIENT_AUTHORIZATION.into(),
        Response::ok(),
        Response::ok(),
    ];
    let summary = run(script, responses, RunOptions::default()).await;

    assert_eq!(summary.state, SequencerState::Failed);
    assert_eq!(summary.total_failed, 1);
    assert_eq!(summary.failures[0].index, 2);
    assert_eq!(summary.failures[0].observed.value.as_deref(), Some(&[0x00u8][..]));
}

// ============== CLI ==============

fn validator_cmd(config_home: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_uribeacon-validator"));
    cmd.env("XDG_CONFIG_HOME", config_home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_replay_compliant_device_exits_zero() {
    let home = tempfile::tempdir().unwrap();
    let output = validator_cmd(home.path())
        .args(["run", "--replay"])
        .arg(fixtures_dir().join("compliant.yaml"))
        .output()
        .expect("Failed to run validator");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {}", stdout);
    assert!(stdout.contains("All operations passed"), "stdout: {}", stdout);
}

#[test]
fn test_cli_replay_json_reports_failure_and_exits_one() {
    let home = tempfile::tempdir().unwrap();
    let replay = home.path().join("short.yaml");
    // Connect, then the device accepts an over-long URI
    std::fs::write(&replay, "- status: SUCCESS\n- status: SUCCESS\n- transport_error: disconnected\n")
        .unwrap();

    let output = validator_cmd(home.path())
        .args(["run", "--json", "--replay"])
        .arg(&replay)
        .output()
        .expect("Failed to run validator");

    assert_eq!(output.status.code(), Some(1));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["script"], "Spec UriBeacon Tests");
    assert_eq!(summary["total_passed"], 1);
    assert_eq!(summary["total_failed"], 1);
    assert_eq!(summary["failures"][0]["name"], "Try Long UriData");
    assert_eq!(summary["abort"]["index"], 2);
    assert_eq!(summary["abort"]["reason"]["kind"], "transport");
}

#[test]
fn test_cli_rejects_zero_timeout() {
    let home = tempfile::tempdir().unwrap();
    let output = validator_cmd(home.path())
        .args(["run", "--timeout", "0", "--replay"])
        .arg(fixtures_dir().join("compliant.yaml"))
        .output()
        .expect("Failed to run validator");

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--timeout"));
}

#[test]
fn test_cli_show_lists_operations() {
    let home = tempfile::tempdir().unwrap();
    let output = validator_cmd(home.path())
        .args(["show", "--optional"])
        .output()
        .expect("Failed to run validator");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Locked: Try Long Power Mode"));
    assert!(stdout.contains("54 operations"));
}

#[test]
fn test_cli_unknown_suite_fails() {
    let home = tempfile::tempdir().unwrap();
    let output = validator_cmd(home.path())
        .args(["show", "--suite", "nonexistent"])
        .output()
        .expect("Failed to run validator");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown test suite"));
}
