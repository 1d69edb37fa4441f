//! CLI command handling
//!
//! Builds the script, opens the transport, runs the sequencer and formats
//! the results.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::commands::Commands;
use crate::common::config::{Config, Timeouts};
use crate::common::Result;
use crate::testing::library::{self, LibraryContext};
use crate::testing::{
    AbortReason, AbortRecord, RunObserver, RunOptions, RunRecord, RunSummary, Script, ScriptFile, Sequencer,
    SequencerState,
};
use crate::transport::{ScriptedTransport, Transport};

/// Dispatch a CLI command
///
/// Returns `Ok(false)` when a run finished but did not pass.
pub async fn dispatch(command: Commands) -> Result<bool> {
    match command {
        Commands::Run {
            suite,
            script,
            device,
            optional,
            timeout,
            replay,
            json,
        } => {
            let config = Config::load()?;
            let include_optional = optional || config.run.include_optional;
            let options = RunOptions {
                operation_timeout: timeout
                    .map(Duration::from_secs)
                    .unwrap_or_else(|| config.timeouts.operation()),
                connect_timeout: config.timeouts.connect(),
                include_optional,
            };

            let console = (!json).then(|| Arc::new(ConsoleObserver::new()));
            let ctx = LibraryContext {
                include_optional,
                observer: console
                    .clone()
                    .map(|c| c as Arc<dyn RunObserver>),
            };
            let script = load_script(&suite, script.as_deref(), &ctx)?;

            let device = device.or(config.device.filter);
            let transport = open_transport(replay.as_deref(), device.as_deref(), &config.timeouts).await?;

            if let Some(console) = &console {
                print_header(&script, &options);
                console.start(script.runnable(include_optional) as u64);
            }

            let summary = run_script(transport, script, options).await;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&summary);
            }
            Ok(summary.passed())
        }

        Commands::List => {
            println!("Available suites:");
            for suite in library::suites() {
                println!("  {:8} - {}", suite.id, suite.name);
                println!("             {}", suite.description.dimmed());
            }
            Ok(true)
        }

        Commands::Show {
            suite,
            script,
            optional,
        } => {
            let ctx = LibraryContext {
                include_optional: optional,
                observer: None,
            };
            let script = load_script(&suite, script.as_deref(), &ctx)?;
            print_script(&script);
            Ok(true)
        }

        #[cfg(feature = "ble")]
        Commands::Scan { duration } => {
            let devices = crate::transport::ble::scan(Duration::from_secs(duration)).await?;
            if devices.is_empty() {
                println!("No devices found");
                return Ok(true);
            }
            for device in &devices {
                let marker = if device.configurable {
                    "config".green().to_string()
                } else {
                    String::new()
                };
                println!(
                    "  {:17}  {:>4}  {} {}",
                    device.address,
                    device.rssi.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
                    device.name,
                    marker
                );
            }
            Ok(true)
        }
    }
}

fn load_script(suite: &str, script: Option<&Path>, ctx: &LibraryContext) -> Result<Script> {
    match script {
        Some(path) => ScriptFile::load(path)?.into_script(ctx.observer.clone()),
        None => library::load(suite, ctx),
    }
}

async fn open_transport(
    replay: Option<&Path>,
    device: Option<&str>,
    timeouts: &Timeouts,
) -> Result<Box<dyn Transport>> {
    if let Some(path) = replay {
        tracing::info!(path = %path.display(), "replaying recorded responses");
        return Ok(Box::new(ScriptedTransport::from_file(path)?));
    }
    open_device(device, timeouts).await
}

#[cfg(feature = "ble")]
async fn open_device(device: Option<&str>, timeouts: &Timeouts) -> Result<Box<dyn Transport>> {
    let transport = crate::transport::ble::BleTransport::discover(device, timeouts).await?;
    println!("Device: {}", transport.label().cyan());
    Ok(Box::new(transport))
}

#[cfg(not(feature = "ble"))]
async fn open_device(_device: Option<&str>, _timeouts: &Timeouts) -> Result<Box<dyn Transport>> {
    Err(crate::common::Error::BleUnavailable)
}

/// Run with Ctrl-C wired to the abort handle
async fn run_script(transport: Box<dyn Transport>, script: Script, options: RunOptions) -> RunSummary {
    let mut sequencer = Sequencer::new(transport, options);

    let abort = sequencer.abort_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, stopping after the current operation");
            abort.abort();
        }
    });

    let summary = sequencer.run(script).await;
    interrupt.abort();

    // A cancelled run may leave the session open; a transport abort means it is gone already
    if let Some(abort) = &summary.abort {
        if matches!(abort.reason, AbortReason::Cancelled) {
            let mut transport = sequencer.into_transport();
            if let Err(e) = transport.disconnect().await {
                tracing::debug!(error = %e, "disconnect after cancel failed");
            }
        }
    }
    summary
}

/// Streams results to the terminal while a run progresses
struct ConsoleObserver {
    pb: ProgressBar,
}

impl ConsoleObserver {
    fn new() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }

    fn start(&self, total: u64) {
        self.pb.set_length(total);
        self.pb
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            self.pb.set_style(style.progress_chars("=> "));
        }
    }
}

impl RunObserver for ConsoleObserver {
    fn on_record(&self, record: &RunRecord) {
        if record.passed {
            self.pb.println(format!(
                "  {} {} {}",
                "✓".green(),
                record.name,
                record.action.to_string().dimmed()
            ));
        } else {
            self.pb.println(format!(
                "  {} {} {}",
                "✗".red(),
                record.name.red(),
                record.action.to_string().dimmed()
            ));
            if let Some(detail) = &record.detail {
                self.pb.println(format!("      {}", detail));
            }
        }
        self.pb.inc(1);
        self.pb.set_message(record.name.clone());
    }

    fn on_abort(&self, abort: &AbortRecord) {
        self.pb.println(format!(
            "  {} {} {}",
            "!".yellow().bold(),
            abort.name.yellow(),
            abort.reason.to_string().dimmed()
        ));
    }

    fn on_finish(&self, _summary: &RunSummary) {
        self.pb.finish_and_clear();
    }
}

fn print_header(script: &Script, options: &RunOptions) {
    println!(
        "\n{} {}",
        "Running Script:".blue().bold(),
        script.name().white().bold()
    );
    println!(
        "  {} operations, timeout {:?}{}\n",
        script.runnable(options.include_optional),
        options.operation_timeout,
        if options.include_optional {
            ", optional tests included"
        } else {
            ""
        }
    );
}

fn print_summary(summary: &RunSummary) {
    println!();
    match summary.state {
        SequencerState::Completed => println!(
            "{} {}",
            "✓".green().bold(),
            "All operations passed".green().bold()
        ),
        SequencerState::Failed => println!(
            "{} {}",
            "✗".red().bold(),
            "Device deviates from the configuration service".red().bold()
        ),
        SequencerState::Aborted { index } => println!(
            "{} {}",
            "!".yellow().bold(),
            format!("Run aborted at operation {}", index + 1).yellow().bold()
        ),
        SequencerState::Idle | SequencerState::Running { .. } => {}
    }

    println!(
        "  Passed: {}  Failed: {}  Skipped: {}",
        summary.total_passed.to_string().green(),
        summary.total_failed.to_string().red(),
        summary.skipped
    );

    if !summary.failures.is_empty() {
        println!("\n{}", "Failures:".cyan());
        for failure in &summary.failures {
            println!("  {} {}", format!("#{}", failure.index + 1).dimmed(), failure.name);
            println!("      expected {}, observed {}", failure.expected, failure.observed);
            if let Some(detail) = &failure.detail {
                println!("      {}", detail);
            }
            if let Some(reference) = &failure.reference {
                println!("      see {}", reference.dimmed());
            }
        }
    }

    if let Some(abort) = &summary.abort {
        println!("\n{}", "Aborted:".cyan());
        println!("  {} {}: {}", format!("#{}", abort.index + 1).dimmed(), abort.name, abort.reason);
        if let Some(reference) = &abort.reference {
            println!("      see {}", reference.dimmed());
        }
    }
    println!();
}

fn print_script(script: &Script) {
    println!(
        "{} {} ({} operations, service {})",
        "Script:".blue().bold(),
        script.name().white().bold(),
        script.len(),
        script.service()
    );
    let mut current: Option<&str> = None;
    for (index, op) in script.operations().iter().enumerate() {
        if current != Some(op.name.as_str()) {
            let marker = if op.optional { " (optional)".dimmed().to_string() } else { String::new() };
            println!("\n  {}{}", op.name.white().bold(), marker);
            if let Some(reference) = &op.reference {
                println!("    {}", reference.dimmed());
            }
            current = Some(op.name.as_str());
        }
        println!(
            "    {:>3}. {}  expect {}",
            index + 1,
            op.action,
            op.expected
        );
    }
}
