//! UriBeacon Validator - conformance tests for the UriBeacon configuration service
//!
//! Runs ordered scripts of GATT writes and reads against a beacon in
//! configuration mode and reports every response that deviates from the
//! return codes the service mandates.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use validator::{cli, commands, common::logging};

#[derive(Parser)]
#[command(name = "uribeacon-validator", about = "UriBeacon configuration service validator")]
#[command(version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug-level logging for the validator
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write logs to DIR/validator.log (default: platform log directory)
    #[arg(long, global = true, value_name = "DIR", num_args = 0..=1)]
    log_file: Option<Option<PathBuf>>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Held until exit so buffered log lines reach the file
    let guard = match &cli.log_file {
        Some(dir) => {
            logging::init_with_file(cli.verbose, dir.as_deref()).map(|(path, guard)| {
                tracing::debug!(path = %path.display(), "logging to file");
                guard
            })
        }
        None => {
            logging::init_cli(cli.verbose);
            None
        }
    };

    let passed = match cli::dispatch(cli.command).await {
        Ok(passed) => passed,
        Err(e) => {
            eprintln!("Error: {e}");
            false
        }
    };

    drop(guard);
    if !passed {
        std::process::exit(1);
    }
}
