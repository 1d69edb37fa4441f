//! CLI command definitions
//!
//! Defines the clap commands for the validator CLI.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run a conformance suite or script file against a device
    Run {
        /// Built-in suite to run (see 'list')
        #[arg(long, short, default_value = "spec", conflicts_with = "script")]
        suite: String,

        /// Run a YAML script file instead of a built-in suite
        #[arg(long)]
        script: Option<PathBuf>,

        /// Device name or address to test (default: first device advertising
        /// the configuration service)
        #[arg(long, short)]
        device: Option<String>,

        /// Include the optional lock/unlock tests
        #[arg(long)]
        optional: bool,

        /// Per-operation timeout in seconds
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        timeout: Option<u64>,

        /// Answer from a recorded response file instead of a device
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Output the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List built-in suites
    List,

    /// Print the operations of a suite or script file without running it
    Show {
        /// Built-in suite to show
        #[arg(long, short, default_value = "spec", conflicts_with = "script")]
        suite: String,

        /// Show a YAML script file instead
        #[arg(long)]
        script: Option<PathBuf>,

        /// Include the optional lock/unlock tests
        #[arg(long)]
        optional: bool,
    },

    /// Scan for nearby Bluetooth LE devices
    #[cfg(feature = "ble")]
    Scan {
        /// Scan duration in seconds
        #[arg(long, default_value = "5")]
        duration: u64,
    },
}
