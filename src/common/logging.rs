//! Logging and tracing configuration
//!
//! Console output (results, progress) goes to stdout; diagnostics go through
//! tracing to stderr, and optionally to a log file for post-mortem analysis
//! of a flaky device.

use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

const LOG_FILE_NAME: &str = "validator.log";

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("validator=debug,warn")
        } else {
            EnvFilter::new("validator=info,warn")
        }
    })
}

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate (DEBUG with `verbose`), WARN for dependencies.
pub fn init_cli(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing with an additional file layer
///
/// Writes to `dir/validator.log` (or the platform log directory when `dir` is
/// `None`). The returned guard must be held for the lifetime of the program
/// so buffered lines are flushed. Falls back to stderr-only logging if no
/// log directory is available.
pub fn init_with_file(verbose: bool, dir: Option<&Path>) -> Option<(PathBuf, WorkerGuard)> {
    let log_dir = match dir {
        Some(dir) => std::fs::create_dir_all(dir).ok().map(|_| dir.to_path_buf()),
        None => paths::ensure_log_dir().ok().flatten(),
    };

    let Some(log_dir) = log_dir else {
        eprintln!("Warning: Could not create log directory, logging to stderr only");
        init_cli(verbose);
        return None;
    };

    let appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Some((log_dir.join(LOG_FILE_NAME), guard))
}
