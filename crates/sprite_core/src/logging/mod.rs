//! Logging infrastructure for spritegen.
//!
//! This module provides:
//! - Global `tracing` subscriber setup (stderr, optionally a daily log file)
//! - The [`LogLevel`] used in settings and on the command line
//! - [`ProgressGate`] for logging progress at fixed steps only
//!
//! # Example
//!
//! ```no_run
//! use sprite_core::logging::{init_tracing_with_file, LogLevel};
//!
//! let _guard = init_tracing_with_file(LogLevel::Info, "/path/to/logs".as_ref()).unwrap();
//! tracing::info!("Starting");
//! ```

mod types;

pub use types::{LogLevel, ProgressGate};

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr with timestamps
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(env_filter(default_level))
        .init();
}

/// Like [`init_tracing`], plus a daily rolling `spritegen.*.log` in `logs_dir`.
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the life of the program.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    logs_dir: &Path,
) -> Result<WorkerGuard, InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("spritegen")
        .filename_suffix("log")
        .build(logs_dir)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_to_filter_str(default_level)))
}

/// Convert LogLevel to filter string.
fn level_to_filter_str(level: LogLevel) -> &'static str {
    level.as_str()
}
