//! The external media engine.
//!
//! The engine is an opaque pair of prebuilt tools (a probe and a
//! transcoder) that does all decode/scale/tile/encode work. This module
//! defines the interface the rest of the crate talks to:
//! - A private working directory ("isolated filesystem") addressed by
//!   plain file names
//! - String-argument command submission
//! - Frame counting through the probe
//! - Log-line and progress observers
//!
//! [`FfmpegEngine`] is the real implementation; tests use an in-memory mock.

mod ffmpeg;
mod progress;

pub use ffmpeg::{apply_thread_limits, FfmpegEngine, ProbeOutput};
pub use progress::{parse_duration_line, parse_progress_line};

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A working file name contained path components or was empty.
    #[error("Invalid working file name: '{0}'")]
    InvalidName(String),

    /// A working file does not exist.
    #[error("Working file not found: {0}")]
    FileNotFound(String),

    /// File I/O error inside the working directory.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The tool could not be started at all.
    #[error("Failed to start {tool}: {message}")]
    Spawn { tool: String, message: String },

    /// The tool ran and exited unsuccessfully.
    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    /// Tool output could not be understood.
    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },
}

impl EngineError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a command failed error.
    pub fn command_failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    /// The most specific message to show a user.
    ///
    /// For command failures this is the engine's own diagnostic, verbatim.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::CommandFailed { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Callback receiving each engine log line.
pub type LogObserver = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback receiving job progress as a fraction in `0.0..=1.0`.
pub type ProgressObserver = Arc<dyn Fn(f64) + Send + Sync>;

/// Observers registered on an engine handle after a successful load.
#[derive(Clone, Default)]
pub struct EngineObservers {
    pub log: Option<LogObserver>,
    pub progress: Option<ProgressObserver>,
}

impl EngineObservers {
    /// Forward a log line, if a log observer is registered.
    pub fn emit_log(&self, line: &str) {
        if let Some(ref log) = self.log {
            log(line);
        }
    }

    /// Forward progress clamped to `0.0..=1.0`.
    pub fn emit_progress(&self, fraction: f64) {
        if let Some(ref progress) = self.progress {
            progress(fraction.clamp(0.0, 1.0));
        }
    }
}

/// Interface to a loaded engine instance.
///
/// All methods are blocking. A single instance is a single mutable
/// resource: callers must serialize access (the service keeps it behind a
/// mutex).
pub trait MediaEngine: Send + 'static {
    /// Write a file into the working directory.
    fn write_file(&mut self, name: &str, data: &[u8]) -> EngineResult<()>;

    /// Read a file from the working directory.
    fn read_file(&self, name: &str) -> EngineResult<Vec<u8>>;

    /// Delete a file from the working directory.
    fn delete_file(&mut self, name: &str) -> EngineResult<()>;

    /// Names of all files currently in the working directory.
    fn list_files(&self) -> EngineResult<Vec<String>>;

    /// Count video frames of a working file.
    ///
    /// Returns `Ok(None)` when the probe cannot determine a count.
    fn count_frames(&mut self, name: &str) -> EngineResult<Option<u64>>;

    /// Submit one transcoder command. Returns when the command has finished.
    fn exec(&mut self, args: &[String]) -> EngineResult<()>;

    /// Replace the registered observers.
    fn set_observers(&mut self, observers: EngineObservers);

    /// Short description for logs (e.g., version and threading).
    fn description(&self) -> String {
        "media engine".to_string()
    }
}

/// Check that a working file name is a bare file name.
pub(crate) fn validate_name(name: &str) -> EngineResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(EngineError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn validate_name_rejects_paths() {
        assert!(validate_name("input.mp4").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("../escape.mp4").is_err());
        assert!(validate_name("dir\\file").is_err());
    }

    #[test]
    fn observers_clamp_progress() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let observers = EngineObservers {
            log: None,
            progress: Some(Arc::new(move |f| sink.lock().push(f))),
        };

        observers.emit_progress(-0.5);
        observers.emit_progress(0.25);
        observers.emit_progress(3.0);

        assert_eq!(*seen.lock(), vec![0.0, 0.25, 1.0]);
    }

    #[test]
    fn user_message_is_verbatim_for_command_failures() {
        let err = EngineError::command_failed("ffmpeg", 1, "Invalid argument");
        assert_eq!(err.user_message(), "Invalid argument");

        let err = EngineError::FileNotFound("sprite.png".into());
        assert!(err.user_message().contains("sprite.png"));
    }
}
