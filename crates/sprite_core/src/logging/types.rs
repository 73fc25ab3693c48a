//! Logging types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information, including every engine output line.
    Debug,
    /// General information.
    #[default]
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl LogLevel {
    /// Raise verbosity by `steps` levels (used for repeated `-v`).
    pub fn more_verbose(self, steps: u8) -> Self {
        let mut level = self;
        for _ in 0..steps {
            level = match level {
                LogLevel::Error => LogLevel::Warn,
                LogLevel::Warn => LogLevel::Info,
                LogLevel::Info => LogLevel::Debug,
                LogLevel::Debug | LogLevel::Trace => LogLevel::Trace,
            };
        }
        level
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Filters progress reports down to fixed percentage steps.
///
/// 0% and 100% always pass; values in between pass once per `step`.
#[derive(Debug, Clone)]
pub struct ProgressGate {
    step: u8,
    last: Option<u8>,
}

impl ProgressGate {
    pub fn new(step: u8) -> Self {
        Self {
            step: step.clamp(1, 100),
            last: None,
        }
    }

    /// Returns true if `percent` should be logged.
    pub fn pass(&mut self, percent: u8) -> bool {
        let percent = percent.min(100);
        let passes = match self.last {
            None => true,
            Some(last) => {
                (percent == 100 && last != 100)
                    || percent >= last.saturating_add(self.step) - (last % self.step)
            }
        };
        if passes {
            self.last = Some(percent);
        }
        passes
    }

    /// Start over for a new job.
    pub fn reset(&mut self) {
        self.last = None;
    }
}
