//! Engine loader errors and their classification.

use std::fmt;

use thiserror::Error;

/// Errors from acquiring and initializing the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No prebuilt engine exists for this OS/architecture.
    #[error("Unsupported platform: {0}")]
    UnsupportedRuntime(String),

    /// The availability pre-check returned a non-success status.
    #[error("{resource} unavailable (HTTP {status}): {url}")]
    ResourceUnavailable {
        resource: String,
        url: String,
        status: u16,
    },

    /// A resource fetch did not finish within its timeout.
    #[error("Timed out after {ms} ms while fetching {resource}")]
    Timeout { resource: String, ms: u64 },

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Resources were fetched but the engine did not start.
    #[error("Engine from {source_name} failed to initialize: {message}")]
    InitFailed {
        source_name: String,
        message: String,
    },

    /// Local file handling of fetched resources failed.
    #[error("I/O error during {operation}: {message}")]
    Io { operation: String, message: String },

    /// Every source was skipped and none produced an error.
    #[error("No distribution source could provide the engine")]
    AllSourcesFailed,
}

impl LoadError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, error: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            message: error.to_string(),
        }
    }

    /// Create an initialization error.
    pub fn init_failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InitFailed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn failure_class(&self) -> LoadFailureClass {
        match self {
            LoadError::UnsupportedRuntime(_) => LoadFailureClass::UnsupportedRuntime,
            LoadError::ResourceUnavailable { .. } | LoadError::Network(_) => LoadFailureClass::Network,
            LoadError::Timeout { .. } => LoadFailureClass::Timeout,
            LoadError::InitFailed { .. } | LoadError::Io { .. } | LoadError::AllSourcesFailed => {
                LoadFailureClass::Unknown
            }
        }
    }

    /// Error text followed by the remediation hint for its class.
    pub fn user_message(&self) -> String {
        format!("{}. {}", self, self.failure_class().remediation())
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        LoadError::Network(e.to_string())
    }
}

/// Coarse failure category shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadFailureClass {
    UnsupportedRuntime,
    Network,
    Timeout,
    Unknown,
}

impl LoadFailureClass {
    /// What the user can do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            LoadFailureClass::UnsupportedRuntime => {
                "No prebuilt engine exists for this system; run on linux, macOS or Windows (x64 or arm64)"
            }
            LoadFailureClass::Network => {
                "Check your internet connection, proxy or firewall, then retry"
            }
            LoadFailureClass::Timeout => {
                "The download is slow; retry, or raise the timeouts in the [engine] settings"
            }
            LoadFailureClass::Unknown => "Retry; if it keeps failing, run with -v and check the log",
        }
    }
}

impl fmt::Display for LoadFailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadFailureClass::UnsupportedRuntime => "unsupported runtime",
            LoadFailureClass::Network => "network",
            LoadFailureClass::Timeout => "timeout",
            LoadFailureClass::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
