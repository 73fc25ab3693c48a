//! Error types for the sprite pipeline.

use std::fmt;

use thiserror::Error;

/// Pipeline stage, used for progress text and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    WriteInput,
    ProbeFrames,
    TileFrames,
    EncodeWebp,
    ReadOutput,
}

impl Stage {
    /// Stage identifier used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::WriteInput => "write-input",
            Stage::ProbeFrames => "probe-frames",
            Stage::TileFrames => "tile-frames",
            Stage::EncodeWebp => "encode-webp",
            Stage::ReadOutput => "read-output",
        }
    }

    /// Status text shown while the stage runs.
    pub fn status_text(&self) -> &'static str {
        match self {
            Stage::WriteInput => "Loading video into the engine...",
            Stage::ProbeFrames => "Analyzing video...",
            Stage::TileFrames => "Extracting and tiling frames...",
            Stage::EncodeWebp => "Converting to WebP...",
            Stage::ReadOutput => "Retrieving sprite sheet...",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors from a pipeline run.
///
/// None of these invalidate the engine handle; only the current run is
/// aborted.
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Non-video file, bad grid dimensions, or a video without frames.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No engine has been loaded yet.
    #[error("The engine is not loaded")]
    EngineNotLoaded,

    /// Another run currently holds the engine.
    #[error("A sprite sheet is already being generated")]
    Busy,

    /// The engine rejected or crashed on a command.
    #[error("Stage '{stage}' failed: {message}")]
    JobFailed { stage: Stage, message: String },

    /// The worker running the job panicked or was cancelled.
    #[error("Sprite generation was interrupted: {0}")]
    Interrupted(String),

    /// A working entry could not be deleted. Logged only.
    #[error("Failed to clean up working file {entry}: {message}")]
    CleanupFailed { entry: String, message: String },
}

impl ProcessError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a job failed error.
    pub fn job_failed(stage: Stage, message: impl Into<String>) -> Self {
        Self::JobFailed {
            stage,
            message: message.into(),
        }
    }

    /// Short remediation hint shown with the error.
    pub fn remediation(&self) -> &'static str {
        match self {
            ProcessError::InvalidInput(_) => {
                "Select a video file and use between 1 and 100 columns and rows."
            }
            ProcessError::EngineNotLoaded => {
                "Wait for the engine to finish loading, or retry loading it."
            }
            ProcessError::Busy => "Wait for the current sprite sheet to finish.",
            ProcessError::JobFailed { .. } => {
                "Try a smaller grid, or re-encode the video to a common format such as H.264 MP4."
            }
            ProcessError::Interrupted(_) => "Run the command again.",
            ProcessError::CleanupFailed { .. } => "No action needed.",
        }
    }

    /// Message for display: the error followed by its remediation hint.
    pub fn user_message(&self) -> String {
        format!("{}\n\n{}", self, self.remediation())
    }
}
