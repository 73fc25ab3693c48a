//! UI state reflector.
//!
//! An explicit state machine mirroring what a front end shows: engine load
//! status, the selected file, job progress, the result or an error. Front
//! ends register listeners and render every state they are handed.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::loader::LoadProgress;
use crate::models::{AssetSummary, ResultSummary};

/// What the front end displays.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UiState {
    #[default]
    Idle,
    Loading {
        status: String,
    },
    Ready,
    Selected {
        asset: AssetSummary,
    },
    Processing {
        percent: u8,
        status: String,
    },
    Result {
        summary: ResultSummary,
    },
    Error {
        message: String,
        /// Whether a retry of the engine load is offered.
        retry: bool,
    },
}

impl UiState {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            UiState::Idle => "idle",
            UiState::Loading { .. } => "loading",
            UiState::Ready => "ready",
            UiState::Selected { .. } => "selected",
            UiState::Processing { .. } => "processing",
            UiState::Result { .. } => "result",
            UiState::Error { .. } => "error",
        }
    }

    /// Single-line status text.
    pub fn status_line(&self) -> String {
        match self {
            UiState::Idle => "Initializing...".to_string(),
            UiState::Loading { status } => status.clone(),
            UiState::Ready => "Ready. Select a video file.".to_string(),
            UiState::Selected { asset } => {
                format!("Selected {} ({} bytes)", asset.name, asset.size_bytes)
            }
            UiState::Processing { percent, status } => format!("{} {}%", status, percent),
            UiState::Result { summary } => format!(
                "Sprite sheet ready: {}x{} grid, {} bytes",
                summary.columns, summary.rows, summary.size_bytes
            ),
            UiState::Error { message, .. } => format!("Error: {}", message),
        }
    }
}

/// Inputs to the reflector.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    LoadStarted,
    LoadProgress(LoadProgress),
    LoadSucceeded,
    LoadFailed { message: String },
    FileSelected(AssetSummary),
    FileRejected { message: String },
    GenerateClicked,
    RetryClicked,
    JobStatus(String),
    /// Job progress as a fraction in `0.0..=1.0`.
    JobProgress(f64),
    JobCompleted(ResultSummary),
    JobFailed { message: String },
}

impl UiEvent {
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::LoadStarted => "load-started",
            UiEvent::LoadProgress(_) => "load-progress",
            UiEvent::LoadSucceeded => "load-succeeded",
            UiEvent::LoadFailed { .. } => "load-failed",
            UiEvent::FileSelected(_) => "file-selected",
            UiEvent::FileRejected { .. } => "file-rejected",
            UiEvent::GenerateClicked => "generate-clicked",
            UiEvent::RetryClicked => "retry-clicked",
            UiEvent::JobStatus(_) => "job-status",
            UiEvent::JobProgress(_) => "job-progress",
            UiEvent::JobCompleted(_) => "job-completed",
            UiEvent::JobFailed { .. } => "job-failed",
        }
    }
}

impl fmt::Display for UiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An event that has no transition from the current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Event '{event}' is not valid in state '{state}'")]
pub struct ReflectorError {
    pub event: &'static str,
    pub state: &'static str,
}

/// Callback invoked with every new state.
pub type StateListener = Box<dyn Fn(&UiState) + Send + Sync>;

/// The state machine.
pub struct StateReflector {
    state: UiState,
    engine_ready: bool,
    selected: Option<AssetSummary>,
    running: bool,
    listeners: Vec<StateListener>,
}

impl Default for StateReflector {
    fn default() -> Self {
        Self::new()
    }
}

impl StateReflector {
    pub fn new() -> Self {
        Self {
            state: UiState::Idle,
            engine_ready: false,
            selected: None,
            running: false,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &UiState {
        &self.state
    }

    pub fn engine_ready(&self) -> bool {
        self.engine_ready
    }

    pub fn selected(&self) -> Option<&AssetSummary> {
        self.selected.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Trigger control: engine loaded, a file selected, nothing running.
    pub fn can_generate(&self) -> bool {
        self.engine_ready && self.selected.is_some() && !self.running
    }

    pub fn add_listener(&mut self, listener: impl Fn(&UiState) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Apply an event. Events with no transition are ignored.
    ///
    /// Returns whether the state changed.
    pub fn apply(&mut self, event: UiEvent) -> bool {
        match self.try_apply(event) {
            Ok(_) => true,
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    /// Apply an event, failing if it is not valid in the current state.
    pub fn try_apply(&mut self, event: UiEvent) -> Result<&UiState, ReflectorError> {
        let rejected = ReflectorError {
            event: event.name(),
            state: self.state.name(),
        };

        let next = match event {
            UiEvent::LoadStarted => match self.state {
                UiState::Idle | UiState::Error { retry: true, .. } => self.start_loading(),
                _ => return Err(rejected),
            },
            UiEvent::RetryClicked => match self.state {
                UiState::Error { retry: true, .. } => self.start_loading(),
                _ => return Err(rejected),
            },
            UiEvent::LoadProgress(progress) => match self.state {
                UiState::Loading { .. } => UiState::Loading {
                    status: progress.status_text(),
                },
                _ => return Err(rejected),
            },
            UiEvent::LoadSucceeded => match self.state {
                UiState::Loading { .. } => {
                    self.engine_ready = true;
                    self.resting_state()
                }
                _ => return Err(rejected),
            },
            UiEvent::LoadFailed { message } => {
                self.engine_ready = false;
                self.running = false;
                UiState::Error {
                    message,
                    retry: true,
                }
            }
            UiEvent::FileSelected(asset) => {
                if self.running {
                    return Err(rejected);
                }
                self.selected = Some(asset);
                match self.state {
                    UiState::Loading { .. } | UiState::Error { retry: true, .. } | UiState::Idle
                        if !self.engine_ready =>
                    {
                        self.state.clone()
                    }
                    _ => self.resting_state(),
                }
            }
            UiEvent::FileRejected { message } => {
                if self.running {
                    return Err(rejected);
                }
                self.selected = None;
                UiState::Error {
                    message,
                    retry: false,
                }
            }
            UiEvent::GenerateClicked => {
                if !self.can_generate() {
                    return Err(rejected);
                }
                self.running = true;
                UiState::Processing {
                    percent: 0,
                    status: "Starting...".to_string(),
                }
            }
            UiEvent::JobStatus(status) => match self.state {
                UiState::Processing { percent, .. } if self.running => {
                    UiState::Processing { percent, status }
                }
                _ => return Err(rejected),
            },
            UiEvent::JobProgress(fraction) => match &self.state {
                UiState::Processing { status, .. } if self.running => UiState::Processing {
                    percent: (fraction.clamp(0.0, 1.0) * 100.0).round() as u8,
                    status: status.clone(),
                },
                _ => return Err(rejected),
            },
            UiEvent::JobCompleted(summary) => {
                if !self.running {
                    return Err(rejected);
                }
                self.running = false;
                UiState::Result { summary }
            }
            UiEvent::JobFailed { message } => {
                if !self.running {
                    return Err(rejected);
                }
                self.running = false;
                UiState::Error {
                    message,
                    retry: false,
                }
            }
        };

        self.state = next;
        for listener in &self.listeners {
            listener(&self.state);
        }
        Ok(&self.state)
    }

    fn start_loading(&mut self) -> UiState {
        self.engine_ready = false;
        UiState::Loading {
            status: "Loading engine...".to_string(),
        }
    }

    fn resting_state(&self) -> UiState {
        match &self.selected {
            Some(asset) => UiState::Selected {
                asset: asset.clone(),
            },
            None => UiState::Ready,
        }
    }
}

impl fmt::Debug for StateReflector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReflector")
            .field("state", &self.state)
            .field("engine_ready", &self.engine_ready)
            .field("selected", &self.selected)
            .field("running", &self.running)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
