//! Terminal rendering of reflector states.

use std::io::{self, BufRead, IsTerminal, Write};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use sprite_core::reflector::{StateReflector, UiState};

/// Draws the current state as a single progress line on stderr.
pub struct TerminalRenderer {
    bar: ProgressBar,
}

impl TerminalRenderer {
    pub fn new() -> Self {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Register as a listener on `reflector`.
    pub fn attach(&self, reflector: &mut StateReflector) {
        let bar = self.bar.clone();
        reflector.add_listener(move |state| render(&bar, state));
    }

    /// Ask whether to retry a failed engine load. Always `false` when stdin
    /// is not a terminal.
    pub fn prompt_retry(&self) -> io::Result<bool> {
        if !io::stdin().is_terminal() {
            return Ok(false);
        }

        self.bar.suspend(|| -> io::Result<bool> {
            eprint!("Retry loading the engine? [y/N] ");
            io::stderr().flush()?;
            let mut answer = String::new();
            io::stdin().lock().read_line(&mut answer)?;
            Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
        })
    }

    /// Print a line above the progress bar.
    pub fn println(&self, line: impl AsRef<str>) {
        self.bar.println(line);
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

fn render(bar: &ProgressBar, state: &UiState) {
    match state {
        UiState::Idle => {}
        UiState::Loading { .. } | UiState::Ready | UiState::Selected { .. } => {
            bar.set_position(0);
            bar.set_message(state.status_line());
        }
        UiState::Processing { percent, status } => {
            bar.set_position(u64::from(*percent));
            bar.set_message(status.clone());
        }
        UiState::Result { .. } => {
            bar.set_position(100);
            bar.set_message(state.status_line());
        }
        UiState::Error { .. } => {
            bar.set_message(state.status_line());
        }
    }
}
