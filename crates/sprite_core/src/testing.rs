//! Test doubles shared by unit tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::{validate_name, EngineError, EngineObservers, EngineResult, MediaEngine};
use crate::loader::{EngineInitializer, FetchedResources, LoadError, ResourceFetcher};

/// In-memory engine that records what it is asked to do.
#[derive(Default)]
pub(crate) struct MockEngine {
    pub files: BTreeMap<String, Vec<u8>>,
    /// Every operation, in order (e.g. "write input.mp4").
    pub calls: Vec<String>,
    /// Arguments of every `exec`.
    pub commands: Vec<Vec<String>>,
    pub frame_count: Option<u64>,
    /// Index of the `exec` call that fails.
    pub fail_exec_at: Option<usize>,
    pub fail_message: String,
    pub fail_delete: bool,
    observers: EngineObservers,
}

impl MockEngine {
    pub fn with_frames(frames: u64) -> Self {
        Self {
            frame_count: Some(frames),
            fail_message: "Conversion failed!".to_string(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockEngine")
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("commands", &self.commands.len())
            .finish()
    }
}

impl MediaEngine for MockEngine {
    fn write_file(&mut self, name: &str, data: &[u8]) -> EngineResult<()> {
        validate_name(name)?;
        self.calls.push(format!("write {}", name));
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn read_file(&self, name: &str) -> EngineResult<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::FileNotFound(name.to_string()))
    }

    fn delete_file(&mut self, name: &str) -> EngineResult<()> {
        self.calls.push(format!("delete {}", name));
        if !self.files.contains_key(name) {
            return Err(EngineError::FileNotFound(name.to_string()));
        }
        if self.fail_delete {
            return Err(EngineError::io(
                format!("delete {}", name),
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"),
            ));
        }
        self.files.remove(name);
        Ok(())
    }

    fn list_files(&self) -> EngineResult<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn count_frames(&mut self, name: &str) -> EngineResult<Option<u64>> {
        self.calls.push(format!("probe {}", name));
        if !self.files.contains_key(name) {
            return Err(EngineError::FileNotFound(name.to_string()));
        }
        Ok(self.frame_count)
    }

    fn exec(&mut self, args: &[String]) -> EngineResult<()> {
        let index = self.commands.len();
        self.calls.push("exec".to_string());
        self.commands.push(args.to_vec());

        if self.fail_exec_at == Some(index) {
            self.observers.emit_log(&self.fail_message);
            return Err(EngineError::command_failed("ffmpeg", 1, self.fail_message.clone()));
        }

        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .ok_or_else(|| EngineError::command_failed("ffmpeg", 1, "No input specified"))?;
        if !self.files.contains_key(input) {
            return Err(EngineError::command_failed(
                "ffmpeg",
                1,
                format!("{}: No such file or directory", input),
            ));
        }

        let output = args
            .last()
            .ok_or_else(|| EngineError::command_failed("ffmpeg", 1, "No output specified"))?;
        let bytes: &[u8] = if output.ends_with(".webp") {
            b"RIFF\x10\0\0\0WEBPVP8 mock"
        } else {
            b"\x89PNG\r\n\x1a\nmock"
        };

        self.observers.emit_log("frame=    1 fps=0.0 q=-0.0 size=N/A");
        self.observers.emit_progress(0.5);
        self.observers.emit_progress(1.0);
        self.files.insert(output.clone(), bytes.to_vec());
        Ok(())
    }

    fn set_observers(&mut self, observers: EngineObservers) {
        self.observers = observers;
    }
}

/// Fetcher with scripted statuses and delays. Unscripted URLs answer 200.
#[derive(Default)]
pub(crate) struct FakeFetcher {
    statuses: HashMap<String, u16>,
    delays: HashMap<String, Duration>,
    stalled_checks: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn with_status(mut self, url: &str, status: u16) -> Self {
        self.statuses.insert(url.to_string(), status);
        self
    }

    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    /// HEAD requests to `url` never answer.
    pub fn with_stalled_check(mut self, url: &str) -> Self {
        self.stalled_checks.insert(url.to_string());
        self
    }

    /// Requests made so far, as "HEAD <url>" / "GET <url>".
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

impl ResourceFetcher for FakeFetcher {
    async fn check(&self, url: &str) -> Result<u16, LoadError> {
        self.requests.lock().push(format!("HEAD {}", url));
        if self.stalled_checks.contains(url) {
            std::future::pending::<()>().await;
        }
        Ok(self.statuses.get(url).copied().unwrap_or(200))
    }

    async fn fetch(
        &self,
        _resource: &str,
        url: &str,
        dest: &Path,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<u64, LoadError> {
        self.requests.lock().push(format!("GET {}", url));

        tokio::fs::write(dest, b"part")
            .await
            .map_err(|e| LoadError::io("write partial", e))?;
        progress(50);

        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }

        tokio::fs::write(dest, b"complete")
            .await
            .map_err(|e| LoadError::io("write resource", e))?;
        progress(100);
        Ok(8)
    }
}

/// Initializer producing [`MockEngine`]s; fails for the named sources.
#[derive(Default)]
pub(crate) struct FakeInitializer {
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, bool)>>,
}

impl FakeInitializer {
    pub fn failing_for(sources: &[&str]) -> Self {
        Self {
            failing: sources.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// (source name, workers enabled) for every initialization.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().clone()
    }
}

impl EngineInitializer for FakeInitializer {
    type Engine = MockEngine;

    fn initialize(
        &self,
        resources: &FetchedResources,
        workers_enabled: bool,
    ) -> Result<MockEngine, LoadError> {
        self.calls
            .lock()
            .push((resources.source_name.clone(), workers_enabled));

        if self.failing.contains(&resources.source_name) {
            return Err(LoadError::init_failed(
                &resources.source_name,
                "ffmpeg -version exited with code 126",
            ));
        }
        Ok(MockEngine::with_frames(240))
    }
}
