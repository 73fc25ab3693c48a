//! Engine backed by prebuilt ffmpeg/ffprobe executables.
//!
//! Each instance owns a private temporary working directory that is
//! removed when the instance is dropped. Commands run with that directory
//! as their current directory, so all file arguments are bare names.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde::Deserialize;
use tempfile::TempDir;

use super::progress::{parse_duration_line, parse_progress_line};
use super::{validate_name, EngineError, EngineObservers, EngineResult, MediaEngine};

/// Number of stderr lines kept for error diagnosis.
const TAIL_LINES: usize = 20;

/// Real engine instance.
pub struct FfmpegEngine {
    /// Transcoder executable.
    transcoder: PathBuf,
    /// Probe executable.
    probe: PathBuf,
    /// Private working directory.
    workdir: TempDir,
    /// Whether the engine may use its own worker threads.
    workers_enabled: bool,
    /// First line of `-version`.
    version: String,
    /// Registered observers.
    observers: EngineObservers,
    /// Recent stderr lines of the last command.
    tail: Arc<Mutex<VecDeque<String>>>,
}

impl FfmpegEngine {
    /// Verify both executables run and create the working directory.
    pub fn new(
        transcoder: impl Into<PathBuf>,
        probe: impl Into<PathBuf>,
        workers_enabled: bool,
    ) -> EngineResult<Self> {
        let transcoder = transcoder.into();
        let probe = probe.into();

        let version = query_version(&transcoder)?;
        query_version(&probe)?;

        let workdir = tempfile::Builder::new()
            .prefix("spritegen-engine-")
            .tempdir()
            .map_err(|e| EngineError::io("create working directory", e))?;

        tracing::debug!(
            "Engine working directory: {} ({})",
            workdir.path().display(),
            version
        );

        Ok(Self {
            transcoder,
            probe,
            workdir,
            workers_enabled,
            version,
            observers: EngineObservers::default(),
            tail: Arc::new(Mutex::new(VecDeque::with_capacity(TAIL_LINES))),
        })
    }

    fn path_for(&self, name: &str) -> EngineResult<PathBuf> {
        validate_name(name)?;
        Ok(self.workdir.path().join(name))
    }

    /// Last meaningful diagnostic line from the previous command.
    fn last_diagnostic(&self) -> String {
        self.tail
            .lock()
            .iter()
            .rev()
            .map(|line| line.trim())
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "engine produced no diagnostic output".to_string())
    }
}

impl fmt::Debug for FfmpegEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FfmpegEngine")
            .field("transcoder", &self.transcoder)
            .field("probe", &self.probe)
            .field("workdir", &self.workdir.path())
            .field("workers_enabled", &self.workers_enabled)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl MediaEngine for FfmpegEngine {
    fn write_file(&mut self, name: &str, data: &[u8]) -> EngineResult<()> {
        let path = self.path_for(name)?;
        fs::write(&path, data).map_err(|e| EngineError::io(format!("write {}", name), e))
    }

    fn read_file(&self, name: &str) -> EngineResult<Vec<u8>> {
        let path = self.path_for(name)?;
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::FileNotFound(name.to_string()),
            _ => EngineError::io(format!("read {}", name), e),
        })
    }

    fn delete_file(&mut self, name: &str) -> EngineResult<()> {
        let path = self.path_for(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EngineError::FileNotFound(name.to_string()),
            _ => EngineError::io(format!("delete {}", name), e),
        })
    }

    fn list_files(&self) -> EngineResult<Vec<String>> {
        let entries = fs::read_dir(self.workdir.path())
            .map_err(|e| EngineError::io("list working directory", e))?;

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn count_frames(&mut self, name: &str) -> EngineResult<Option<u64>> {
        self.path_for(name)?;

        let output = Command::new(&self.probe)
            .current_dir(self.workdir.path())
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-count_packets",
                "-show_entries",
                "stream=nb_read_packets,nb_frames",
                "-of",
                "json",
                name,
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| EngineError::Spawn {
                tool: "ffprobe".to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("probe failed without output")
                .to_string();
            return Err(EngineError::command_failed(
                "ffprobe",
                output.status.code().unwrap_or(-1),
                message,
            ));
        }

        let probe: ProbeOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| EngineError::Parse {
                what: "ffprobe output".to_string(),
                message: e.to_string(),
            })?;

        Ok(probe.frame_count())
    }

    fn exec(&mut self, args: &[String]) -> EngineResult<()> {
        let mut full_args: Vec<String> = [
            "-hide_banner",
            "-nostdin",
            "-nostats",
            "-progress",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if self.workers_enabled {
            full_args.extend(args.iter().cloned());
        } else {
            full_args.extend(apply_thread_limits(args));
        }

        let mut cmd = Command::new(&self.transcoder);
        cmd.current_dir(self.workdir.path())
            .args(&full_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!("Running engine command: {:?}", cmd);

        let mut child = cmd.spawn().map_err(|e| EngineError::Spawn {
            tool: "ffmpeg".to_string(),
            message: e.to_string(),
        })?;

        let stderr = child.stderr.take().ok_or_else(|| EngineError::Spawn {
            tool: "ffmpeg".to_string(),
            message: "failed to capture stderr".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::Spawn {
            tool: "ffmpeg".to_string(),
            message: "failed to capture stdout".to_string(),
        })?;

        self.tail.lock().clear();
        let duration_us = Arc::new(AtomicU64::new(0));

        // Drain stderr on a helper thread so neither pipe can fill up
        let stderr_thread = {
            let observers = self.observers.clone();
            let tail = Arc::clone(&self.tail);
            let duration_us = Arc::clone(&duration_us);
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    if let Some(us) = parse_duration_line(&line) {
                        duration_us.store(us, Ordering::SeqCst);
                    }
                    {
                        let mut tail = tail.lock();
                        if tail.len() >= TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line.clone());
                    }
                    observers.emit_log(&line);
                }
            })
        };

        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if let Some(fraction) = parse_progress_line(&line, duration_us.load(Ordering::SeqCst)) {
                self.observers.emit_progress(fraction);
            }
        }

        let status = child
            .wait()
            .map_err(|e| EngineError::io("wait for ffmpeg", e))?;
        if stderr_thread.join().is_err() {
            tracing::warn!("Engine stderr reader panicked");
        }

        if !status.success() {
            return Err(EngineError::command_failed(
                "ffmpeg",
                status.code().unwrap_or(-1),
                self.last_diagnostic(),
            ));
        }

        Ok(())
    }

    fn set_observers(&mut self, observers: EngineObservers) {
        self.observers = observers;
    }

    fn description(&self) -> String {
        let mode = if self.workers_enabled {
            "multi-thread"
        } else {
            "single-thread"
        };
        format!("{} ({})", self.version, mode)
    }
}

/// Rewrite transcoder arguments so no worker threads are used.
///
/// Adds a global `-filter_threads 1`, and `-threads 1` before every input
/// (decoder) and before the final output (encoder).
pub fn apply_thread_limits(args: &[String]) -> Vec<String> {
    let mut limited = Vec::with_capacity(args.len() + 8);
    limited.push("-filter_threads".to_string());
    limited.push("1".to_string());

    let last = args.len().saturating_sub(1);
    for (i, arg) in args.iter().enumerate() {
        if arg == "-i" || (i == last && !args.is_empty()) {
            limited.push("-threads".to_string());
            limited.push("1".to_string());
        }
        limited.push(arg.clone());
    }
    limited
}

/// Subset of `ffprobe -of json` output used for frame counting.
#[derive(Debug, Deserialize)]
pub struct ProbeOutput {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
pub struct ProbeStream {
    pub nb_read_packets: Option<String>,
    pub nb_frames: Option<String>,
}

impl ProbeOutput {
    /// Frame count of the first video stream.
    ///
    /// `Some(0)` when there is no video stream; `None` when the stream
    /// exists but reports no usable count.
    pub fn frame_count(&self) -> Option<u64> {
        let Some(stream) = self.streams.first() else {
            return Some(0);
        };
        [&stream.nb_read_packets, &stream.nb_frames]
            .into_iter()
            .flatten()
            .find_map(|value| value.trim().parse::<u64>().ok())
    }
}

/// Run `<tool> -version` and return its first line.
fn query_version(tool: &Path) -> EngineResult<String> {
    let name = tool
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| tool.display().to_string());

    let output = Command::new(tool)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| EngineError::Spawn {
            tool: name.clone(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(EngineError::command_failed(
            name,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn thread_limits_cover_inputs_and_output() {
        let args = strings(&["-i", "sprite.png", "-quality", "80", "-y", "sprite.webp"]);
        let limited = apply_thread_limits(&args);
        assert_eq!(
            limited,
            strings(&[
                "-filter_threads",
                "1",
                "-threads",
                "1",
                "-i",
                "sprite.png",
                "-quality",
                "80",
                "-y",
                "-threads",
                "1",
                "sprite.webp",
            ])
        );
    }

    #[test]
    fn thread_limits_handle_empty_args() {
        assert_eq!(apply_thread_limits(&[]), strings(&["-filter_threads", "1"]));
    }

    #[test]
    fn probe_prefers_read_packets() {
        let probe: ProbeOutput = serde_json::from_str(
            r#"{"programs":[],"streams":[{"nb_frames":"250","nb_read_packets":"251"}]}"#,
        )
        .unwrap();
        assert_eq!(probe.frame_count(), Some(251));
    }

    #[test]
    fn probe_falls_back_to_nb_frames() {
        let probe: ProbeOutput =
            serde_json::from_str(r#"{"streams":[{"nb_frames":"120"}]}"#).unwrap();
        assert_eq!(probe.frame_count(), Some(120));
    }

    #[test]
    fn probe_without_video_stream_has_zero_frames() {
        let probe: ProbeOutput = serde_json::from_str(r#"{"streams":[]}"#).unwrap();
        assert_eq!(probe.frame_count(), Some(0));
    }

    #[test]
    fn probe_with_unknown_count() {
        let probe: ProbeOutput =
            serde_json::from_str(r#"{"streams":[{"nb_frames":"N/A"}]}"#).unwrap();
        assert_eq!(probe.frame_count(), None);
    }

    #[test]
    fn new_fails_for_missing_executable() {
        let result = FfmpegEngine::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe", false);
        assert!(matches!(result, Err(EngineError::Spawn { .. })));
    }
}
