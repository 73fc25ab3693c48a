//! Engine loader.
//!
//! Acquires the engine from an ordered list of distribution sources:
//!
//! ```text
//! detect host ──► for each source (in order)
//!                   ├─ multi-thread source without worker threads? → Skipped
//!                   ├─ clear staging dir
//!                   ├─ HEAD probe, HEAD transcoder (T1, T2) → ResourceUnavailable / Timeout
//!                   ├─ GET probe (T1), GET transcoder (T2) → Timeout / Network
//!                   ├─ initialize engine                  → InitFailed
//!                   └─ success → stop
//! ```
//!
//! The first success wins; otherwise the last error is returned.

mod capability;
mod errors;
mod fetch;
mod init;

pub use capability::{platform_tag, HostCapabilities};
pub use crate::models::ResourceKind;
pub use errors::{LoadError, LoadFailureClass};
pub use fetch::{HttpFetcher, ResourceFetcher};
pub use init::{EngineInitializer, FetchedResources, FfmpegInitializer};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::models::{DistributionSource, ThreadingMode};

/// Default timeout for the probe resource.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(45);
/// Default timeout for the transcoder resource.
pub const DEFAULT_TRANSCODER_TIMEOUT: Duration = Duration::from_secs(90);

/// Progress updates while loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadProgress {
    /// Pre-checking resource availability on a source.
    Checking { source: String },
    /// Downloading a resource.
    Downloading { resource: ResourceKind, percent: u8 },
    /// Starting the engine from fetched resources.
    Initializing { source: String },
    /// Engine is ready.
    Ready { source: String },
}

impl LoadProgress {
    /// Status line for display.
    pub fn status_text(&self) -> String {
        match self {
            LoadProgress::Checking { source } => format!("Checking {}...", source),
            LoadProgress::Downloading { resource, percent } => {
                format!("Downloading {} ({}%)", resource, percent)
            }
            LoadProgress::Initializing { source } => format!("Starting engine from {}...", source),
            LoadProgress::Ready { source } => format!("Engine ready ({})", source),
        }
    }
}

/// Loader settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Ordered distribution sources.
    pub sources: Vec<DistributionSource>,
    /// Per-source staging directories are created under this root.
    pub staging_root: PathBuf,
    pub probe_timeout: Duration,
    pub transcoder_timeout: Duration,
    /// User switch for multi-threaded engine builds.
    pub allow_multi_thread: bool,
}

impl LoaderConfig {
    /// Config with default timeouts and the built-in sources.
    pub fn new(staging_root: impl Into<PathBuf>) -> Self {
        Self {
            sources: DistributionSource::defaults(),
            staging_root: staging_root.into(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            transcoder_timeout: DEFAULT_TRANSCODER_TIMEOUT,
            allow_multi_thread: true,
        }
    }

    fn timeout_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Probe => self.probe_timeout,
            ResourceKind::Transcoder => self.transcoder_timeout,
        }
    }
}

/// Outcome of one source attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadAttemptResult {
    Skipped(String),
    Failed(LoadError),
    Succeeded,
}

/// One entry of a [`LoadReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadAttempt {
    pub source_name: String,
    pub result: LoadAttemptResult,
}

/// Per-source record of a load, in attempt order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub attempts: Vec<LoadAttempt>,
}

impl LoadReport {
    /// Name of the source that produced the engine.
    pub fn succeeded_source(&self) -> Option<&str> {
        self.attempts
            .iter()
            .find(|a| a.result == LoadAttemptResult::Succeeded)
            .map(|a| a.source_name.as_str())
    }

    /// Last recorded failure.
    pub fn last_error(&self) -> Option<&LoadError> {
        self.attempts.iter().rev().find_map(|a| match &a.result {
            LoadAttemptResult::Failed(e) => Some(e),
            _ => None,
        })
    }

    fn record(&mut self, source_name: &str, result: LoadAttemptResult) {
        self.attempts.push(LoadAttempt {
            source_name: source_name.to_string(),
            result,
        });
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for attempt in &self.attempts {
            match &attempt.result {
                LoadAttemptResult::Skipped(reason) => {
                    writeln!(f, "  - {}: skipped ({})", attempt.source_name, reason)?
                }
                LoadAttemptResult::Failed(e) => {
                    writeln!(f, "  x {}: {}", attempt.source_name, e)?
                }
                LoadAttemptResult::Succeeded => writeln!(f, "  + {}: loaded", attempt.source_name)?,
            }
        }
        Ok(())
    }
}

/// Result of [`EngineLoader::load_with_report`].
#[derive(Debug)]
pub struct LoadOutcome<E> {
    pub result: Result<E, LoadError>,
    pub report: LoadReport,
}

/// Acquires the engine.
pub struct EngineLoader<F, I> {
    config: LoaderConfig,
    fetcher: F,
    initializer: I,
    capabilities: HostCapabilities,
}

impl<F: ResourceFetcher, I: EngineInitializer> EngineLoader<F, I> {
    /// Create a loader for the running host.
    pub fn new(config: LoaderConfig, fetcher: F, initializer: I) -> Self {
        let capabilities = HostCapabilities::detect(config.allow_multi_thread);
        Self::with_capabilities(config, fetcher, initializer, capabilities)
    }

    /// Create a loader with explicit host capabilities.
    pub fn with_capabilities(
        config: LoaderConfig,
        fetcher: F,
        initializer: I,
        capabilities: HostCapabilities,
    ) -> Self {
        Self {
            config,
            fetcher,
            initializer,
            capabilities,
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// Why a source would be skipped on this host, if it would be.
    pub fn skip_reason(&self, source: &DistributionSource) -> Option<String> {
        if source.threading == ThreadingMode::Multi && !self.capabilities.worker_threads {
            Some("worker threads unavailable".to_string())
        } else {
            None
        }
    }

    /// Acquire the engine.
    pub async fn load(
        &self,
        progress: impl Fn(LoadProgress) + Send + Sync,
    ) -> Result<I::Engine, LoadError> {
        self.load_with_report(progress).await.result
    }

    /// Acquire the engine and report every source attempt.
    pub async fn load_with_report(
        &self,
        progress: impl Fn(LoadProgress) + Send + Sync,
    ) -> LoadOutcome<I::Engine> {
        let mut report = LoadReport::default();

        let Some(platform) = self.capabilities.platform else {
            let err = LoadError::UnsupportedRuntime(HostCapabilities::host_description());
            warn!("{}", err);
            return LoadOutcome {
                result: Err(err),
                report,
            };
        };

        info!(
            "Loading engine for {} (worker threads: {})",
            platform, self.capabilities.worker_threads
        );

        for source in &self.config.sources {
            if let Some(reason) = self.skip_reason(source) {
                debug!("Skipping {}: {}", source.name, reason);
                report.record(&source.name, LoadAttemptResult::Skipped(reason));
                continue;
            }

            match self.attempt(source, platform, &progress).await {
                Ok(engine) => {
                    info!("Engine loaded from {}", source.name);
                    report.record(&source.name, LoadAttemptResult::Succeeded);
                    return LoadOutcome {
                        result: Ok(engine),
                        report,
                    };
                }
                Err(e) => {
                    warn!("Source {} failed ({}): {}", source.name, e.failure_class(), e);
                    report.record(&source.name, LoadAttemptResult::Failed(e));
                }
            }
        }

        let err = report
            .last_error()
            .cloned()
            .unwrap_or(LoadError::AllSourcesFailed);
        LoadOutcome {
            result: Err(err),
            report,
        }
    }

    async fn attempt(
        &self,
        source: &DistributionSource,
        platform: &str,
        progress: &(impl Fn(LoadProgress) + Send + Sync),
    ) -> Result<I::Engine, LoadError> {
        let staging = self.config.staging_root.join(source.slug());
        reset_staging(&staging).await?;

        progress(LoadProgress::Checking {
            source: source.name.clone(),
        });
        for kind in ResourceKind::ALL {
            let url = source.resource_url(kind, platform);
            let limit = self.config.timeout_for(kind);
            let status = match tokio::time::timeout(limit, self.fetcher.check(&url)).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!("Availability check of {} timed out", url);
                    return Err(LoadError::Timeout {
                        resource: kind.name().to_string(),
                        ms: limit.as_millis() as u64,
                    });
                }
            };
            if !(200..300).contains(&status) {
                return Err(LoadError::ResourceUnavailable {
                    resource: kind.name().to_string(),
                    url,
                    status,
                });
            }
        }

        let probe = self.fetch_resource(source, platform, ResourceKind::Probe, &staging, progress).await?;
        let transcoder = self
            .fetch_resource(source, platform, ResourceKind::Transcoder, &staging, progress)
            .await?;

        progress(LoadProgress::Initializing {
            source: source.name.clone(),
        });
        let workers_enabled =
            source.threading == ThreadingMode::Multi && self.capabilities.worker_threads;
        let resources = FetchedResources {
            source_name: source.name.clone(),
            probe,
            transcoder,
        };
        let engine = self.initializer.initialize(&resources, workers_enabled)?;

        progress(LoadProgress::Ready {
            source: source.name.clone(),
        });
        Ok(engine)
    }

    async fn fetch_resource(
        &self,
        source: &DistributionSource,
        platform: &str,
        kind: ResourceKind,
        staging: &Path,
        progress: &(impl Fn(LoadProgress) + Send + Sync),
    ) -> Result<PathBuf, LoadError> {
        let url = source.resource_url(kind, platform);
        let dest = staging.join(kind.file_name());
        let limit = self.config.timeout_for(kind);

        info!("Fetching {} from {}", kind, url);
        progress(LoadProgress::Downloading {
            resource: kind,
            percent: 0,
        });
        let report = |percent: u8| {
            progress(LoadProgress::Downloading {
                resource: kind,
                percent,
            })
        };

        let outcome = tokio::time::timeout(
            limit,
            self.fetcher.fetch(kind.name(), &url, &dest, &report),
        )
        .await;

        match outcome {
            Ok(Ok(bytes)) => {
                debug!("Fetched {} ({} bytes)", kind, bytes);
                Ok(dest)
            }
            Ok(Err(e)) => {
                remove_partial(&dest).await;
                Err(e)
            }
            Err(_) => {
                remove_partial(&dest).await;
                Err(LoadError::Timeout {
                    resource: kind.name().to_string(),
                    ms: limit.as_millis() as u64,
                })
            }
        }
    }
}

async fn reset_staging(dir: &Path) -> Result<(), LoadError> {
    if tokio::fs::try_exists(dir).await.unwrap_or(false) {
        debug!("Discarding previous staging state in {}", dir.display());
        tokio::fs::remove_dir_all(dir)
            .await
            .map_err(|e| LoadError::io(format!("clear {}", dir.display()), e))?;
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| LoadError::io(format!("create {}", dir.display()), e))
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial download {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial download {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFetcher, FakeInitializer};
    use parking_lot::Mutex;
    use std::time::Instant;
    use tempfile::tempdir;

    fn caps(worker_threads: bool) -> HostCapabilities {
        HostCapabilities {
            platform: Some("linux-x64"),
            worker_threads,
        }
    }

    fn source(name: &str, threading: ThreadingMode) -> DistributionSource {
        DistributionSource::new(name, format!("https://{}/dist", name), threading)
    }

    fn config(root: &Path, sources: Vec<DistributionSource>) -> LoaderConfig {
        LoaderConfig {
            sources,
            ..LoaderConfig::new(root)
        }
    }

    fn probe_url(name: &str) -> String {
        source(name, ThreadingMode::Single).resource_url(ResourceKind::Probe, "linux-x64")
    }

    fn transcoder_url(name: &str) -> String {
        source(name, ThreadingMode::Single).resource_url(ResourceKind::Transcoder, "linux-x64")
    }

    #[tokio::test]
    async fn first_source_success_stops_iteration() {
        let dir = tempdir().unwrap();
        let cfg = config(
            dir.path(),
            vec![
                source("a.example", ThreadingMode::Single),
                source("b.example", ThreadingMode::Single),
            ],
        );
        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::default(),
            caps(true),
        );

        let outcome = loader.load_with_report(|_| {}).await;

        assert!(outcome.result.is_ok());
        assert_eq!(outcome.report.attempts.len(), 1);
        assert_eq!(outcome.report.succeeded_source(), Some("a.example"));
    }

    #[tokio::test]
    async fn falls_back_in_order_after_failures() {
        let dir = tempdir().unwrap();
        let cfg = config(
            dir.path(),
            vec![
                source("a.example", ThreadingMode::Single),
                source("b.example", ThreadingMode::Single),
                source("c.example", ThreadingMode::Single),
            ],
        );
        let fetcher = FakeFetcher::default()
            .with_status(&probe_url("a.example"), 404)
            .with_status(&transcoder_url("b.example"), 503);
        let loader =
            EngineLoader::with_capabilities(cfg, fetcher, FakeInitializer::default(), caps(true));

        let outcome = loader.load_with_report(|_| {}).await;

        assert!(outcome.result.is_ok());
        let names: Vec<_> = outcome
            .report
            .attempts
            .iter()
            .map(|a| a.source_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.example", "b.example", "c.example"]);
        assert!(matches!(
            outcome.report.attempts[1].result,
            LoadAttemptResult::Failed(LoadError::ResourceUnavailable { status: 503, .. })
        ));
        assert_eq!(outcome.report.succeeded_source(), Some("c.example"));
    }

    #[tokio::test]
    async fn multi_thread_source_skipped_without_worker_threads() {
        let dir = tempdir().unwrap();
        let cfg = config(
            dir.path(),
            vec![
                source("st.example", ThreadingMode::Single),
                source("mt.example", ThreadingMode::Multi),
            ],
        );
        let fetcher = FakeFetcher::default().with_status(&probe_url("st.example"), 500);
        let loader =
            EngineLoader::with_capabilities(cfg, fetcher, FakeInitializer::default(), caps(false));

        let outcome = loader.load_with_report(|_| {}).await;

        assert!(matches!(
            outcome.result,
            Err(LoadError::ResourceUnavailable { status: 500, .. })
        ));
        assert!(matches!(
            outcome.report.attempts[1].result,
            LoadAttemptResult::Skipped(_)
        ));
        assert!(!loader
            .fetcher
            .requests()
            .iter()
            .any(|r| r.contains("mt.example")));
    }

    #[tokio::test]
    async fn workers_enabled_only_for_multi_source_with_capability() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), vec![source("mt.example", ThreadingMode::Multi)]);
        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::default(),
            caps(true),
        );

        loader.load(|_| {}).await.unwrap();

        assert_eq!(
            loader.initializer.calls(),
            vec![("mt.example".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn single_source_runs_without_workers() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), vec![source("st.example", ThreadingMode::Single)]);
        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::default(),
            caps(true),
        );

        loader.load(|_| {}).await.unwrap();

        assert_eq!(
            loader.initializer.calls(),
            vec![("st.example".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn unsupported_platform_fails_immediately() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), DistributionSource::defaults());
        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::default(),
            HostCapabilities {
                platform: None,
                worker_threads: true,
            },
        );

        let outcome = loader.load_with_report(|_| {}).await;

        assert!(matches!(outcome.result, Err(LoadError::UnsupportedRuntime(_))));
        assert!(outcome.report.attempts.is_empty());
        assert!(loader.fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn timeout_is_bounded_and_removes_partial_file() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path(), vec![source("slow.example", ThreadingMode::Single)]);
        cfg.transcoder_timeout = Duration::from_millis(50);
        let fetcher = FakeFetcher::default()
            .with_delay(&transcoder_url("slow.example"), Duration::from_secs(30));
        let loader =
            EngineLoader::with_capabilities(cfg, fetcher, FakeInitializer::default(), caps(true));

        let started = Instant::now();
        let err = loader.load(|_| {}).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            err,
            LoadError::Timeout {
                resource: "transcoder".into(),
                ms: 50
            }
        );
        let partial = dir
            .path()
            .join("slow-example")
            .join(ResourceKind::Transcoder.file_name());
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn stalled_availability_check_times_out_and_falls_back() {
        let dir = tempdir().unwrap();
        let mut cfg = config(
            dir.path(),
            vec![
                source("stalled.example", ThreadingMode::Single),
                source("good.example", ThreadingMode::Single),
            ],
        );
        cfg.probe_timeout = Duration::from_millis(50);
        cfg.transcoder_timeout = Duration::from_millis(50);
        let fetcher = FakeFetcher::default().with_stalled_check(&probe_url("stalled.example"));
        let loader =
            EngineLoader::with_capabilities(cfg, fetcher, FakeInitializer::default(), caps(true));

        let started = Instant::now();
        let outcome = tokio::time::timeout(Duration::from_secs(5), loader.load_with_report(|_| {}))
            .await
            .expect("loader hung on a stalled availability check");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcome.result.is_ok());
        assert_eq!(
            outcome.report.attempts[0].result,
            LoadAttemptResult::Failed(LoadError::Timeout {
                resource: "probe".into(),
                ms: 50
            })
        );
        assert_eq!(outcome.report.succeeded_source(), Some("good.example"));
        assert!(!loader
            .fetcher
            .requests()
            .iter()
            .any(|r| r.starts_with("GET") && r.contains("stalled.example")));
    }

    #[tokio::test]
    async fn init_failure_moves_to_next_source() {
        let dir = tempdir().unwrap();
        let cfg = config(
            dir.path(),
            vec![
                source("a.example", ThreadingMode::Single),
                source("b.example", ThreadingMode::Single),
            ],
        );
        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::failing_for(&["a.example"]),
            caps(true),
        );

        let outcome = loader.load_with_report(|_| {}).await;

        assert!(outcome.result.is_ok());
        assert!(matches!(
            outcome.report.attempts[0].result,
            LoadAttemptResult::Failed(LoadError::InitFailed { .. })
        ));
    }

    #[tokio::test]
    async fn all_skipped_is_all_sources_failed() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), vec![source("mt.example", ThreadingMode::Multi)]);
        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::default(),
            caps(false),
        );

        let err = loader.load(|_| {}).await.unwrap_err();
        assert_eq!(err, LoadError::AllSourcesFailed);
    }

    #[tokio::test]
    async fn retry_starts_from_clean_staging_dir() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), vec![source("a.example", ThreadingMode::Single)]);
        let stale = dir.path().join("a-example").join("stale.part");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"junk").unwrap();

        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::default(),
            caps(true),
        );
        loader.load(|_| {}).await.unwrap();

        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn progress_events_in_order() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path(), vec![source("a.example", ThreadingMode::Single)]);
        let loader = EngineLoader::with_capabilities(
            cfg,
            FakeFetcher::default(),
            FakeInitializer::default(),
            caps(true),
        );
        let events = Mutex::new(Vec::new());

        loader.load(|p| events.lock().push(p)).await.unwrap();

        let events = events.into_inner();
        assert!(matches!(events.first(), Some(LoadProgress::Checking { .. })));
        assert!(matches!(events.last(), Some(LoadProgress::Ready { .. })));
        assert!(events.contains(&LoadProgress::Downloading {
            resource: ResourceKind::Transcoder,
            percent: 100
        }));
    }
}
