//! Sprite service: owns the engine and wires loader and pipeline to the
//! state reflector.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::engine::{EngineObservers, MediaEngine};
use crate::loader::{EngineInitializer, EngineLoader, LoadOutcome, ResourceFetcher};
use crate::logging::ProgressGate;
use crate::models::{SpriteJobParams, SpriteResult, VideoAsset};
use crate::pipeline::{ProcessError, SpritePipeline, Stage};
use crate::reflector::{StateReflector, UiEvent};

/// Holds the single engine handle and the reflector.
///
/// The engine sits behind a mutex; a run takes it with `try_lock`, so a
/// second concurrent run fails with [`ProcessError::Busy`].
pub struct SpriteService<E> {
    engine: Arc<Mutex<Option<E>>>,
    reflector: Arc<Mutex<StateReflector>>,
    pipeline: SpritePipeline,
    progress_gate: Arc<Mutex<ProgressGate>>,
}

impl<E: MediaEngine> SpriteService<E> {
    pub fn new(pipeline: SpritePipeline, reflector: StateReflector, progress_step: u8) -> Self {
        Self {
            engine: Arc::new(Mutex::new(None)),
            reflector: Arc::new(Mutex::new(reflector)),
            pipeline,
            progress_gate: Arc::new(Mutex::new(ProgressGate::new(progress_step))),
        }
    }

    /// Shared handle to the reflector.
    pub fn reflector(&self) -> Arc<Mutex<StateReflector>> {
        Arc::clone(&self.reflector)
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.try_lock().map(|g| g.is_some()).unwrap_or(true)
    }

    /// Description of the loaded engine.
    pub fn engine_description(&self) -> Option<String> {
        self.engine
            .try_lock()
            .and_then(|g| g.as_ref().map(|e| e.description()))
    }

    /// Load the engine unless one is already loaded.
    pub async fn load<F, I>(&self, loader: &EngineLoader<F, I>) -> LoadOutcome<()>
    where
        F: ResourceFetcher,
        I: EngineInitializer<Engine = E>,
    {
        if self.engine.lock().is_some() {
            debug!("Engine already loaded");
            return LoadOutcome {
                result: Ok(()),
                report: Default::default(),
            };
        }

        self.reflector.lock().apply(UiEvent::LoadStarted);

        let reflector = Arc::clone(&self.reflector);
        let outcome = loader
            .load_with_report(move |progress| {
                reflector.lock().apply(UiEvent::LoadProgress(progress));
            })
            .await;

        let result = match outcome.result {
            Ok(mut engine) => {
                engine.set_observers(self.observers());
                info!("Engine ready: {}", engine.description());
                *self.engine.lock() = Some(engine);
                self.reflector.lock().apply(UiEvent::LoadSucceeded);
                Ok(())
            }
            Err(e) => {
                warn!("Engine load failed: {}", e);
                self.reflector.lock().apply(UiEvent::LoadFailed {
                    message: e.user_message(),
                });
                Err(e)
            }
        };

        LoadOutcome {
            result,
            report: outcome.report,
        }
    }

    /// Retry loading after a failure.
    pub async fn retry_load<F, I>(&self, loader: &EngineLoader<F, I>) -> LoadOutcome<()>
    where
        F: ResourceFetcher,
        I: EngineInitializer<Engine = E>,
    {
        self.reflector.lock().apply(UiEvent::RetryClicked);
        self.load(loader).await
    }

    /// Read a file and record the selection.
    pub fn select(&self, path: &Path) -> Result<VideoAsset, ProcessError> {
        match VideoAsset::from_path(path) {
            Ok(asset) => {
                info!("Selected {} ({})", asset.name, asset.media_type);
                self.reflector
                    .lock()
                    .apply(UiEvent::FileSelected(asset.summary()));
                Ok(asset)
            }
            Err(e) => {
                self.reflector.lock().apply(UiEvent::FileRejected {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run the pipeline on a blocking worker.
    pub async fn generate(
        &self,
        asset: VideoAsset,
        params: SpriteJobParams,
    ) -> Result<SpriteResult, ProcessError> {
        if !asset.is_video() {
            let err = ProcessError::invalid_input(format!("{} is not a video file", asset.name));
            self.reflector.lock().apply(UiEvent::FileRejected {
                message: err.to_string(),
            });
            return Err(err);
        }

        let engine = Arc::clone(&self.engine);
        let reflector = Arc::clone(&self.reflector);
        let gate = Arc::clone(&self.progress_gate);
        let pipeline = self.pipeline.clone();

        let task = tokio::task::spawn_blocking(move || -> Result<SpriteResult, ProcessError> {
            let mut guard = engine.try_lock().ok_or(ProcessError::Busy)?;
            let engine = guard.as_mut().ok_or(ProcessError::EngineNotLoaded)?;

            {
                let summary = asset.summary();
                let mut r = reflector.lock();
                if r.selected() != Some(&summary) {
                    r.apply(UiEvent::FileSelected(summary));
                }
                r.apply(UiEvent::GenerateClicked);
            }
            let result = pipeline.process(engine, asset, params, |stage| {
                stage_started(&reflector, &gate, stage);
            });

            match &result {
                Ok(sprite) => {
                    reflector
                        .lock()
                        .apply(UiEvent::JobCompleted(sprite.summary()));
                }
                Err(e) => {
                    reflector.lock().apply(UiEvent::JobFailed {
                        message: e.user_message(),
                    });
                }
            }
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                let err = ProcessError::Interrupted(e.to_string());
                self.reflector.lock().apply(UiEvent::JobFailed {
                    message: err.user_message(),
                });
                Err(err)
            }
        }
    }

    fn observers(&self) -> EngineObservers {
        let reflector = Arc::clone(&self.reflector);
        let gate = Arc::clone(&self.progress_gate);

        EngineObservers {
            log: Some(Arc::new(|line: &str| {
                debug!(target: "engine", "{}", line);
            })),
            progress: Some(Arc::new(move |fraction: f64| {
                let percent = (fraction * 100.0).round() as u8;
                if gate.lock().pass(percent) {
                    info!("Progress: {}%", percent);
                }
                reflector.lock().apply(UiEvent::JobProgress(fraction));
            })),
        }
    }
}

/// Each stage reports its own progress from zero.
fn stage_started(reflector: &Mutex<StateReflector>, gate: &Mutex<ProgressGate>, stage: Stage) {
    debug!("Stage {}", stage);
    gate.lock().reset();
    reflector
        .lock()
        .apply(UiEvent::JobStatus(stage.status_text().to_string()));
}
