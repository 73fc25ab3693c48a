//! Turning fetched resources into a running engine.

use std::path::{Path, PathBuf};

use crate::engine::{FfmpegEngine, MediaEngine};

use super::errors::LoadError;

/// Local paths of the resources fetched from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResources {
    pub source_name: String,
    pub probe: PathBuf,
    pub transcoder: PathBuf,
}

/// Creates an engine instance from fetched resources.
pub trait EngineInitializer {
    type Engine: MediaEngine;

    fn initialize(
        &self,
        resources: &FetchedResources,
        workers_enabled: bool,
    ) -> Result<Self::Engine, LoadError>;
}

/// Initializer for the prebuilt ffmpeg/ffprobe pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegInitializer;

impl EngineInitializer for FfmpegInitializer {
    type Engine = FfmpegEngine;

    fn initialize(
        &self,
        resources: &FetchedResources,
        workers_enabled: bool,
    ) -> Result<FfmpegEngine, LoadError> {
        make_executable(&resources.probe)?;
        make_executable(&resources.transcoder)?;

        FfmpegEngine::new(&resources.transcoder, &resources.probe, workers_enabled)
            .map_err(|e| LoadError::init_failed(&resources.source_name, e.to_string()))
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), LoadError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = std::fs::metadata(path)
        .map_err(|e| LoadError::io(format!("stat {}", path.display()), e))?
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
        .map_err(|e| LoadError::io(format!("chmod {}", path.display()), e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), LoadError> {
    Ok(())
}
