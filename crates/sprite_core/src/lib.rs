//! spritegen core - backend logic for the sprite sheet generator
//!
//! This crate contains all orchestration logic with zero UI dependencies:
//! acquiring the external media engine, running the two-stage sprite
//! pipeline against it, and reflecting progress into an explicit state
//! machine that a front end can render.

pub mod config;
pub mod engine;
pub mod loader;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod reflector;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{EngineError, FfmpegEngine, MediaEngine};
pub use loader::{EngineLoader, LoadError, LoadProgress};
pub use models::{DistributionSource, SpriteJobParams, SpriteResult, ThreadingMode, VideoAsset};
pub use pipeline::{ProcessError, SpritePipeline};
pub use reflector::{StateReflector, UiEvent, UiState};
pub use service::SpriteService;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
