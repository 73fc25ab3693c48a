//! Data models for spritegen.
//!
//! This module contains the core data structures shared by the loader,
//! the pipeline and the state reflector:
//! - Distribution sources and their threading variants
//! - The user-selected video asset
//! - Sprite job parameters and the finished sprite sheet

mod asset;
mod source;
mod sprite;

// Re-export all public types
pub use asset::{media_type_for_extension, AssetSummary, VideoAsset};
pub use source::{
    DistributionSource, ResourceKind, ThreadingMode, DEFAULT_PROBE_PACKAGE,
    DEFAULT_TRANSCODER_PACKAGE, PLATFORM_PLACEHOLDER,
};
pub use sprite::{ResultSummary, SpriteJobParams, SpriteResult, MAX_GRID_DIMENSION, SPRITE_MEDIA_TYPE};
