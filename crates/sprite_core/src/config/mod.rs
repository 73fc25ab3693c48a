//! Configuration management for spritegen.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use sprite_core::config::{default_config_path, ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new(default_config_path());
//! config.load_or_create().unwrap();
//!
//! println!("Engine folder: {}", config.settings().paths.engine_folder);
//!
//! config.settings_mut().sprite.columns = 8;
//! config.update_section(ConfigSection::Sprite).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    default_config_path, ConfigSection, EngineSettings, LoggingSettings, PathSettings, Settings,
    SpriteSettings,
};
