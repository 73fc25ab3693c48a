//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::loader::LoaderConfig;
use crate::logging::LogLevel;
use crate::models::{DistributionSource, MAX_GRID_DIMENSION};
use crate::pipeline::SpriteOptions;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Engine acquisition settings.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Sprite sheet defaults.
    #[serde(default)]
    pub sprite: SpriteSettings,
}

impl Settings {
    /// Check values that serde cannot.
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.sources.is_empty() {
            return Err("[engine] needs at least one source".to_string());
        }
        if let Some(source) = self
            .engine
            .sources
            .iter()
            .find(|s| s.name.trim().is_empty() || s.base_url.trim().is_empty())
        {
            return Err(format!(
                "[engine] source '{}' needs both a name and a base_url",
                source.name
            ));
        }
        if self.engine.probe_timeout_secs == 0 || self.engine.transcoder_timeout_secs == 0 {
            return Err("[engine] timeouts must be greater than zero".to_string());
        }
        if self.sprite.webp_quality > 100 {
            return Err(format!(
                "[sprite] webp_quality must be 0-100, got {}",
                self.sprite.webp_quality
            ));
        }
        if self.sprite.thumbnail_width == 0 || self.sprite.thumbnail_height == 0 {
            return Err("[sprite] thumbnail dimensions must be at least 1".to_string());
        }
        let grid = 1..=MAX_GRID_DIMENSION;
        if !grid.contains(&self.sprite.columns) || !grid.contains(&self.sprite.rows) {
            return Err(format!(
                "[sprite] columns and rows must be between 1 and {}",
                MAX_GRID_DIMENSION
            ));
        }
        if self.logging.progress_step == 0 || self.logging.progress_step > 100 {
            return Err("[logging] progress_step must be between 1 and 100".to_string());
        }
        Ok(())
    }

    /// Loader configuration derived from the `[paths]` and `[engine]` sections.
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            sources: self.engine.sources.clone(),
            staging_root: PathBuf::from(&self.paths.engine_folder),
            probe_timeout: self.engine.probe_timeout(),
            transcoder_timeout: self.engine.transcoder_timeout(),
            allow_multi_thread: self.engine.allow_multi_thread,
        }
    }

    /// Pipeline options from the `[sprite]` section.
    pub fn sprite_options(&self) -> SpriteOptions {
        SpriteOptions {
            thumbnail_width: self.sprite.thumbnail_width,
            thumbnail_height: self.sprite.thumbnail_height,
            webp_quality: self.sprite.webp_quality,
        }
    }
}

/// Path configuration for output, engine, and logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder sprite sheets are written to when no output path is given.
    #[serde(default = "default_output_folder")]
    pub output_folder: String,

    /// Folder holding downloaded engine resources.
    #[serde(default = "default_engine_folder")]
    pub engine_folder: String,

    /// Folder for log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "spritegen")
}

fn data_subdir(name: &str) -> String {
    project_dirs()
        .map(|dirs| dirs.data_dir().join(name))
        .unwrap_or_else(|| PathBuf::from(".spritegen").join(name))
        .to_string_lossy()
        .to_string()
}

/// Default location of `settings.toml`.
pub fn default_config_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from(".config").join("settings.toml"))
}

fn default_output_folder() -> String {
    ".".to_string()
}

fn default_engine_folder() -> String {
    data_subdir("engine")
}

fn default_logs_folder() -> String {
    data_subdir("logs")
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_folder: default_output_folder(),
            engine_folder: default_engine_folder(),
            logs_folder: default_logs_folder(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default log level (overridden by RUST_LOG).
    #[serde(default)]
    pub level: LogLevel,

    /// Also write a daily log file to the logs folder.
    #[serde(default = "default_true")]
    pub file_logging: bool,

    /// Progress log step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
}

fn default_true() -> bool {
    true
}

fn default_progress_step() -> u8 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file_logging: true,
            progress_step: default_progress_step(),
        }
    }
}

/// Engine acquisition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Timeout for fetching the probe resource.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Timeout for fetching the transcoder resource.
    #[serde(default = "default_transcoder_timeout")]
    pub transcoder_timeout_secs: u64,

    /// Allow multi-thread engine builds when the host supports them.
    #[serde(default = "default_true")]
    pub allow_multi_thread: bool,

    /// Ordered distribution sources.
    #[serde(default = "DistributionSource::defaults")]
    pub sources: Vec<DistributionSource>,
}

fn default_probe_timeout() -> u64 {
    45
}

fn default_transcoder_timeout() -> u64 {
    90
}

impl EngineSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn transcoder_timeout(&self) -> Duration {
        Duration::from_secs(self.transcoder_timeout_secs)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout(),
            transcoder_timeout_secs: default_transcoder_timeout(),
            allow_multi_thread: true,
            sources: DistributionSource::defaults(),
        }
    }
}

/// Sprite sheet defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpriteSettings {
    #[serde(default = "default_columns")]
    pub columns: u32,

    #[serde(default = "default_rows")]
    pub rows: u32,

    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,

    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,

    /// WebP quality, 0-100.
    #[serde(default = "default_webp_quality")]
    pub webp_quality: u8,
}

fn default_columns() -> u32 {
    5
}

fn default_rows() -> u32 {
    4
}

fn default_thumbnail_width() -> u32 {
    320
}

fn default_thumbnail_height() -> u32 {
    240
}

fn default_webp_quality() -> u8 {
    80
}

impl Default for SpriteSettings {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            rows: default_rows(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
            webp_quality: default_webp_quality(),
        }
    }
}

/// Config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Logging,
    Engine,
    Sprite,
}

impl ConfigSection {
    pub const ALL: [ConfigSection; 4] = [
        ConfigSection::Paths,
        ConfigSection::Logging,
        ConfigSection::Engine,
        ConfigSection::Sprite,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Engine => "engine",
            ConfigSection::Sprite => "sprite",
        }
    }

    /// Comment written above the section.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "# Output, engine and log directories",
            ConfigSection::Logging => "# Logging configuration",
            ConfigSection::Engine => "# Engine download sources and timeouts",
            ConfigSection::Sprite => "# Sprite sheet defaults",
        }
    }
}
