//! `settings.toml` on disk.
//!
//! The whole file is regenerated with section comments on first run and
//! whenever it is missing keys or carries stale sections. Later edits
//! touch one table at a time so hand-written comments elsewhere survive.
//! Every write goes through a sibling temp file that is renamed over the
//! target.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use toml_edit::{DocumentMut, Item};
use tracing::{debug, info};

use super::settings::{ConfigSection, Settings};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Config is not valid TOML for these settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not edit config document: {0}")]
    Edit(#[from] toml_edit::TomlError),

    #[error("No config at {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// In-memory settings bound to a file path.
pub struct ConfigManager {
    config_path: PathBuf,
    settings: Settings,
}

impl ConfigManager {
    /// Starts from defaults; nothing is read until `load` or `load_or_create`.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            settings: Settings::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Edits stay in memory until `save` or `update_section`.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Read and validate an existing file.
    pub fn load(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            return Err(ConfigError::NotFound(self.config_path.clone()));
        }

        let settings: Settings = toml::from_str(&fs::read_to_string(&self.config_path)?)?;
        settings.validate().map_err(ConfigError::Invalid)?;
        self.settings = settings;
        Ok(())
    }

    /// Like `load`, but writes defaults for a missing file and rewrites an
    /// incomplete one.
    pub fn load_or_create(&mut self) -> ConfigResult<()> {
        if !self.config_path.exists() {
            info!("Creating default config at {}", self.config_path.display());
            self.settings = Settings::default();
            return self.save();
        }

        let content = fs::read_to_string(&self.config_path)?;
        let (settings, needs_rewrite) = Self::parse_and_check(&content)?;
        self.settings = settings;
        if needs_rewrite {
            debug!("Rewriting {} with defaults filled in", self.config_path.display());
            self.save()?;
        }
        Ok(())
    }

    /// Create the output, engine and log folders.
    pub fn ensure_dirs_exist(&self) -> ConfigResult<()> {
        let paths = &self.settings.paths;
        for dir in [&paths.output_folder, &paths.engine_folder, &paths.logs_folder] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn logs_folder(&self) -> PathBuf {
        PathBuf::from(&self.settings.paths.logs_folder)
    }

    /// Deserialize and validate `content`. The flag is set when the file
    /// has tables we don't know or lacks keys the settings would write.
    fn parse_and_check(content: &str) -> ConfigResult<(Settings, bool)> {
        let on_disk: DocumentMut = content.parse()?;
        let settings: Settings = toml::from_str(content)?;
        settings.validate().map_err(ConfigError::Invalid)?;

        let known: Vec<&str> = ConfigSection::ALL.iter().map(|s| s.table_name()).collect();
        let stale_section = on_disk.iter().any(|(name, _)| !known.contains(&name));

        let expected: DocumentMut = toml::to_string_pretty(&settings)?.parse()?;
        let missing_key = expected.iter().any(|(name, item)| {
            match (item.as_table(), on_disk.get(name).and_then(Item::as_table)) {
                (Some(want), Some(have)) => want.iter().any(|(key, _)| !have.contains_key(key)),
                (Some(_), None) => true,
                _ => false,
            }
        });

        Ok((settings, stale_section || missing_key))
    }

    /// Regenerate the whole file from the in-memory settings.
    pub fn save(&self) -> ConfigResult<()> {
        let content = self.render_with_comments()?;
        self.replace_file(&content)?;
        Ok(())
    }

    /// Write one table back to disk.
    ///
    /// The file is re-read first; every other table is kept as found, and
    /// the target table keeps its existing leading comment.
    pub fn update_section(&mut self, section: ConfigSection) -> ConfigResult<()> {
        let mut doc = match fs::read_to_string(&self.config_path) {
            Ok(content) if !content.trim().is_empty() => content.parse::<DocumentMut>()?,
            Ok(_) => DocumentMut::new(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => DocumentMut::new(),
            Err(e) => return Err(e.into()),
        };

        let rendered = match section {
            ConfigSection::Paths => toml::to_string_pretty(&self.settings.paths)?,
            ConfigSection::Logging => toml::to_string_pretty(&self.settings.logging)?,
            ConfigSection::Engine => toml::to_string_pretty(&self.settings.engine)?,
            ConfigSection::Sprite => toml::to_string_pretty(&self.settings.sprite)?,
        };
        let mut table = rendered.parse::<DocumentMut>()?.as_table().clone();

        let name = section.table_name();
        let prefix = doc
            .get(name)
            .and_then(Item::as_table)
            .and_then(|t| t.decor().prefix())
            .and_then(|p| p.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("\n{}\n", section.comment()));
        table.decor_mut().set_prefix(prefix);
        table.set_implicit(false);
        doc[name] = Item::Table(table);

        self.replace_file(&doc.to_string())?;
        debug!("Updated [{}] in {}", name, self.config_path.display());
        Ok(())
    }

    fn render_with_comments(&self) -> ConfigResult<String> {
        let mut doc: DocumentMut = toml::to_string_pretty(&self.settings)?.parse()?;
        for section in ConfigSection::ALL {
            if let Some(table) = doc.get_mut(section.table_name()).and_then(Item::as_table_mut) {
                table
                    .decor_mut()
                    .set_prefix(format!("\n{}\n", section.comment()));
            }
        }

        Ok(format!(
            "# spritegen configuration\n\
             # Regenerated when keys are missing; section updates keep comments.\n{}",
            doc
        ))
    }

    /// Temp file next to the target, then rename, so readers never see a
    /// half-written config.
    fn replace_file(&self, content: &str) -> io::Result<()> {
        let dir = match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(content.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.config_path).map_err(|e| e.error)?;
        Ok(())
    }
}
