//! Sprite job parameters and results.

use std::fs;
use std::io;
use std::path::Path;

use crate::pipeline::ProcessError;

/// Media type of every finished sprite sheet.
pub const SPRITE_MEDIA_TYPE: &str = "image/webp";

/// Largest accepted number of columns or rows.
pub const MAX_GRID_DIMENSION: u32 = 100;

/// Grid layout for a sprite sheet.
///
/// Construct through [`SpriteJobParams::new`], which guarantees both
/// dimensions are in `1..=MAX_GRID_DIMENSION`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteJobParams {
    columns: u32,
    rows: u32,
}

impl SpriteJobParams {
    /// Validate and create grid parameters.
    pub fn new(columns: u32, rows: u32) -> Result<Self, ProcessError> {
        for (label, value) in [("columns", columns), ("rows", rows)] {
            if value == 0 || value > MAX_GRID_DIMENSION {
                return Err(ProcessError::invalid_input(format!(
                    "{} must be between 1 and {}, got {}",
                    label, MAX_GRID_DIMENSION, value
                )));
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of thumbnails sampled across the video.
    pub fn total_frames(&self) -> u32 {
        self.columns * self.rows
    }
}

/// A finished sprite sheet, handed to the caller for display or saving.
#[derive(Clone)]
pub struct SpriteResult {
    /// Encoded WebP bytes.
    pub bytes: Vec<u8>,
    /// Always [`SPRITE_MEDIA_TYPE`].
    pub media_type: &'static str,
    /// Grid used to produce the sheet.
    pub params: SpriteJobParams,
    /// Frame step used for selection.
    pub frame_step: u64,
}

impl SpriteResult {
    /// Write the sheet to disk, creating parent directories if needed.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, &self.bytes)
    }

    /// Suggested download name for a given source video name.
    pub fn file_name_for(video_name: &str) -> String {
        let stem = video_name
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .filter(|stem| !stem.is_empty())
            .unwrap_or(video_name);
        format!("{}_sprite.webp", stem)
    }

    /// Byte-free description for display.
    pub fn summary(&self) -> ResultSummary {
        ResultSummary {
            size_bytes: self.bytes.len() as u64,
            columns: self.params.columns(),
            rows: self.params.rows(),
        }
    }
}

impl std::fmt::Debug for SpriteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpriteResult")
            .field("size", &self.bytes.len())
            .field("media_type", &self.media_type)
            .field("params", &self.params)
            .field("frame_step", &self.frame_step)
            .finish()
    }
}

/// Display information about a finished sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSummary {
    pub size_bytes: u64,
    pub columns: u32,
    pub rows: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn total_frames_is_product() {
        let params = SpriteJobParams::new(4, 3).unwrap();
        assert_eq!(params.total_frames(), 12);
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            SpriteJobParams::new(0, 3),
            Err(ProcessError::InvalidInput(_))
        ));
        assert!(matches!(
            SpriteJobParams::new(3, 0),
            Err(ProcessError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_oversized_grid() {
        let err = SpriteJobParams::new(MAX_GRID_DIMENSION + 1, 1).unwrap_err();
        assert!(err.to_string().contains("columns"));
    }

    #[test]
    fn download_name_uses_stem() {
        assert_eq!(SpriteResult::file_name_for("trip.final.mp4"), "trip.final_sprite.webp");
        assert_eq!(SpriteResult::file_name_for("noext"), "noext_sprite.webp");
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("sheet.webp");
        let result = SpriteResult {
            bytes: b"RIFF".to_vec(),
            media_type: SPRITE_MEDIA_TYPE,
            params: SpriteJobParams::new(1, 1).unwrap(),
            frame_step: 1,
        };

        result.save(&path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"RIFF");
    }
}
