//! The user-selected video file.

use std::fs;
use std::path::Path;

use crate::pipeline::ProcessError;

/// Known video container extensions and their media types.
const VIDEO_MEDIA_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("ts", "video/mp2t"),
    ("m2ts", "video/mp2t"),
    ("ogv", "video/ogg"),
    ("3gp", "video/3gpp"),
    ("3g2", "video/3gpp2"),
];

/// Media type for a lower-case file extension, if it is a known container.
///
/// Non-video extensions map to a handful of common types so that the
/// rejection message can say what was selected.
pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
    if let Some((_, media_type)) = VIDEO_MEDIA_TYPES.iter().find(|(e, _)| *e == ext) {
        return Some(media_type);
    }
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "flac" => Some("audio/flac"),
        "txt" => Some("text/plain"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// A video selected for one generation cycle.
///
/// Owned by the pipeline for the duration of a run, then dropped.
#[derive(Clone)]
pub struct VideoAsset {
    /// File name as selected (no directory components).
    pub name: String,
    /// Media type derived from the extension.
    pub media_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl VideoAsset {
    /// Create an asset from in-memory contents.
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file from disk and accept it only if it is a video.
    pub fn from_path(path: &Path) -> Result<Self, ProcessError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                ProcessError::invalid_input(format!("Not a file: {}", path.display()))
            })?;

        let media_type = media_type_for_extension(&file_extension(&name))
            .unwrap_or("application/octet-stream");

        // Reject before reading so large non-video files are never loaded
        if !media_type.starts_with("video/") {
            return Err(ProcessError::invalid_input(format!(
                "{} is not a video file ({})",
                name, media_type
            )));
        }

        let bytes = fs::read(path).map_err(|e| {
            ProcessError::invalid_input(format!("Cannot read {}: {}", path.display(), e))
        })?;

        Ok(Self::new(name, media_type, bytes))
    }

    /// Whether the media type is any `video/*` type.
    pub fn is_video(&self) -> bool {
        self.media_type.starts_with("video/")
    }

    /// Lower-cased extension used for the engine input name.
    pub fn extension(&self) -> String {
        file_extension(&self.name)
    }

    /// Size of the file contents in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Byte-free description for display.
    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            name: self.name.clone(),
            media_type: self.media_type.clone(),
            size_bytes: self.bytes.len() as u64,
        }
    }
}

impl std::fmt::Debug for VideoAsset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoAsset")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Display information about a selected asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSummary {
    pub name: String,
    pub media_type: String,
    pub size_bytes: u64,
}

/// Last dot-segment of a file name, lower-cased and restricted to
/// alphanumerics. Falls back to "bin" when nothing usable remains.
fn file_extension(name: &str) -> String {
    let ext: String = name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}
