//! Distribution sources for the external engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Threading variant offered by a distribution source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadingMode {
    /// Engine build that never spawns worker threads.
    Single,
    /// Engine build that parallelizes decode/encode across worker threads.
    Multi,
}

impl ThreadingMode {
    /// Human-readable label used in status text.
    pub fn label(&self) -> &'static str {
        match self {
            ThreadingMode::Single => "single-thread",
            ThreadingMode::Multi => "multi-thread",
        }
    }
}

impl fmt::Display for ThreadingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The two engine resources fetched from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// `ffprobe`: frame counting.
    Probe,
    /// `ffmpeg`: all transcoding jobs.
    Transcoder,
}

impl ResourceKind {
    /// Fetch order.
    pub const ALL: [ResourceKind; 2] = [ResourceKind::Probe, ResourceKind::Transcoder];

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Probe => "probe",
            ResourceKind::Transcoder => "transcoder",
        }
    }

    /// File name on the distribution source and on disk.
    pub fn file_name(&self) -> String {
        let stem = match self {
            ResourceKind::Probe => "ffprobe",
            ResourceKind::Transcoder => "ffmpeg",
        };
        format!("{}{}", stem, std::env::consts::EXE_SUFFIX)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Placeholder replaced by the host platform tag in package paths.
pub const PLATFORM_PLACEHOLDER: &str = "{platform}";

/// npm package serving static `ffprobe` builds, one package per platform.
pub const DEFAULT_PROBE_PACKAGE: &str = "@ffprobe-installer/{platform}";
/// npm package serving static `ffmpeg` builds, one package per platform.
pub const DEFAULT_TRANSCODER_PACKAGE: &str = "@ffmpeg-installer/{platform}";

fn default_probe_package() -> String {
    DEFAULT_PROBE_PACKAGE.to_string()
}

fn default_transcoder_package() -> String {
    DEFAULT_TRANSCODER_PACKAGE.to_string()
}

/// A remote location offering a copy of the engine's probe and transcoder.
///
/// Resources live at `{base_url}/{package}/{file}`, where each resource
/// has its own package path and `{platform}` in it is replaced by the
/// host's platform tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionSource {
    /// Display name (e.g., "unpkg.com (single-thread)").
    pub name: String,
    /// CDN root, e.g. `https://unpkg.com`.
    pub base_url: String,
    /// Package path of the probe resource.
    #[serde(default = "default_probe_package")]
    pub probe_package: String,
    /// Package path of the transcoder resource.
    #[serde(default = "default_transcoder_package")]
    pub transcoder_package: String,
    /// Threading variant of the engine served here.
    pub threading: ThreadingMode,
}

impl DistributionSource {
    /// Create a source serving the default installer packages.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        threading: ThreadingMode,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            probe_package: default_probe_package(),
            transcoder_package: default_transcoder_package(),
            threading,
        }
    }

    /// Override the package paths.
    pub fn with_packages(
        mut self,
        probe_package: impl Into<String>,
        transcoder_package: impl Into<String>,
    ) -> Self {
        self.probe_package = probe_package.into();
        self.transcoder_package = transcoder_package.into();
        self
    }

    fn package(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::Probe => &self.probe_package,
            ResourceKind::Transcoder => &self.transcoder_package,
        }
    }

    /// Full URL of a resource for the given platform tag.
    pub fn resource_url(&self, kind: ResourceKind, platform: &str) -> String {
        let package = self.package(kind).replace(PLATFORM_PLACEHOLDER, platform);
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            package.trim_matches('/'),
            kind.file_name()
        )
    }

    /// Directory-safe identifier derived from the name.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c.to_ascii_lowercase());
            } else if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        slug.trim_matches('-').to_string()
    }

    /// The built-in ordered source list: two single-thread mirrors, then
    /// the multi-thread variant.
    ///
    /// All three serve the same static installer builds. The threading
    /// variant only decides whether the engine may use worker threads.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("unpkg.com (single-thread)", "https://unpkg.com", ThreadingMode::Single),
            Self::new(
                "jsdelivr.net (single-thread)",
                "https://cdn.jsdelivr.net/npm",
                ThreadingMode::Single,
            ),
            Self::new("unpkg.com (multi-thread)", "https://unpkg.com", ThreadingMode::Multi),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_file_names() {
        assert!(ResourceKind::Probe.file_name().starts_with("ffprobe"));
        assert!(ResourceKind::Transcoder.file_name().starts_with("ffmpeg"));
        if cfg!(windows) {
            assert!(ResourceKind::Transcoder.file_name().ends_with(".exe"));
        }
    }

    #[test]
    fn resource_url_joins_without_double_slash() {
        let source = DistributionSource::new("x", "https://cdn.example/npm/", ThreadingMode::Single)
            .with_packages("/probe/{platform}/", "bin");
        assert_eq!(
            source.resource_url(ResourceKind::Probe, "linux-x64"),
            format!("https://cdn.example/npm/probe/linux-x64/{}", ResourceKind::Probe.file_name())
        );
        assert_eq!(
            source.resource_url(ResourceKind::Transcoder, "linux-x64"),
            format!("https://cdn.example/npm/bin/{}", ResourceKind::Transcoder.file_name())
        );
    }

    #[test]
    fn defaults_point_at_installer_packages() {
        let urls: Vec<String> = DistributionSource::defaults()
            .iter()
            .flat_map(|s| {
                ResourceKind::ALL
                    .into_iter()
                    .map(move |kind| s.resource_url(kind, "darwin-arm64"))
            })
            .collect();

        assert_eq!(
            urls[0],
            format!(
                "https://unpkg.com/@ffprobe-installer/darwin-arm64/{}",
                ResourceKind::Probe.file_name()
            )
        );
        assert_eq!(
            urls[3],
            format!(
                "https://cdn.jsdelivr.net/npm/@ffmpeg-installer/darwin-arm64/{}",
                ResourceKind::Transcoder.file_name()
            )
        );
        assert!(urls.iter().all(|u| !u.contains(PLATFORM_PLACEHOLDER)));
    }

    #[test]
    fn packages_default_when_omitted_in_settings() {
        let source: DistributionSource = serde_json::from_str(
            r#"{"name":"mirror","base_url":"https://mirror.example","threading":"single"}"#,
        )
        .unwrap();
        assert_eq!(source.probe_package, DEFAULT_PROBE_PACKAGE);
        assert_eq!(source.transcoder_package, DEFAULT_TRANSCODER_PACKAGE);
    }

    #[test]
    fn slug_is_directory_safe() {
        let source = DistributionSource::new(
            "unpkg.com (single-thread)",
            "https://unpkg.com",
            ThreadingMode::Single,
        );
        assert_eq!(source.slug(), "unpkg-com-single-thread");
    }

    #[test]
    fn defaults_put_multi_thread_last() {
        let sources = DistributionSource::defaults();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[2].threading, ThreadingMode::Multi);
        assert!(sources[..2].iter().all(|s| s.threading == ThreadingMode::Single));
    }

    #[test]
    fn threading_mode_serializes_lowercase() {
        let json = serde_json::to_string(&ThreadingMode::Multi).unwrap();
        assert_eq!(json, "\"multi\"");
    }
}
