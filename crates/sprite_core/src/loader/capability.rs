//! Host capability detection.

/// What the host can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    /// Platform tag used in resource URLs; `None` when no prebuilt engine exists.
    pub platform: Option<&'static str>,
    /// Whether multi-threaded engine builds may be used.
    pub worker_threads: bool,
}

impl HostCapabilities {
    /// Probe the running host.
    ///
    /// Worker threads require more than one hardware thread and
    /// `allow_multi_thread`.
    pub fn detect(allow_multi_thread: bool) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            platform: platform_tag(),
            worker_threads: allow_multi_thread && parallelism > 1,
        }
    }

    /// Description of the host for unsupported-runtime errors.
    pub fn host_description() -> String {
        format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
    }
}

/// Platform tag of the running host, if a prebuilt engine exists for it.
pub fn platform_tag() -> Option<&'static str> {
    let os = if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "windows") {
        "win32"
    } else {
        return None;
    };

    let arch = if cfg!(target_arch = "x86_64") {
        "x64"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        return None;
    };

    match (os, arch) {
        ("linux", "x64") => Some("linux-x64"),
        ("linux", "arm64") => Some("linux-arm64"),
        ("darwin", "x64") => Some("darwin-x64"),
        ("darwin", "arm64") => Some("darwin-arm64"),
        ("win32", "x64") => Some("win32-x64"),
        _ => None,
    }
}
