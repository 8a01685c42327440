//! Helper executable resolution
//!
//! Determines where the platform-specific capture helper lives. Resolution
//! order, first match wins:
//!
//! 1. `IMAGEHOST_CAPTURE_HELPER_PATH`, accepted only if it exists (no fallback)
//! 2. Container mount path for the target OS family, when running in a container
//! 3. OS default install path
//!
//! Anything else resolves to `None`.

use std::{
    env,
    path::{Path, PathBuf},
};

use crate::config::{OsFamily, ProxyConfig};

/// Default install location on macOS
pub const MACOS_DEFAULT_PATH: &str =
    "/Applications/ImageHost Capture.app/Contents/MacOS/imagehost-capture";

/// Default install location on Windows
pub const WINDOWS_DEFAULT_PATH: &str = r"C:\Program Files\ImageHost\imagehost-capture.exe";

/// Mount point of a macOS helper inside a container
pub const CONTAINER_MACOS_PATH: &str = "/opt/imagehost/native/macos/imagehost-capture";

/// Mount point of a Windows helper inside a container
pub const CONTAINER_WINDOWS_PATH: &str = "/opt/imagehost/native/windows/imagehost-capture.exe";

/// Marker files created by container runtimes
const CONTAINER_MARKER_FILES: &[&str] = &["/.dockerenv", "/run/.containerenv"];

/// cgroup file of the init process
const INIT_CGROUP_FILE: &str = "/proc/1/cgroup";

/// Substrings in the init cgroup that name a container runtime
const CGROUP_RUNTIME_MARKERS: &[&str] = &["docker", "containerd", "kubepods", "lxc", "podman"];

/// Environment variables set by container orchestrators
const CONTAINER_ENV_VARS: &[&str] = &["KUBERNETES_SERVICE_HOST", "container"];

/// Read-only filesystem access used during resolution
pub trait FsProbe {
    /// Whether the path exists
    fn exists(&self, path: &Path) -> bool;

    /// Reads a small text file, returning `None` on any error
    fn read_to_string(&self, path: &Path) -> Option<String>;
}

/// [`FsProbe`] backed by the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct RealFs;

impl FsProbe for RealFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

/// Resolves the helper executable path
#[derive(Debug, Clone)]
pub struct PathResolver<P = RealFs> {
    override_path: Option<PathBuf>,
    target_os: OsFamily,
    fs: P,
}

impl PathResolver<RealFs> {
    /// Creates a resolver for the given configuration using the real filesystem
    pub fn new(config: &ProxyConfig) -> Self {
        Self::with_probe(config, RealFs)
    }
}

impl<P: FsProbe> PathResolver<P> {
    /// Creates a resolver with a custom filesystem probe
    pub fn with_probe(config: &ProxyConfig, fs: P) -> Self {
        Self {
            override_path: config.helper_path_override.clone(),
            target_os: config.target_os,
            fs,
        }
    }

    /// Resolves the helper path, reading container signals from the process
    /// environment
    pub fn resolve(&self) -> Option<PathBuf> {
        self.resolve_with_env(|key| env::var(key).ok())
    }

    /// Resolves the helper path with a custom environment provider
    pub fn resolve_with_env<F>(&self, env_provider: F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.override_path {
            if self.fs.exists(path) {
                tracing::debug!(path = %path.display(), "Using helper path override");
                return Some(path.clone());
            }
            tracing::warn!(
                path = %path.display(),
                "Helper path override does not exist; not falling back"
            );
            return None;
        }

        let in_container = self.is_container(&env_provider);
        let candidate = match (self.target_os, in_container) {
            (OsFamily::MacOS, true) => CONTAINER_MACOS_PATH,
            (OsFamily::Windows, true) => CONTAINER_WINDOWS_PATH,
            (OsFamily::MacOS, false) => MACOS_DEFAULT_PATH,
            (OsFamily::Windows, false) => WINDOWS_DEFAULT_PATH,
            (OsFamily::Other, _) => {
                tracing::debug!("Native capture is not supported on this OS family");
                return None;
            }
        };

        let candidate = PathBuf::from(candidate);
        if self.fs.exists(&candidate) {
            tracing::debug!(path = %candidate.display(), in_container, "Resolved helper path");
            Some(candidate)
        } else {
            tracing::debug!(path = %candidate.display(), in_container, "Helper not found");
            None
        }
    }

    /// Detects execution inside a container
    fn is_container<F>(&self, env_provider: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        if CONTAINER_MARKER_FILES
            .iter()
            .any(|marker| self.fs.exists(Path::new(marker)))
        {
            return true;
        }

        if let Some(cgroup) = self.fs.read_to_string(Path::new(INIT_CGROUP_FILE)) {
            if CGROUP_RUNTIME_MARKERS
                .iter()
                .any(|marker| cgroup.contains(marker))
            {
                return true;
            }
        }

        CONTAINER_ENV_VARS
            .iter()
            .any(|key| env_provider(key).is_some_and(|value| !value.is_empty()))
    }
}
