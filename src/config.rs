//! Environment-derived configuration for the capture proxy
//!
//! All settings are optional. The environment is read through an injectable
//! provider so tests never have to mutate the process environment.

use std::{env, path::PathBuf, time::Duration};

use crate::proxy::framing::{DEFAULT_MAX_MESSAGE_BYTES, FramingMode};

/// Full path to the helper executable, bypassing all other resolution
pub const HELPER_PATH_ENV: &str = "IMAGEHOST_CAPTURE_HELPER_PATH";

/// Target OS family for the helper (`macos` or `windows`)
pub const TARGET_OS_ENV: &str = "IMAGEHOST_CAPTURE_TARGET_OS";

/// Extra whitespace-separated arguments passed to the helper
pub const HELPER_ARGS_ENV: &str = "IMAGEHOST_CAPTURE_HELPER_ARGS";

/// Handshake timeout in milliseconds
pub const HANDSHAKE_TIMEOUT_ENV: &str = "IMAGEHOST_CAPTURE_HANDSHAKE_TIMEOUT_MS";

/// Framing mode for helper output (`newline` or `brace`)
pub const FRAMING_ENV: &str = "IMAGEHOST_CAPTURE_FRAMING";

/// Largest helper message accepted, in bytes
pub const MAX_MESSAGE_BYTES_ENV: &str = "IMAGEHOST_CAPTURE_MAX_MESSAGE_BYTES";

/// Default time allowed for the liveness handshake
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Operating system family the helper is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// macOS
    MacOS,
    /// Windows
    Windows,
    /// Anything else; native capture is not supported
    Other,
}

impl OsFamily {
    /// The OS family this binary was compiled for
    pub fn current() -> Self {
        Self::from_os_name(env::consts::OS)
    }

    /// Parses an OS name as reported by `std::env::consts::OS`
    pub fn from_os_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "macos" | "darwin" => OsFamily::MacOS,
            "windows" | "win32" => OsFamily::Windows,
            _ => OsFamily::Other,
        }
    }
}

/// Settings for locating and talking to the capture helper
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Explicit helper path (highest precedence)
    pub helper_path_override: Option<PathBuf>,
    /// OS family used to pick default and container-mount paths
    pub target_os: OsFamily,
    /// Extra arguments passed to the helper on spawn
    pub helper_args: Vec<String>,
    /// Upper bound on the liveness handshake
    pub handshake_timeout: Duration,
    /// How helper output is split into messages
    pub framing_mode: FramingMode,
    /// Helper messages larger than this are dropped, leaving their request
    /// pending
    pub max_message_bytes: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            helper_path_override: None,
            target_os: OsFamily::current(),
            helper_args: Vec::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            framing_mode: FramingMode::default(),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}

impl ProxyConfig {
    /// Builds the configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_env_provider(|key| env::var(key).ok())
    }

    /// Builds the configuration from a custom environment provider
    ///
    /// Empty values are treated as unset. Unparsable numbers fall back to
    /// their defaults with a warning.
    pub fn from_env_provider<F>(env_provider: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| env_provider(key).filter(|value| !value.trim().is_empty());

        let handshake_timeout = match get(HANDSHAKE_TIMEOUT_ENV) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) => Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(value = %raw, "Ignoring invalid {}", HANDSHAKE_TIMEOUT_ENV);
                    DEFAULT_HANDSHAKE_TIMEOUT
                }
            },
            None => DEFAULT_HANDSHAKE_TIMEOUT,
        };

        let max_message_bytes = match get(MAX_MESSAGE_BYTES_ENV) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(bytes) if bytes > 0 => bytes,
                _ => {
                    tracing::warn!(value = %raw, "Ignoring invalid {}", MAX_MESSAGE_BYTES_ENV);
                    DEFAULT_MAX_MESSAGE_BYTES
                }
            },
            None => DEFAULT_MAX_MESSAGE_BYTES,
        };

        Self {
            helper_path_override: get(HELPER_PATH_ENV).map(PathBuf::from),
            target_os: get(TARGET_OS_ENV)
                .map(|name| OsFamily::from_os_name(&name))
                .unwrap_or_else(OsFamily::current),
            helper_args: get(HELPER_ARGS_ENV)
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            handshake_timeout,
            framing_mode: match get(FRAMING_ENV).as_deref().map(str::trim) {
                Some("brace") => FramingMode::BraceTerminated,
                Some("newline") | None => FramingMode::NewlineOnly,
                Some(other) => {
                    tracing::warn!(value = %other, "Ignoring unknown {}", FRAMING_ENV);
                    FramingMode::NewlineOnly
                }
            },
            max_message_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn mock_env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_env_empty() {
        let config = ProxyConfig::from_env_provider(mock_env(&[]));

        assert!(config.helper_path_override.is_none());
        assert_eq!(config.target_os, OsFamily::current());
        assert!(config.helper_args.is_empty());
        assert_eq!(config.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
        assert_eq!(config.framing_mode, FramingMode::NewlineOnly);
        assert_eq!(config.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
    }

    #[test]
    fn test_reads_all_variables() {
        let config = ProxyConfig::from_env_provider(mock_env(&[
            (HELPER_PATH_ENV, "/usr/local/bin/capture"),
            (TARGET_OS_ENV, "windows"),
            (HELPER_ARGS_ENV, "--stdio  --verbose"),
            (HANDSHAKE_TIMEOUT_ENV, "250"),
            (FRAMING_ENV, "brace"),
            (MAX_MESSAGE_BYTES_ENV, "1048576"),
        ]));

        assert_eq!(
            config.helper_path_override,
            Some(PathBuf::from("/usr/local/bin/capture"))
        );
        assert_eq!(config.target_os, OsFamily::Windows);
        assert_eq!(config.helper_args, vec!["--stdio", "--verbose"]);
        assert_eq!(config.handshake_timeout, Duration::from_millis(250));
        assert_eq!(config.framing_mode, FramingMode::BraceTerminated);
        assert_eq!(config.max_message_bytes, 1024 * 1024);
    }

    #[test]
    fn test_empty_override_treated_as_unset() {
        let config = ProxyConfig::from_env_provider(mock_env(&[(HELPER_PATH_ENV, "  ")]));
        assert!(config.helper_path_override.is_none());
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config =
            ProxyConfig::from_env_provider(mock_env(&[(HANDSHAKE_TIMEOUT_ENV, "soon")]));
        assert_eq!(config.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
    }

    #[test]
    fn test_zero_message_cap_falls_back() {
        let config = ProxyConfig::from_env_provider(mock_env(&[(MAX_MESSAGE_BYTES_ENV, "0")]));
        assert_eq!(config.max_message_bytes, DEFAULT_MAX_MESSAGE_BYTES);
    }

    #[test]
    fn test_os_family_parsing() {
        assert_eq!(OsFamily::from_os_name("macos"), OsFamily::MacOS);
        assert_eq!(OsFamily::from_os_name("Darwin"), OsFamily::MacOS);
        assert_eq!(OsFamily::from_os_name("windows"), OsFamily::Windows);
        assert_eq!(OsFamily::from_os_name("linux"), OsFamily::Other);
    }
}
