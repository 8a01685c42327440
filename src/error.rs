//! Error types for the native capture proxy
//!
//! This module defines the error taxonomy for talking to the capture helper
//! process. Each error provides context about what went wrong and an
//! actionable remediation hint that the MCP layer forwards to clients.
//!
//! Malformed and unmatched inbound messages are deliberately absent here:
//! they are dropped (and counted) by the correlator and never reach a caller.

use std::path::PathBuf;

/// Result type alias for capture proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Error type for capture proxy operations
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// No usable helper executable was found
    #[error("Capture helper executable could not be located")]
    PathResolution,

    /// The helper process could not be started
    #[error("Failed to spawn capture helper at {path:?}: {source}")]
    Spawn {
        /// Path that was executed
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The helper is not running or has not passed its handshake
    #[error("Native capture proxy is unavailable")]
    Unavailable,

    /// Writing a request to the helper's stdin failed
    #[error("Failed to write request to capture helper: {0}")]
    TransportWrite(#[source] std::io::Error),

    /// The helper answered with a JSON-RPC error object
    #[error("Capture helper returned error {code}: {message}")]
    Protocol {
        /// JSON-RPC error code
        code: i64,
        /// Error message from the helper
        message: String,
    },

    /// The liveness handshake did not complete in time
    #[error("Capture helper did not answer the handshake within {timeout_ms}ms")]
    HandshakeTimeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
    },

    /// The session that owned a pending request was torn down
    #[error("Capture helper session closed before a response arrived")]
    SessionClosed,

    /// Request envelope could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProxyError {
    /// Returns an actionable remediation hint for this error
    ///
    /// # Examples
    ///
    /// ```
    /// use imagehost_mcp::error::ProxyError;
    ///
    /// let hint = ProxyError::PathResolution.remediation_hint();
    /// assert!(hint.contains("IMAGEHOST_CAPTURE_HELPER_PATH"));
    /// ```
    pub fn remediation_hint(&self) -> &str {
        match self {
            ProxyError::PathResolution => {
                "Install the native capture helper, or set IMAGEHOST_CAPTURE_HELPER_PATH to the \
                 full path of the helper executable. Native capture is only supported on macOS \
                 and Windows."
            }
            ProxyError::Spawn { .. } => {
                "The helper executable exists but could not be started. Check that it is \
                 executable and built for this platform."
            }
            ProxyError::Unavailable => {
                "Call check_capture_availability first. If it keeps returning false, the helper \
                 is missing or crashed; check the server logs."
            }
            ProxyError::TransportWrite(_) => {
                "The helper process stopped accepting input, most likely because it exited. \
                 Retry after check_capture_availability restarts it."
            }
            ProxyError::Protocol { .. } => {
                "The helper rejected the request. Check the tool arguments (for example the \
                 window handle from list_capturable_windows)."
            }
            ProxyError::HandshakeTimeout { .. } => {
                "The helper started but did not respond. Increase \
                 IMAGEHOST_CAPTURE_HANDSHAKE_TIMEOUT_MS or check that the helper speaks the \
                 line-delimited JSON-RPC protocol on stdio."
            }
            ProxyError::SessionClosed => {
                "The helper was restarted while this request was in flight. Retry the request."
            }
            ProxyError::Serialization(_) => "Internal serialization failure; please report it.",
        }
    }

    /// Whether this error means the helper is not usable right now
    ///
    /// The MCP layer reports these as regular tool results rather than
    /// protocol errors, since unavailability is an expected outcome.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ProxyError::PathResolution
                | ProxyError::Spawn { .. }
                | ProxyError::Unavailable
                | ProxyError::HandshakeTimeout { .. }
        )
    }
}
