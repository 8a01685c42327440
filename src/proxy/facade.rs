//! Public entry point for native capture
//!
//! [`CaptureProxy`] combines the supervisor with typed tool operations. The
//! binary owns exactly one instance (behind an `Arc`) for its whole lifetime
//! and calls [`CaptureProxy::cleanup`] on shutdown.

use async_trait::async_trait;
use serde_json::Value;

use super::{
    correlator::CorrelatorStats,
    supervisor::{ProcessSupervisor, SupervisorState},
};
use crate::{
    config::ProxyConfig,
    error::{ProxyError, ProxyResult},
    model::{
        CALL_TOOL_METHOD, CaptureWindowArgs, ListWindowsArgs, NoArgs, ToolCallParams, WindowHandle,
        tool_names,
    },
};

/// Capture operations offered to the tool layer
///
/// Implemented by [`CaptureProxy`]; the MCP server depends only on this
/// trait so it can be exercised without a helper process.
#[async_trait]
pub trait CaptureService: Send + Sync {
    /// Returns whether native capture is usable, starting the helper if needed
    async fn check_availability(&self) -> bool;

    /// Lists up to `limit` capturable windows
    async fn list_capturable_windows(&self, limit: u32) -> ProxyResult<Value>;

    /// Captures the primary screen and uploads it
    async fn capture_and_upload_primary_screen(&self) -> ProxyResult<Value>;

    /// Lets the user select a region, captures it and uploads it
    async fn capture_and_upload_region(&self) -> ProxyResult<Value>;

    /// Captures one window and uploads it
    async fn capture_and_upload_window(&self, handle: WindowHandle) -> ProxyResult<Value>;
}

/// Proxy to the native capture helper
#[derive(Debug)]
pub struct CaptureProxy {
    supervisor: ProcessSupervisor,
}

impl CaptureProxy {
    /// Creates a proxy; the helper is started lazily by
    /// [`check_availability`](CaptureService::check_availability) or
    /// [`initialize`](Self::initialize)
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(config),
        }
    }

    /// Starts the helper and performs the handshake
    pub async fn initialize(&self) -> ProxyResult<()> {
        self.supervisor.initialize().await
    }

    /// Sends a raw request to the helper
    pub async fn send_request(&self, method: &str, params: Value) -> ProxyResult<Value> {
        self.supervisor.send_request(method, params).await
    }

    /// Whether the helper is running and passed its handshake
    pub fn is_available(&self) -> bool {
        self.supervisor.is_available()
    }

    /// Terminates the helper; safe to call more than once
    pub fn cleanup(&self) {
        self.supervisor.cleanup();
    }

    /// Lifecycle state of the helper process
    pub fn state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    /// Requests still waiting for a helper response
    pub fn pending_requests(&self) -> usize {
        self.supervisor.pending_requests()
    }

    /// Counters of dropped helper messages
    pub fn stats(&self) -> CorrelatorStats {
        self.supervisor.stats()
    }

    async fn call_tool(&self, name: &str, arguments: impl serde::Serialize) -> ProxyResult<Value> {
        if !self.is_available() {
            return Err(ProxyError::Unavailable);
        }

        let params = serde_json::to_value(ToolCallParams::new(name, arguments)?)?;
        tracing::debug!(tool = name, "Forwarding tool call to capture helper");
        self.send_request(CALL_TOOL_METHOD, params).await
    }
}

#[async_trait]
impl CaptureService for CaptureProxy {
    async fn check_availability(&self) -> bool {
        if self.is_available() {
            return true;
        }

        match self.initialize().await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!(error = %e, "Native capture unavailable");
                false
            }
        }
    }

    async fn list_capturable_windows(&self, limit: u32) -> ProxyResult<Value> {
        self.call_tool(tool_names::LIST_CAPTURABLE_WINDOWS, ListWindowsArgs { limit })
            .await
    }

    async fn capture_and_upload_primary_screen(&self) -> ProxyResult<Value> {
        self.call_tool(tool_names::CAPTURE_PRIMARY_SCREEN, NoArgs::default())
            .await
    }

    async fn capture_and_upload_region(&self) -> ProxyResult<Value> {
        self.call_tool(tool_names::CAPTURE_REGION, NoArgs::default())
            .await
    }

    async fn capture_and_upload_window(&self, handle: WindowHandle) -> ProxyResult<Value> {
        self.call_tool(
            tool_names::CAPTURE_WINDOW,
            CaptureWindowArgs {
                window_handle: handle,
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn proxy_without_helper() -> CaptureProxy {
        CaptureProxy::new(ProxyConfig {
            helper_path_override: Some(PathBuf::from("/nonexistent/imagehost-capture")),
            ..ProxyConfig::default()
        })
    }

    #[tokio::test]
    async fn test_check_availability_twice_without_helper() {
        let proxy = proxy_without_helper();

        assert!(!proxy.check_availability().await);
        assert!(!proxy.check_availability().await);
        assert!(!proxy.is_available());
        assert_eq!(proxy.state(), SupervisorState::Uninitialized);
        assert_eq!(proxy.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_typed_operations_fail_when_unavailable() {
        let proxy = proxy_without_helper();

        assert!(matches!(
            proxy.list_capturable_windows(30).await,
            Err(ProxyError::Unavailable)
        ));
        assert!(matches!(
            proxy.capture_and_upload_primary_screen().await,
            Err(ProxyError::Unavailable)
        ));
        assert!(matches!(
            proxy.capture_and_upload_region().await,
            Err(ProxyError::Unavailable)
        ));
        assert!(matches!(
            proxy.capture_and_upload_window(7).await,
            Err(ProxyError::Unavailable)
        ));
        assert_eq!(proxy.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_initialize_reports_path_failure() {
        let proxy = proxy_without_helper();

        assert!(matches!(
            proxy.initialize().await,
            Err(ProxyError::PathResolution)
        ));
    }

    #[test]
    fn test_cleanup_without_initialize() {
        let proxy = proxy_without_helper();

        proxy.cleanup();
        proxy.cleanup();

        assert!(!proxy.is_available());
    }
}
