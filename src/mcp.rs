//! MCP service implementation with tool routing
//!
//! This module exposes the native capture proxy as MCP tools. Every capture
//! tool first checks (and if needed starts) the helper, then forwards a typed
//! call through [`CaptureService`].
//!
//! "Helper unavailable" is an expected outcome, so it is reported as a tool
//! result with `is_error` set rather than as a protocol error.

use std::sync::Arc;

use rmcp::{
    ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Content, ErrorData as McpError, Implementation, ServerCapabilities,
        ServerInfo,
    },
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::ProxyError, model::WindowHandle, proxy::CaptureService};

/// Default number of windows returned by `list_capturable_windows`
pub const DEFAULT_WINDOW_LIMIT: u32 = 30;

/// Parameters for the list_capturable_windows tool
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct ListCapturableWindowsParams {
    /// Maximum number of windows to return (default: 30)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Parameters for the capture_window tool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CaptureWindowParams {
    /// Window handle as returned by list_capturable_windows
    pub window_handle: WindowHandle,
}

/// Builds the tool result returned while the helper is unavailable
fn unavailable_result(error: Option<&ProxyError>) -> CallToolResult {
    let error = error.unwrap_or(&ProxyError::Unavailable);
    CallToolResult::error(vec![Content::text(format!(
        "{}. {}",
        error,
        error.remediation_hint()
    ))])
}

/// Converts a ProxyError into a tool result or an MCP error
///
/// Unavailability becomes a flagged tool result; helper-side rejections are
/// invalid params; anything else is an internal error.
fn convert_proxy_error(error: ProxyError) -> Result<CallToolResult, McpError> {
    if error.is_unavailable() {
        return Ok(unavailable_result(Some(&error)));
    }

    let message = format!("{}. {}", error, error.remediation_hint());
    match error {
        ProxyError::Protocol { .. } => Err(McpError::invalid_params(message, None)),
        _ => Err(McpError::internal_error(message, None)),
    }
}

fn json_result(value: &Value) -> Result<CallToolResult, McpError> {
    let json_str = serde_json::to_string(value).map_err(|e| {
        McpError::internal_error(format!("Failed to serialize helper result: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(json_str)]))
}

/// Image hosting MCP server
///
/// # Tools
///
/// - `check_capture_availability`: Start the helper if needed and report status
/// - `list_capturable_windows`: Enumerate windows that can be captured
/// - `capture_primary_screen`: Capture and upload the primary screen
/// - `capture_region`: Capture and upload a user-selected region
/// - `capture_window`: Capture and upload a single window
#[derive(Clone)]
pub struct ImageHostMcpServer {
    /// Tool router for dispatching tool calls
    /// Note: This field is used by the #[tool_router] macro
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
    /// Native capture proxy
    capture: Arc<dyn CaptureService>,
}

#[tool_router]
impl ImageHostMcpServer {
    /// Creates a new server backed by the given capture service
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use imagehost_mcp::{config::ProxyConfig, mcp::ImageHostMcpServer, proxy::CaptureProxy};
    ///
    /// let proxy = Arc::new(CaptureProxy::new(ProxyConfig::default()));
    /// let server = ImageHostMcpServer::new(proxy);
    /// ```
    pub fn new(capture: Arc<dyn CaptureService>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            capture,
        }
    }

    /// Reports whether native capture is available
    ///
    /// Starts the helper on first use. Never fails; the response is
    /// `{"available": true|false}`.
    #[tool(description = "Check whether native screen capture is available on this machine")]
    pub async fn check_capture_availability(&self) -> Result<CallToolResult, McpError> {
        let available = self.capture.check_availability().await;
        json_result(&serde_json::json!({ "available": available }))
    }

    /// Lists capturable windows
    ///
    /// # Examples
    ///
    /// Request:
    /// ```json
    /// {
    ///   "method": "tools/call",
    ///   "params": {
    ///     "name": "list_capturable_windows",
    ///     "arguments": { "limit": 10 }
    ///   }
    /// }
    /// ```
    #[tool(description = "List windows that can be captured, with their handles")]
    pub async fn list_capturable_windows(
        &self,
        Parameters(params): Parameters<ListCapturableWindowsParams>,
    ) -> Result<CallToolResult, McpError> {
        if !self.capture.check_availability().await {
            return Ok(unavailable_result(None));
        }

        let limit = params.limit.unwrap_or(DEFAULT_WINDOW_LIMIT);
        match self.capture.list_capturable_windows(limit).await {
            Ok(value) => json_result(&value),
            Err(e) => convert_proxy_error(e),
        }
    }

    #[tool(description = "Capture the primary screen and upload it to the image host")]
    pub async fn capture_primary_screen(&self) -> Result<CallToolResult, McpError> {
        if !self.capture.check_availability().await {
            return Ok(unavailable_result(None));
        }

        match self.capture.capture_and_upload_primary_screen().await {
            Ok(value) => json_result(&value),
            Err(e) => convert_proxy_error(e),
        }
    }

    #[tool(description = "Let the user select a screen region, capture it and upload it")]
    pub async fn capture_region(&self) -> Result<CallToolResult, McpError> {
        if !self.capture.check_availability().await {
            return Ok(unavailable_result(None));
        }

        match self.capture.capture_and_upload_region().await {
            Ok(value) => json_result(&value),
            Err(e) => convert_proxy_error(e),
        }
    }

    /// Captures one window by handle and uploads it
    #[tool(description = "Capture a window by handle and upload it to the image host")]
    pub async fn capture_window(
        &self,
        Parameters(params): Parameters<CaptureWindowParams>,
    ) -> Result<CallToolResult, McpError> {
        if !self.capture.check_availability().await {
            return Ok(unavailable_result(None));
        }

        match self
            .capture
            .capture_and_upload_window(params.window_handle)
            .await
        {
            Ok(value) => json_result(&value),
            Err(e) => convert_proxy_error(e),
        }
    }
}

#[tool_handler]
impl ServerHandler for ImageHostMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Capture screenshots with the native helper and upload them to the image host. \
                 Call check_capture_availability before the capture tools."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}
