//! Data models and wire types for imagehost-mcp
//!
//! This module defines the types exchanged with the capture helper:
//! - JSON-RPC request and response envelopes
//! - Tool invocation parameters and per-tool arguments
//! - Constants naming the helper's methods and tools

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version sent in every request envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Introspection method used as the liveness handshake
pub const HANDSHAKE_METHOD: &str = "tools/list";

/// Method used to invoke a helper tool
pub const CALL_TOOL_METHOD: &str = "tools/call";

/// Tool ids understood by the capture helper
pub mod tool_names {
    /// Enumerate windows that can be captured
    pub const LIST_CAPTURABLE_WINDOWS: &str = "list_capturable_windows";
    /// Capture the primary screen and upload the result
    pub const CAPTURE_PRIMARY_SCREEN: &str = "capture_and_upload_primary_screen";
    /// Let the user pick a region, capture it, and upload the result
    pub const CAPTURE_REGION: &str = "capture_and_upload_region";
    /// Capture a single window and upload the result
    pub const CAPTURE_WINDOW: &str = "capture_and_upload_window";
}

/// Outbound request envelope (proxy → helper)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestEnvelope<'a> {
    /// Always [`JSONRPC_VERSION`]
    pub jsonrpc: &'static str,
    /// Decimal correlation id
    pub id: &'a str,
    /// Dotted/slashed method name
    pub method: &'a str,
    /// Method parameters
    pub params: &'a Value,
}

impl<'a> RequestEnvelope<'a> {
    /// Creates a request envelope for the given id, method and params
    pub fn new(id: &'a str, method: &'a str, params: &'a Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Inbound response envelope (helper → proxy)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponseEnvelope {
    /// Correlation id echoed from the request
    pub id: String,
    /// Successful result, if any
    #[serde(default)]
    pub result: Option<Value>,
    /// Error object, if the request failed
    #[serde(default)]
    pub error: Option<RpcError>,
}

/// Error object carried by a failed response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    /// JSON-RPC error code
    pub code: i64,
    /// Human-readable message
    pub message: String,
}

/// Parameters of a [`CALL_TOOL_METHOD`] request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallParams {
    /// Tool id, one of [`tool_names`]
    pub name: String,
    /// Tool-specific arguments
    pub arguments: Value,
}

impl ToolCallParams {
    /// Creates tool call params from a tool id and serializable arguments
    pub fn new(name: &str, arguments: impl Serialize) -> serde_json::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            arguments: serde_json::to_value(arguments)?,
        })
    }
}

/// Arguments for [`tool_names::LIST_CAPTURABLE_WINDOWS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ListWindowsArgs {
    /// Maximum number of windows to return
    pub limit: u32,
}

/// Arguments for [`tool_names::CAPTURE_WINDOW`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CaptureWindowArgs {
    /// Platform window handle as reported by the window listing
    pub window_handle: WindowHandle,
}

/// Platform-specific window identifier reported by the helper
///
/// Handles are numeric on both supported platforms (`CGWindowID` on macOS,
/// `HWND` on Windows).
pub type WindowHandle = u64;

/// Empty argument object for tools that take no arguments
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoArgs {}
