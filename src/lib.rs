//! imagehost-mcp: MCP server for an image-hosting API
//!
//! This library exposes screen capture and upload to AI assistants through
//! the Model Context Protocol. Capture itself runs in a platform-specific
//! native helper; this crate supervises that helper and proxies tool calls to
//! it over line-delimited JSON-RPC on stdio.

pub mod config;
pub mod error;
pub mod mcp;
pub mod model;
pub mod proxy;
