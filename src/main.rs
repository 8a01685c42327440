//! imagehost-mcp: MCP server for an image-hosting API with native capture

use std::sync::Arc;

use anyhow::Result;
use imagehost_mcp::{config::ProxyConfig, mcp::ImageHostMcpServer, proxy::CaptureProxy};
use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP transport, so logs go to stderr
    // Respects RUST_LOG environment variable
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("imagehost_mcp=info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .init();

    info!("imagehost-mcp server starting...");
    info!("Protocol: Model Context Protocol (MCP)");
    info!("Transport: stdio");

    let config = ProxyConfig::from_env();
    info!(target_os = ?config.target_os, framing = ?config.framing_mode, "Capture proxy configured");

    // One proxy for the whole process; the helper starts on first use
    let proxy = Arc::new(CaptureProxy::new(config));
    let server = ImageHostMcpServer::new(proxy.clone());

    let service = server.serve(stdio()).await?;
    info!("Server info: {:?}", service.peer_info());
    info!("Waiting for MCP requests...");

    tokio::select! {
        result = service.waiting() => {
            result?;
            info!("MCP transport closed");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    proxy.cleanup();
    info!("imagehost-mcp server shutting down");
    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
