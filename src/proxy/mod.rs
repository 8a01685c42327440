//! Native capture proxy
//!
//! Supervises the platform-specific capture helper and speaks line-delimited
//! JSON-RPC with it over stdio.
//!
//! # Components
//!
//! - [`path`] - locate the helper executable
//! - [`framing`] - reassemble newline-delimited messages from stdout chunks
//! - [`correlator`] - match responses to in-flight requests by id
//! - [`supervisor`] - spawn, watch and terminate the helper
//! - [`facade`] - [`CaptureProxy`] and the [`CaptureService`] trait
//!
//! # Usage
//!
//! ```rust,no_run
//! use imagehost_mcp::{
//!     config::ProxyConfig,
//!     proxy::{CaptureProxy, CaptureService},
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let proxy = CaptureProxy::new(ProxyConfig::from_env());
//!
//! if proxy.check_availability().await {
//!     let windows = proxy.list_capturable_windows(30).await?;
//!     println!("{windows}");
//! }
//!
//! proxy.cleanup();
//! # Ok(())
//! # }
//! ```

pub mod correlator;
pub mod facade;
pub mod framing;
pub mod path;
pub mod supervisor;

pub use correlator::{CorrelatorStats, PendingResponse, RequestCorrelator};
pub use facade::{CaptureProxy, CaptureService};
pub use framing::{FramingMode, MessageFramer};
pub use path::PathResolver;
pub use supervisor::{ProcessSupervisor, SupervisorState};
