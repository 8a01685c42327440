//! Capture helper process lifecycle
//!
//! [`ProcessSupervisor`] spawns the helper, wires its stdout through the
//! [`MessageFramer`] into the [`RequestCorrelator`], watches for process
//! exit, and owns the availability flag.
//!
//! ```text
//! Uninitialized ──initialize──▶ Starting ──handshake ok──▶ Running
//!                                  │                          │
//!                                  └──exit / cleanup──▶ Stopped ◀┘
//! ```
//!
//! A fresh `initialize` from `Stopped` starts a new session. Pending requests
//! of an exited session are not rejected; they stay parked until the next
//! session replaces the old one, at which point they fail with
//! [`ProxyError::SessionClosed`].

use std::{
    path::Path,
    process::Stdio,
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader},
    process::{Child, Command},
    sync::{oneshot, watch},
};

use super::{
    correlator::{CorrelatorStats, RequestCorrelator},
    framing::MessageFramer,
    path::PathResolver,
};
use crate::{
    config::ProxyConfig,
    error::{ProxyError, ProxyResult},
    model::HANDSHAKE_METHOD,
};

/// Size of a single read from the helper's stdout
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Lifecycle state of the helper process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// No helper has been started yet
    Uninitialized,
    /// Helper spawned, handshake in progress
    Starting,
    /// Helper passed the handshake and accepts requests
    Running,
    /// Helper exited or was terminated
    Stopped,
}

/// One spawned helper and its request table
struct Session {
    generation: u64,
    correlator: Arc<RequestCorrelator>,
    /// Dropping or firing this terminates the process
    kill: Option<oneshot::Sender<()>>,
}

struct Shared {
    state: SupervisorState,
    available: bool,
    generation: u64,
    session: Option<Session>,
}

/// Supervises the capture helper process
pub struct ProcessSupervisor {
    config: ProxyConfig,
    resolver: PathResolver,
    shared: Arc<Mutex<Shared>>,
    init_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("state", &self.state())
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    /// Creates a supervisor; nothing is spawned until [`initialize`](Self::initialize)
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            resolver: PathResolver::new(&config),
            config,
            shared: Arc::new(Mutex::new(Shared {
                state: SupervisorState::Uninitialized,
                available: false,
                generation: 0,
                session: None,
            })),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Starts the helper and performs the liveness handshake
    ///
    /// Any previous helper is terminated first. Concurrent calls are
    /// serialized. On failure the supervisor is left unavailable.
    pub async fn initialize(&self) -> ProxyResult<()> {
        let _init = self.init_lock.lock().await;

        self.cleanup();

        let Some(path) = self.resolver.resolve() else {
            tracing::info!("Native capture helper not found; capture tools are unavailable");
            self.shared.lock().available = false;
            return Err(ProxyError::PathResolution);
        };

        let (correlator, generation, mut exited) = match self.spawn(&path) {
            Ok(spawned) => spawned,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to start capture helper");
                self.shared.lock().available = false;
                return Err(e);
            }
        };

        let probe = tokio::time::timeout(self.config.handshake_timeout, async {
            tokio::select! {
                biased;
                response = correlator.request(HANDSHAKE_METHOD, json!({})) => response,
                _ = exited.wait_for(|exited| *exited) => Err(ProxyError::Unavailable),
            }
        })
        .await;

        match probe {
            Ok(Ok(_)) => {
                let mut shared = self.shared.lock();
                if shared.generation == generation && shared.state == SupervisorState::Starting {
                    shared.state = SupervisorState::Running;
                    shared.available = true;
                    tracing::info!(path = %path.display(), "Capture helper ready");
                    Ok(())
                } else {
                    tracing::warn!("Capture helper exited during handshake");
                    shared.available = false;
                    Err(ProxyError::Unavailable)
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Capture helper handshake failed");
                self.cleanup();
                Err(e)
            }
            Err(_) => {
                let timeout_ms = saturating_millis(self.config.handshake_timeout);
                tracing::warn!(timeout_ms, "Capture helper handshake timed out");
                self.cleanup();
                Err(ProxyError::HandshakeTimeout { timeout_ms })
            }
        }
    }

    /// Spawns the helper and attaches reader, stderr and exit-watcher tasks
    ///
    /// The returned receiver flips to `true` once the process has exited.
    fn spawn(
        &self,
        path: &Path,
    ) -> ProxyResult<(Arc<RequestCorrelator>, u64, watch::Receiver<bool>)> {
        let spawn_error = |source: std::io::Error| ProxyError::Spawn {
            path: path.to_path_buf(),
            source,
        };

        let mut child = Command::new(path)
            .args(&self.config.helper_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(spawn_error(std::io::Error::other("helper stdio was not piped")));
        };

        tracing::info!(path = %path.display(), pid = ?child.id(), "Spawned capture helper");

        let correlator = Arc::new(RequestCorrelator::new(stdin));
        let (kill_tx, kill_rx) = oneshot::channel();
        let (exited_tx, exited_rx) = watch::channel(false);

        let generation = {
            let mut shared = self.shared.lock();
            shared.generation += 1;
            shared.state = SupervisorState::Starting;
            shared.available = false;
            // Replacing the session drops the previous request table.
            shared.session = Some(Session {
                generation: shared.generation,
                correlator: Arc::clone(&correlator),
                kill: Some(kill_tx),
            });
            shared.generation
        };

        tokio::spawn(pump_stdout(
            stdout,
            MessageFramer::with_mode(self.config.framing_mode)
                .with_max_message_bytes(self.config.max_message_bytes),
            Arc::clone(&correlator),
        ));
        tokio::spawn(drain_stderr(stderr));
        tokio::spawn(watch_exit(
            child,
            kill_rx,
            exited_tx,
            Arc::clone(&self.shared),
            generation,
        ));

        Ok((correlator, generation, exited_rx))
    }

    /// Sends a request to the running helper and waits for the response
    ///
    /// Fails with [`ProxyError::Unavailable`] without writing anything unless
    /// the helper is `Running` and available.
    pub async fn send_request(&self, method: &str, params: Value) -> ProxyResult<Value> {
        let correlator = {
            let shared = self.shared.lock();
            match (&shared.session, shared.state, shared.available) {
                (Some(session), SupervisorState::Running, true) => Arc::clone(&session.correlator),
                _ => return Err(ProxyError::Unavailable),
            }
        };

        let pending = correlator.send(method, params).await?;
        // Only the session keeps the table alive while we wait.
        drop(correlator);
        pending.wait().await
    }

    /// Terminates the helper if one is running and marks the proxy unavailable
    ///
    /// Safe to call repeatedly, and before any `initialize`.
    pub fn cleanup(&self) {
        let mut shared = self.shared.lock();

        if let Some(kill) = shared.session.as_mut().and_then(|session| session.kill.take()) {
            tracing::info!("Terminating capture helper");
            let _ = kill.send(());
        }

        if shared.state != SupervisorState::Uninitialized {
            shared.state = SupervisorState::Stopped;
        }
        shared.available = false;
    }

    /// Current lifecycle state
    pub fn state(&self) -> SupervisorState {
        self.shared.lock().state
    }

    /// Whether the helper passed its handshake and has not exited since
    pub fn is_available(&self) -> bool {
        self.shared.lock().available
    }

    /// Requests written to the current session that have no response yet
    pub fn pending_requests(&self) -> usize {
        self.shared
            .lock()
            .session
            .as_ref()
            .map_or(0, |session| session.correlator.pending_count())
    }

    /// Dropped-message counters of the current session
    pub fn stats(&self) -> CorrelatorStats {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|session| session.correlator.stats())
            .unwrap_or_default()
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Reads helper stdout until EOF, dispatching every complete message
pub(crate) async fn pump_stdout<R>(
    mut reader: R,
    mut framer: MessageFramer,
    correlator: Arc<RequestCorrelator>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Capture helper stdout closed");
                break;
            }
            Ok(n) => {
                let discarded = framer.discarded();
                for message in framer.feed(&buf[..n]) {
                    correlator.dispatch(&message);
                }
                if framer.discarded() > discarded {
                    correlator.record_oversized(framer.discarded() - discarded);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read capture helper stdout");
                break;
            }
        }
    }
}

/// Logs helper stderr until EOF
///
/// Lines are decoded lossily; the pipe must stay open even when the helper
/// writes bytes that are not UTF-8, or its next write kills it with SIGPIPE.
async fn drain_stderr<R>(stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                tracing::debug!(target: "imagehost_mcp::helper", "{}", text.trim_end());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read capture helper stderr");
                break;
            }
        }
    }
}

async fn watch_exit(
    mut child: Child,
    kill_rx: oneshot::Receiver<()>,
    exited: watch::Sender<bool>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        // Fires on cleanup, or when the session holding the sender is dropped.
        _ = kill_rx => {
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "Failed to kill capture helper");
            }
            child.wait().await
        }
    };

    match status {
        Ok(status) => tracing::info!(%status, "Capture helper exited"),
        Err(e) => tracing::warn!(error = %e, "Failed to wait for capture helper"),
    }

    // Nobody may be listening once the handshake is over.
    let _ = exited.send(true);

    let mut shared = shared.lock();
    if shared.generation != generation {
        return;
    }
    shared.state = SupervisorState::Stopped;
    shared.available = false;
    if let Some(session) = shared.session.as_mut() {
        debug_assert_eq!(session.generation, generation);
        session.kill = None;
    }
}
