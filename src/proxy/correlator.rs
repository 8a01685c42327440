//! Request/response correlation over a single helper transport
//!
//! Every outgoing request gets a fresh decimal id and a oneshot channel. The
//! channel's sender is parked in the pending table until a response with the
//! same id is dispatched, at which point it is removed and fired exactly once.
//! Responses may arrive in any order.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::oneshot,
};

use crate::{
    error::{ProxyError, ProxyResult},
    model::{RequestEnvelope, ResponseEnvelope},
};

type ResponseSender = oneshot::Sender<ProxyResult<Value>>;
type HelperWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Counters for inbound messages that were dropped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrelatorStats {
    /// Lines that did not parse as a response envelope
    pub malformed: u64,
    /// Responses whose id had no pending request
    pub unmatched: u64,
    /// Messages dropped by the framer for exceeding the size cap
    pub oversized: u64,
}

/// Handle to a request that has been written to the helper
#[derive(Debug)]
pub struct PendingResponse {
    id: String,
    rx: oneshot::Receiver<ProxyResult<Value>>,
}

impl PendingResponse {
    /// Correlation id of the request
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Waits for the helper's response
    ///
    /// There is no timeout: if the helper never answers, this never
    /// completes. It fails with [`ProxyError::SessionClosed`] only once the
    /// correlator that issued the request has been dropped.
    pub async fn wait(self) -> ProxyResult<Value> {
        self.rx.await.unwrap_or(Err(ProxyError::SessionClosed))
    }
}

/// Multiplexes concurrent requests over one helper stdin/stdout pair
pub struct RequestCorrelator {
    writer: tokio::sync::Mutex<HelperWriter>,
    pending: Mutex<HashMap<String, ResponseSender>>,
    next_id: AtomicU64,
    malformed: AtomicU64,
    unmatched: AtomicU64,
    oversized: AtomicU64,
}

impl std::fmt::Debug for RequestCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCorrelator")
            .field("pending", &self.pending_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl RequestCorrelator {
    /// Creates a correlator writing requests to the given stream
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
            oversized: AtomicU64::new(0),
        }
    }

    /// Writes a request and returns a handle for its response
    ///
    /// The pending entry is registered before the write, so a response can
    /// never race ahead of its registration. If the write fails the entry is
    /// removed again and [`ProxyError::TransportWrite`] is returned.
    pub async fn send(&self, method: &str, params: Value) -> ProxyResult<PendingResponse> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();

        let mut line = serde_json::to_string(&RequestEnvelope::new(&id, method, &params))?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            debug_assert!(!pending.contains_key(&id), "request id {id} reused while pending");
            pending.insert(id.clone(), tx);
        }

        let written = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };

        if let Err(e) = written {
            self.pending.lock().remove(&id);
            tracing::warn!(id = %id, method, error = %e, "Failed to write request to capture helper");
            return Err(ProxyError::TransportWrite(e));
        }

        tracing::debug!(id = %id, method, "-> helper request");
        Ok(PendingResponse { id, rx })
    }

    /// Writes a request and waits for its response
    pub async fn request(&self, method: &str, params: Value) -> ProxyResult<Value> {
        self.send(method, params).await?.wait().await
    }

    /// Routes one complete inbound message to its pending request
    ///
    /// Messages that fail to parse, or whose id is not pending, are dropped
    /// and only counted.
    pub fn dispatch(&self, raw: &str) {
        let envelope: ResponseEnvelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(error = %e, "Dropping malformed helper message");
                return;
            }
        };

        let Some(tx) = self.pending.lock().remove(&envelope.id) else {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(id = %envelope.id, "Dropping helper response with no pending request");
            return;
        };

        let outcome = match envelope.error {
            Some(error) => Err(ProxyError::Protocol {
                code: error.code,
                message: error.message,
            }),
            None => Ok(envelope.result.unwrap_or(Value::Null)),
        };

        tracing::debug!(id = %envelope.id, ok = outcome.is_ok(), "<- helper response");

        // The caller may have stopped waiting; nothing else to do then.
        let _ = tx.send(outcome);
    }

    /// Counts messages the framer dropped before they reached [`dispatch`](Self::dispatch)
    pub fn record_oversized(&self, count: u64) {
        self.oversized.fetch_add(count, Ordering::Relaxed);
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Counters of dropped inbound messages
    pub fn stats(&self) -> CorrelatorStats {
        CorrelatorStats {
            malformed: self.malformed.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
        }
    }
}
