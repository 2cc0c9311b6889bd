// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport boundary for mirror traffic.
//!
//! The data model only needs "push these bytes" / "bytes arrived"; sockets,
//! serial links, and stream framing live behind this trait in adapter
//! crates.

use crossbeam::channel::{unbounded, Receiver, Sender};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Transport-level failures (connection state, link errors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Link is down; the session reconnect loop will retry.
    Disconnected,
    /// Link-level send failure with a reason.
    SendFailed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Disconnected => write!(f, "Transport disconnected"),
            TransportError::SendFailed(reason) => write!(f, "Send failed: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// Pluggable frame mover.
///
/// # Contract
/// - `send` either delivers the whole frame or fails; partial delivery is
///   the implementation's problem to hide.
/// - `connect` is idempotent and cheap to call repeatedly; the session
///   calls it from its reconnect loop.
/// - All methods may be called from any thread.
pub trait MirrorTransport: Send + Sync {
    /// (Re-)establish the link. Returns `true` once usable.
    fn connect(&self) -> bool;

    /// Current link state.
    fn is_connected(&self) -> bool;

    /// Push one encoded frame.
    fn send(&self, frame: &[u8]) -> Result<(), TransportError>;
}

/// Loopback transport: frames land in an in-process queue.
///
/// Used by tests and same-process mirroring. The paired receiver hands raw
/// frames to an [`Importer`](crate::mirror::Importer). `set_connected(false)`
/// simulates a link failure for reconnect testing.
pub struct InProcTransport {
    tx: Sender<Vec<u8>>,
    connected: AtomicBool,
}

impl InProcTransport {
    /// Create a transport and the receiving end of its queue.
    pub fn channel() -> (Arc<Self>, Receiver<Vec<u8>>) {
        let (tx, rx) = unbounded();
        (
            Arc::new(Self {
                tx,
                connected: AtomicBool::new(true),
            }),
            rx,
        )
    }

    /// Simulate link up/down.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

impl MirrorTransport for InProcTransport {
    fn connect(&self) -> bool {
        self.connected.store(true, Ordering::Release);
        true
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn send(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }
        self.tx
            .send(frame.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }
}
