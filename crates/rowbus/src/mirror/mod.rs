// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Remote Synchronization
//!
//! Mirrors a declared subset of a dataset's tables between two processes
//! over a pluggable transport.
//!
//! ```text
//! process A                                   process B
//! +------------------+                        +------------------+
//! | Dataset          |                        | Dataset          |
//! |  exported tables |--Exporter--> frames -->| Importer         |
//! |  (row changes)   |   [MirrorTransport]    |  write(force)    |
//! +------------------+                        +------------------+
//!          ^                                           |
//!          +--- MirrorSession: reconnect w/ backoff ---+
//! ```
//!
//! - The **exporting** side subscribes to every row of every exported table
//!   (rows added later included) and pushes `{table-key, row-key, payload}`
//!   frames on each accepted change.
//! - The **importing** side resolves the target row by key and performs a
//!   local write with `force_report = true`, so value-identical remote
//!   updates still propagate downstream (remote writes signal liveness, not
//!   just value change).
//! - Transport failure never corrupts local state: frames are dropped and
//!   counted, the session reconnects with exponential backoff, and on
//!   reconnect the full current snapshot is re-pushed (best-effort, no
//!   replay log).
//! - Frames for unconfigured tables or unknown rows are dropped and
//!   counted, never fatal.
//!
//! The actual byte movement is behind [`MirrorTransport`]; OS sockets are
//! out of scope. [`InProcTransport`] is the loopback implementation used in
//! tests and for same-process mirroring.

mod exporter;
mod importer;
mod session;
mod transport;
mod wire;

pub use exporter::Exporter;
pub use importer::Importer;
pub use session::MirrorSession;
pub use transport::{InProcTransport, MirrorTransport, TransportError};
pub use wire::{decode_frame, encode_frame, Frame, WireError};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Errors surfaced by the import path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// Malformed frame (also counted in [`MirrorStats`]).
    Wire(WireError),
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorError::Wire(e) => write!(f, "Wire error: {}", e),
        }
    }
}

impl std::error::Error for MirrorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MirrorError::Wire(e) => Some(e),
        }
    }
}

/// Atomic counters shared by exporter, importer, and session.
#[derive(Default)]
pub struct MirrorStats {
    sent: AtomicU64,
    send_failures: AtomicU64,
    applied: AtomicU64,
    dropped_unknown_table: AtomicU64,
    dropped_unknown_row: AtomicU64,
    decode_errors: AtomicU64,
    write_rejects: AtomicU64,
    reconnects: AtomicU64,
}

macro_rules! stat {
    ($inc:ident, $field:ident) => {
        pub(crate) fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        /// Counter accessor.
        pub fn $field(&self) -> u64 {
            self.$field.load(Ordering::Relaxed)
        }
    };
}

impl MirrorStats {
    /// Fresh zeroed counters.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    stat!(inc_sent, sent);
    stat!(inc_send_failures, send_failures);
    stat!(inc_applied, applied);
    stat!(inc_dropped_unknown_table, dropped_unknown_table);
    stat!(inc_dropped_unknown_row, dropped_unknown_row);
    stat!(inc_decode_errors, decode_errors);
    stat!(inc_write_rejects, write_rejects);
    stat!(inc_reconnects, reconnects);

    /// Consistent-enough copy of all counters.
    pub fn snapshot(&self) -> MirrorStatsSnapshot {
        MirrorStatsSnapshot {
            sent: self.sent(),
            send_failures: self.send_failures(),
            applied: self.applied(),
            dropped_unknown_table: self.dropped_unknown_table(),
            dropped_unknown_row: self.dropped_unknown_row(),
            decode_errors: self.decode_errors(),
            write_rejects: self.write_rejects(),
            reconnects: self.reconnects(),
        }
    }
}

/// Plain copy of [`MirrorStats`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorStatsSnapshot {
    pub sent: u64,
    pub send_failures: u64,
    pub applied: u64,
    pub dropped_unknown_table: u64,
    pub dropped_unknown_row: u64,
    pub decode_errors: u64,
    pub write_rejects: u64,
    pub reconnects: u64,
}
