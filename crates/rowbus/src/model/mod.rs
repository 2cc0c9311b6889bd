// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Data Model
//!
//! The three-level hierarchy at the center of ROWBUS:
//!
//! ```text
//! Dataset                 (root, standalone)
//! +-- Table               (key-unique, structure events)
//!     +-- Row             (byte buffer, write gate, change signal)
//! ```
//!
//! Every entity is reference counted (`Arc`); back-references up the
//! hierarchy are `Weak`, so the ownership graph has no cycles. Rows and
//! tables are created only through their parent's factory methods.
//!
//! ## Write semantics
//!
//! [`Row::write`] is the single mutation entry point:
//!
//! 1. A priority below the row's current gate is accepted as a **no-op**
//!    (returns `true`, no state change, no notification).
//! 2. Change detection: `force_report`, pulse rows ([`RowKind::Empty`]),
//!    a size change, or differing bytes.
//! 3. Fixed-capacity rows reject oversized writes; unbounded rows grow a
//!    high-water-mark allocation that never shrinks.
//! 4. On change, subscribers run synchronously in subscription order with
//!    the payload captured before the row lock was released.
//!
//! ## Lifecycle
//!
//! Removal detaches an entity: its strong reference leaves the parent map
//! and subsequent writes/factory calls on it fail. In-flight notifications
//! hold an `Arc` to the row, so a row never dies mid-delivery.

mod dataset;
mod key;
mod row;
mod table;

pub use dataset::{Dataset, DatasetEvent};
pub use key::Key;
pub use row::{Row, RowEvent, RowInfo, RowKind, RowSpec};
pub use table::{Table, TableEvent};

use crate::meta::MetaError;
use std::fmt;

/// Errors returned by data-model operations.
#[derive(Debug)]
pub enum Error {
    /// Key already present in the parent collection.
    DuplicateKey(Key),
    /// No entity under this key.
    NotFound(Key),
    /// Operation on an entity already removed from its parent.
    Detached,
    /// Write larger than a fixed row's capacity.
    BufferTooLarge { size: usize, capacity: usize },
    /// Row has no attached metadata for field-level access.
    NoMetadata,
    /// Metadata/codec failure surfaced through a row operation.
    Meta(MetaError),
    /// Dataset schema loading failure.
    Schema(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateKey(key) => write!(f, "Duplicate key: {}", key),
            Error::NotFound(key) => write!(f, "Not found: {}", key),
            Error::Detached => write!(f, "Entity detached from its parent"),
            Error::BufferTooLarge { size, capacity } => {
                write!(f, "Write of {} bytes exceeds fixed capacity {}", size, capacity)
            }
            Error::NoMetadata => write!(f, "Row has no metadata"),
            Error::Meta(e) => write!(f, "Metadata error: {}", e),
            Error::Schema(msg) => write!(f, "Schema error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Meta(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MetaError> for Error {
    fn from(e: MetaError) -> Self {
        Error::Meta(e)
    }
}

/// Convenient alias for data-model results.
pub type Result<T> = core::result::Result<T, Error>;
