// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # ROWBUS - Embedded Real-Time Row Store
//!
//! An in-memory, typed, reflective key/value middleware for real-time systems:
//! rows grouped into tables grouped into datasets, with synchronous change
//! notification, priority-gated writes, metadata-driven binary
//! (de)serialization, remote mirroring, and a rule-evaluation engine.
//!
//! ## Quick Start
//!
//! ```rust
//! use rowbus::{Dataset, Key, RowSpec};
//!
//! let dataset = Dataset::new("vehicle");
//! let table = dataset
//!     .create_table(Key::from("sensors"), "sensors", "live sensor state")
//!     .unwrap();
//! let row = table
//!     .create_row(RowSpec::new(Key::from("engine_rpm")).fixed_size(4))
//!     .unwrap();
//!
//! let token = row.subscribe(|event| {
//!     println!("rpm row changed: {} bytes", event.data.len());
//! });
//!
//! // priority 0, report only on actual change
//! row.write(&1800u32.to_le_bytes(), false, 0);
//! # let _ = token;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        Application Layer                            |
//! |      Rule Engine | Mirror Sessions | Direct Row Access              |
//! +---------------------------------------------------------------------+
//! |                         Data Model                                  |
//! |   Dataset -> Table -> Row | Write Gate | Change Signals             |
//! +---------------------------------------------------------------------+
//! |                       Metadata Engine                               |
//! |   Packed Layouts | Field Paths | Bitfields | Bounds Validation      |
//! +---------------------------------------------------------------------+
//! |                        Runtime Layer                                |
//! |   Dispatchers | Signals | Guarded State | Runtime Config            |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Dataset`] | Root of the hierarchy, key-unique collection of tables |
//! | [`Table`] | Key-unique collection of rows with structure events |
//! | [`Row`] | Priority-gated byte buffer with change subscribers |
//! | [`StructMeta`] | Packed binary layout description for typed rows |
//! | [`Dispatcher`] | Single-worker execution context with timers |
//! | [`MirrorSession`] | Live mirror of exported tables over a transport |
//! | [`RuleEngine`] | XML-declared rules evaluated against rows |
//!
//! ## Delivery Model
//!
//! Row writes notify subscribers synchronously on the writer's thread, in
//! subscription order, with the payload captured before the row lock is
//! released. A subscriber that needs serialization onto its own thread
//! registers through [`Row::subscribe_on`] with a [`Dispatcher`]; callbacks
//! for that subscriber are then marshaled FIFO onto the dispatcher's worker
//! and never run concurrently with each other.
//!
//! ## Modules Overview
//!
//! - [`model`] - Dataset/Table/Row data model (start here)
//! - [`meta`] - Binary metadata and field codec
//! - [`dispatch`] - Execution contexts and timers
//! - [`mirror`] - Remote synchronization protocol
//! - [`rules`] - Rule evaluation engine
//! - [`config`] - Constants and runtime tuning

/// Constants and runtime configuration (single source of truth).
pub mod config;
/// Runtime primitives: guarded values and signal fan-out.
pub mod core;
/// Single-worker execution contexts with timers.
pub mod dispatch;
/// Binary metadata, field codec, and the metadata store.
pub mod meta;
/// Remote synchronization of exported tables over a pluggable transport.
pub mod mirror;
/// Row/Table/Dataset data model and subscription core.
pub mod model;
/// Prelude module for convenient imports.
pub mod prelude;
/// Rule evaluation engine operating over rows.
pub mod rules;

pub use crate::core::{Guarded, GuardedLock, Observer, Signal, SubToken};
pub use dispatch::{Dispatcher, TimerToken};
pub use meta::{
    Bounds, Endianness, EnumMeta, FieldMeta, FieldType, MetaError, MetaStore, StructMeta,
    StructMetaBuilder, ValidationReport, Value,
};
pub use mirror::{
    Exporter, Importer, InProcTransport, MirrorError, MirrorSession, MirrorStats,
    MirrorStatsSnapshot, MirrorTransport, TransportError, WireError,
};
pub use model::{
    Dataset, DatasetEvent, Error, Key, Result, Row, RowEvent, RowInfo, RowKind, RowSpec, Table,
    TableEvent,
};
pub use rules::{DatasetContext, Rule, RuleContext, RuleEngine, RuleError, RuleFn};

/// ROWBUS version string.
pub const VERSION: &str = "0.3.2";
