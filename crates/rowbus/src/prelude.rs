// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Convenient single-import surface for applications.
//!
//! ```rust
//! use rowbus::prelude::*;
//!
//! let dataset = Dataset::new("demo");
//! # let _ = dataset;
//! ```

pub use crate::core::{Observer, Signal, SubToken};
pub use crate::dispatch::Dispatcher;
pub use crate::meta::{
    Bounds, Endianness, EnumMeta, FieldType, MetaStore, StructMeta, StructMetaBuilder, Value,
};
pub use crate::mirror::{Exporter, Importer, MirrorSession, MirrorTransport};
pub use crate::model::{
    Dataset, Error, Key, Result, Row, RowEvent, RowInfo, RowKind, RowSpec, Table,
};
pub use crate::rules::{DatasetContext, RuleContext, RuleEngine};
