// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Binary Metadata Engine
//!
//! Declarative description of a C-compatible, 1-byte-packed memory layout
//! (primitive fields, bitfields, arrays, nested structs, enums), and the
//! codec that reads, writes, and validates typed values against an arbitrary
//! byte buffer.
//!
//! ## Layout contract
//!
//! Offsets are a running sum with **no padding** (`#pragma pack(1)`
//! semantics): field N starts where field N-1 ended. Consecutive bitfields
//! over the same base integer share its bytes until the base width is
//! exhausted. Multi-byte fields honor the struct's declared endianness,
//! byte-swapping when it differs from the host. This is the bit-exact
//! contract consumers depend on for wire captures.
//!
//! ## Quick Start
//!
//! ```rust
//! use rowbus::meta::{Endianness, FieldType, StructMetaBuilder, Value};
//!
//! let meta = StructMetaBuilder::new("Telemetry", Endianness::Little)
//!     .add("id", FieldType::U16).unwrap()
//!     .add_bits("mode", FieldType::U8, 4).unwrap()
//!     .add_bits("state", FieldType::U8, 4).unwrap()
//!     .add("value", FieldType::F32).unwrap()
//!     .finish()
//!     .unwrap();
//! assert_eq!(meta.size(), 7); // 2 + 1 (shared byte) + 4, packed
//!
//! let mut buf = vec![0u8; meta.size()];
//! meta.write_field(&mut buf, "mode", &Value::U64(0xA)).unwrap();
//! meta.write_field(&mut buf, "state", &Value::U64(0x5)).unwrap();
//! assert_eq!(buf[2], 0x5A);
//! ```
//!
//! ## Components
//!
//! - [`StructMeta`] / [`StructMetaBuilder`] - immutable layout description
//! - [`EnumMeta`] - named symbol tables with a declared underlying width
//! - [`Value`] - runtime field value with typed accessors
//! - [`MetaStore`] - process-wide or per-instance name registry (add-once)
//! - JSON schema loader (feature `schema-json`)

mod codec;
mod descriptor;
#[cfg(feature = "schema-json")]
mod schema;
mod store;
mod types;

pub use codec::{FieldCheck, ValidationReport};
pub use descriptor::{BitSpan, EnumMeta, FieldMeta, StructMeta, StructMetaBuilder};
#[cfg(feature = "schema-json")]
pub use schema::{load_enum, load_struct, load_struct_with_endian};
pub use store::MetaStore;
pub use types::{Bounds, Endianness, FieldType, Value};

use std::fmt;

/// Errors raised by metadata construction and the field codec.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaError {
    /// Path segment does not name a field of the walked struct.
    FieldNotFound(String),
    /// Array index past the declared element count.
    IndexOutOfBounds {
        path: String,
        index: usize,
        count: usize,
    },
    /// Path addresses an array field without an element index.
    IndexRequired(String),
    /// Field access would read or write past the end of the buffer.
    OutOfBounds {
        offset: usize,
        size: usize,
        buffer: usize,
    },
    /// Value variant incompatible with the field's declared type.
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
    /// Value does not fit the field (string too long, integer too wide).
    ValueTooLarge(String),
    /// Builder: field name already present in the struct.
    DuplicateField(String),
    /// Builder: invalid bitfield request (zero width, width past base).
    BadBitfield(String),
    /// Schema: unrecognized type token.
    BadTypeToken(String),
    /// Schema: bound/default literal failed to parse for the declared type.
    BadLiteral { literal: String, ty: &'static str },
    /// Schema: referenced type name is not registered.
    UnknownType(String),
    /// Schema: document structure error (not an object, missing `t`, ...).
    BadSchema(String),
    /// Registry: name already registered (entries are add-once).
    AlreadyRegistered(String),
}

impl fmt::Display for MetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldNotFound(path) => write!(f, "Field not found: {}", path),
            Self::IndexOutOfBounds { path, index, count } => {
                write!(f, "Index out of bounds at {}: {} >= {}", path, index, count)
            }
            Self::IndexRequired(path) => write!(f, "Array field needs an index: {}", path),
            Self::OutOfBounds {
                offset,
                size,
                buffer,
            } => write!(
                f,
                "Access out of bounds: {}+{} past buffer of {} bytes",
                offset, size, buffer
            ),
            Self::TypeMismatch { field, expected } => {
                write!(f, "Type mismatch at {}: expected {}", field, expected)
            }
            Self::ValueTooLarge(field) => write!(f, "Value does not fit field: {}", field),
            Self::DuplicateField(name) => write!(f, "Duplicate field name: {}", name),
            Self::BadBitfield(msg) => write!(f, "Invalid bitfield: {}", msg),
            Self::BadTypeToken(token) => write!(f, "Unrecognized type token: {}", token),
            Self::BadLiteral { literal, ty } => {
                write!(f, "Bad {} literal: {}", ty, literal)
            }
            Self::UnknownType(name) => write!(f, "Unknown type name: {}", name),
            Self::BadSchema(msg) => write!(f, "Bad schema: {}", msg),
            Self::AlreadyRegistered(name) => write!(f, "Already registered: {}", name),
        }
    }
}

impl std::error::Error for MetaError {}
