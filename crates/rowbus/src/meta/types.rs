// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field type tokens, runtime values, endianness, and bound options.

use super::MetaError;
use std::fmt;

/// Byte order declared per struct layout.
///
/// May differ from the host; the codec byte-swaps on mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Host byte order.
    pub const fn host() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

/// Closed set of semantic field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    /// Single byte character.
    Char,
    /// Fixed text buffer of N bytes, NUL-terminated within the region.
    CharBuf(usize),
    /// Nested struct; layout comes from the field's `StructMeta` reference.
    Struct,
    /// Enumeration; width comes from the field's `EnumMeta` reference.
    Enum,
}

impl FieldType {
    /// Size in bytes for self-sized types (`None` for Struct/Enum, whose
    /// size lives on the referenced metadata).
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            Self::I8 | Self::U8 | Self::Bool | Self::Char => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::CharBuf(n) => Some(*n),
            Self::Struct | Self::Enum => None,
        }
    }

    /// True for the signed integer types (drives bitfield sign extension).
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    /// True for any integer-backed type (integers, bool, char).
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::I8
                | Self::U8
                | Self::I16
                | Self::U16
                | Self::I32
                | Self::U32
                | Self::I64
                | Self::U64
                | Self::Bool
                | Self::Char
        )
    }

    /// True for types the validator bounds-checks (numerics and enums).
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || matches!(self, Self::F32 | Self::F64 | Self::Enum)
    }

    /// Primitive name token as used by the JSON schema (`None` for
    /// CharBuf/Struct/Enum, which have their own token forms).
    pub fn token(&self) -> Option<&'static str> {
        match self {
            Self::I8 => Some("i8"),
            Self::U8 => Some("u8"),
            Self::I16 => Some("i16"),
            Self::U16 => Some("u16"),
            Self::I32 => Some("i32"),
            Self::U32 => Some("u32"),
            Self::I64 => Some("i64"),
            Self::U64 => Some("u64"),
            Self::F32 => Some("f32"),
            Self::F64 => Some("f64"),
            Self::Bool => Some("bool"),
            Self::Char => Some("char"),
            _ => None,
        }
    }

    /// Parse a primitive name token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "i8" => Some(Self::I8),
            "u8" => Some(Self::U8),
            "i16" => Some(Self::I16),
            "u16" => Some(Self::U16),
            "i32" => Some(Self::I32),
            "u32" => Some(Self::U32),
            "i64" => Some(Self::I64),
            "u64" => Some(Self::U64),
            "f32" => Some(Self::F32),
            "f64" => Some(Self::F64),
            "bool" => Some(Self::Bool),
            "char" => Some(Self::Char),
            _ => None,
        }
    }
}

/// Runtime field value.
///
/// The codec maps every field read to one of these variants; writes accept
/// any numerically-compatible variant (an `I64(5)` writes fine into a `u16`
/// field as long as it fits).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Str(String),
    /// Raw region bytes (whole arrays, nested structs).
    Bytes(Vec<u8>),
}

impl Value {
    /// Signed view; `None` for non-numeric variants or unsigned overflow.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            Self::U64(v) => i64::try_from(*v).ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            Self::F64(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Unsigned view; `None` for negatives and non-numeric variants.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::U64(v) => Some(*v),
            Self::I64(v) => u64::try_from(*v).ok(),
            Self::Bool(b) => Some(u64::from(*b)),
            Self::F64(v) if *v >= 0.0 => Some(*v as u64),
            _ => None,
        }
    }

    /// Widening float view (used by the rule engine).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::F64(v) => Some(*v),
            Self::I64(v) => Some(*v as f64),
            Self::U64(v) => Some(*v as f64),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Parse a literal string per the declared field type (used for
    /// `def`/`min`/`max` schema attributes).
    pub fn parse(ty: FieldType, literal: &str) -> Result<Self, MetaError> {
        let bad = |ty: &'static str| MetaError::BadLiteral {
            literal: literal.to_string(),
            ty,
        };
        let s = literal.trim();
        match ty {
            FieldType::I8 | FieldType::I16 | FieldType::I32 | FieldType::I64 | FieldType::Char => {
                s.parse::<i64>().map(Self::I64).map_err(|_| bad("integer"))
            }
            FieldType::U8 | FieldType::U16 | FieldType::U32 | FieldType::U64 => {
                s.parse::<u64>().map(Self::U64).map_err(|_| bad("unsigned"))
            }
            FieldType::F32 | FieldType::F64 => {
                s.parse::<f64>().map(Self::F64).map_err(|_| bad("float"))
            }
            FieldType::Bool => match s {
                "true" | "1" => Ok(Self::Bool(true)),
                "false" | "0" => Ok(Self::Bool(false)),
                _ => Err(bad("bool")),
            },
            FieldType::Enum => s.parse::<i64>().map(Self::I64).map_err(|_| bad("enum")),
            FieldType::CharBuf(_) => Ok(Self::Str(s.to_string())),
            FieldType::Struct => Err(bad("struct")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I64(v) => write!(f, "{}", v),
            Self::U64(v) => write!(f, "{}", v),
            Self::F64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{}", v),
            Self::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Optional declared bounds for a field: min/default/max, each interpreted
/// per the field's type. An absent bound leaves that side unconstrained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    pub min: Option<Value>,
    pub default: Option<Value>,
    pub max: Option<Value>,
}

impl Bounds {
    /// No constraints, no default.
    pub const NONE: Bounds = Bounds {
        min: None,
        default: None,
        max: None,
    };

    pub fn is_none(&self) -> bool {
        self.min.is_none() && self.default.is_none() && self.max.is_none()
    }
}
