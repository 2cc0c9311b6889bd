// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Layout descriptors: fields, structs, enums, and the packed-layout builder.

use super::types::{Bounds, Endianness, FieldType, Value};
use super::MetaError;
use std::collections::HashMap;
use std::sync::Arc;

/// Bit position of a bitfield inside its base integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSpan {
    /// First bit, counted from bit 0 of the base integer's value.
    pub bit_offset: u8,
    /// Number of bits.
    pub width: u8,
}

/// Enumeration metadata: a named symbol table over a declared integer width.
#[derive(Debug)]
pub struct EnumMeta {
    name: String,
    underlying: FieldType,
    variants: Vec<(String, i64)>,
    by_name: HashMap<String, i64>,
}

impl EnumMeta {
    /// Build an enum over `u32` (the common case).
    pub fn new(name: impl Into<String>, variants: Vec<(String, i64)>) -> Arc<Self> {
        Self::with_underlying(name, FieldType::U32, variants)
    }

    /// Build an enum over an explicit integer width.
    pub fn with_underlying(
        name: impl Into<String>,
        underlying: FieldType,
        variants: Vec<(String, i64)>,
    ) -> Arc<Self> {
        let by_name = variants.iter().cloned().collect();
        Arc::new(Self {
            name: name.into(),
            underlying,
            variants,
            by_name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage width in bytes.
    pub fn size(&self) -> usize {
        self.underlying.fixed_size().unwrap_or(4)
    }

    /// Underlying integer type.
    pub fn underlying(&self) -> FieldType {
        self.underlying
    }

    /// Symbol value by name.
    pub fn value(&self, symbol: &str) -> Option<i64> {
        self.by_name.get(symbol).copied()
    }

    /// Symbol name by value (first match in declaration order).
    pub fn symbol(&self, value: i64) -> Option<&str> {
        self.variants
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.as_str())
    }

    /// Declared (name, value) pairs.
    pub fn variants(&self) -> &[(String, i64)] {
        &self.variants
    }
}

/// One field of a struct layout.
#[derive(Debug, Clone)]
pub struct FieldMeta {
    pub name: String,
    /// Byte offset from the start of the struct.
    pub offset: usize,
    pub ty: FieldType,
    /// Set for bitfields; `None` means the field owns its full bytes.
    pub bit: Option<BitSpan>,
    /// Element count; 1 for scalars, N for arrays.
    pub count: usize,
    pub bounds: Bounds,
    /// Child layout for `FieldType::Struct`.
    pub nested: Option<Arc<StructMeta>>,
    /// Symbol table for `FieldType::Enum`.
    pub enum_def: Option<Arc<EnumMeta>>,
    pub description: String,
}

impl FieldMeta {
    /// Size of one element in bytes.
    pub fn elem_size(&self) -> usize {
        match self.ty {
            FieldType::Struct => self.nested.as_ref().map_or(0, |n| n.size()),
            FieldType::Enum => self.enum_def.as_ref().map_or(4, |e| e.size()),
            _ => self.ty.fixed_size().unwrap_or(0),
        }
    }

    /// Total region size (`elem_size * count`); bitfields report their base
    /// integer size even when sharing bytes with siblings.
    pub fn size(&self) -> usize {
        self.elem_size() * self.count
    }
}

/// Immutable packed layout of one struct type.
///
/// Built once (programmatically or from a JSON schema), then shared via
/// `Arc` across every row of that logical type.
#[derive(Debug)]
pub struct StructMeta {
    name: String,
    endian: Endianness,
    fields: Vec<FieldMeta>,
    index: HashMap<String, usize>,
    size: usize,
}

impl StructMeta {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total packed size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Declared byte order for multi-byte fields.
    pub fn endian(&self) -> Endianness {
        self.endian
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Field by name.
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Read a typed value at a dotted field path (`"pose.x"`, `"gains[2]"`).
    pub fn read_field(&self, buf: &[u8], path: &str) -> Result<Value, MetaError> {
        super::codec::read_field(self, buf, path)
    }

    /// Write a value at a dotted field path, honoring endianness and
    /// preserving sibling bits for bitfields.
    pub fn write_field(&self, buf: &mut [u8], path: &str, value: &Value) -> Result<(), MetaError> {
        super::codec::write_field(self, buf, path, value)
    }

    /// Bounds-check every numeric/enum leaf field of `buf`.
    pub fn validate(&self, buf: &[u8]) -> super::codec::ValidationReport {
        super::codec::validate_buffer(self, buf)
    }

    /// Write every declared default into `buf`.
    pub fn apply_defaults(&self, buf: &mut [u8]) -> Result<(), MetaError> {
        super::codec::apply_defaults(self, buf)
    }
}

struct BitRun {
    offset: usize,
    base: FieldType,
    used: u8,
}

/// Builder computing packed (`#pragma pack(1)`) offsets.
///
/// Offsets are purely additive - no alignment padding is ever inserted.
/// Consecutive [`add_bits`](Self::add_bits) calls over the same base type
/// pack into the same underlying integer until its bit width is exhausted;
/// any non-bitfield addition closes the current run.
pub struct StructMetaBuilder {
    name: String,
    endian: Endianness,
    fields: Vec<FieldMeta>,
    index: HashMap<String, usize>,
    cursor: usize,
    bit_run: Option<BitRun>,
}

impl StructMetaBuilder {
    pub fn new(name: impl Into<String>, endian: Endianness) -> Self {
        Self {
            name: name.into(),
            endian,
            fields: Vec::new(),
            index: HashMap::new(),
            cursor: 0,
            bit_run: None,
        }
    }

    fn push(&mut self, field: FieldMeta) -> Result<(), MetaError> {
        if self.index.contains_key(&field.name) {
            return Err(MetaError::DuplicateField(field.name));
        }
        self.index.insert(field.name.clone(), self.fields.len());
        self.fields.push(field);
        Ok(())
    }

    /// Add a scalar primitive or fixed text buffer.
    pub fn add(self, name: impl Into<String>, ty: FieldType) -> Result<Self, MetaError> {
        self.add_array(name, ty, 1)
    }

    /// Add an array of a primitive or fixed text buffer.
    pub fn add_array(
        mut self,
        name: impl Into<String>,
        ty: FieldType,
        count: usize,
    ) -> Result<Self, MetaError> {
        let name = name.into();
        let elem = ty
            .fixed_size()
            .ok_or_else(|| MetaError::BadTypeToken(name.clone()))?;
        self.bit_run = None;
        let field = FieldMeta {
            name,
            offset: self.cursor,
            ty,
            bit: None,
            count,
            bounds: Bounds::NONE,
            nested: None,
            enum_def: None,
            description: String::new(),
        };
        self.cursor += elem * count;
        self.push(field)?;
        Ok(self)
    }

    /// Add a bitfield of `width` bits over `base` (an integer type).
    pub fn add_bits(
        mut self,
        name: impl Into<String>,
        base: FieldType,
        width: u8,
    ) -> Result<Self, MetaError> {
        let name = name.into();
        if !base.is_integer() {
            return Err(MetaError::BadBitfield(format!("{name}: base must be integer")));
        }
        let base_bits = (base.fixed_size().unwrap_or(0) * 8) as u8;
        if width == 0 || width > base_bits {
            return Err(MetaError::BadBitfield(format!(
                "{name}: width {width} over {base_bits}-bit base"
            )));
        }

        let (offset, bit_offset) = match &mut self.bit_run {
            Some(run) if run.base == base && run.used + width <= base_bits => {
                let at = run.used;
                run.used += width;
                (run.offset, at)
            }
            _ => {
                let offset = self.cursor;
                self.cursor += base.fixed_size().unwrap_or(0);
                self.bit_run = Some(BitRun {
                    offset,
                    base,
                    used: width,
                });
                (offset, 0)
            }
        };

        self.push(FieldMeta {
            name,
            offset,
            ty: base,
            bit: Some(BitSpan { bit_offset, width }),
            count: 1,
            bounds: Bounds::NONE,
            nested: None,
            enum_def: None,
            description: String::new(),
        })?;
        Ok(self)
    }

    /// Add a nested struct field (or array of structs with `count > 1`).
    pub fn add_struct(
        mut self,
        name: impl Into<String>,
        nested: Arc<StructMeta>,
        count: usize,
    ) -> Result<Self, MetaError> {
        self.bit_run = None;
        let field = FieldMeta {
            name: name.into(),
            offset: self.cursor,
            ty: FieldType::Struct,
            bit: None,
            count,
            bounds: Bounds::NONE,
            nested: Some(nested.clone()),
            enum_def: None,
            description: String::new(),
        };
        self.cursor += nested.size() * count;
        self.push(field)?;
        Ok(self)
    }

    /// Add an enum field.
    pub fn add_enum(
        mut self,
        name: impl Into<String>,
        enum_def: Arc<EnumMeta>,
    ) -> Result<Self, MetaError> {
        self.bit_run = None;
        let field = FieldMeta {
            name: name.into(),
            offset: self.cursor,
            ty: FieldType::Enum,
            bit: None,
            count: 1,
            bounds: Bounds::NONE,
            nested: None,
            enum_def: Some(enum_def.clone()),
            description: String::new(),
        };
        self.cursor += enum_def.size();
        self.push(field)?;
        Ok(self)
    }

    /// Attach bounds to the most recently added field.
    pub fn bounds(mut self, bounds: Bounds) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.bounds = bounds;
        }
        self
    }

    /// Attach a description to the most recently added field.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.description = text.into();
        }
        self
    }

    /// Freeze the layout.
    pub fn finish(self) -> Result<Arc<StructMeta>, MetaError> {
        Ok(Arc::new(StructMeta {
            name: self.name,
            endian: self.endian,
            fields: self.fields,
            index: self.index,
            size: self.cursor,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_offsets_no_padding() {
        // u8 then u32: packed layout puts the u32 at offset 1, not 4.
        let meta = StructMetaBuilder::new("Packed", Endianness::Little)
            .add("flag", FieldType::U8)
            .unwrap()
            .add("value", FieldType::U32)
            .unwrap()
            .add("tail", FieldType::U16)
            .unwrap()
            .finish()
            .unwrap();

        assert_eq!(meta.field("flag").unwrap().offset, 0);
        assert_eq!(meta.field("value").unwrap().offset, 1);
        assert_eq!(meta.field("tail").unwrap().offset, 5);
        assert_eq!(meta.size(), 7);
    }

    #[test]
    fn test_bitfields_share_base_byte() {
        let meta = StructMetaBuilder::new("Bits", Endianness::Little)
            .add_bits("low", FieldType::U8, 4)
            .unwrap()
            .add_bits("high", FieldType::U8, 4)
            .unwrap()
            .add("after", FieldType::U8)
            .unwrap()
            .finish()
            .unwrap();

        let low = meta.field("low").unwrap();
        let high = meta.field("high").unwrap();
        assert_eq!((low.offset, low.bit.unwrap().bit_offset), (0, 0));
        assert_eq!((high.offset, high.bit.unwrap().bit_offset), (0, 4));
        assert_eq!(meta.field("after").unwrap().offset, 1);
        assert_eq!(meta.size(), 2);
    }

    #[test]
    fn test_bitfield_overflow_starts_new_base() {
        let meta = StructMetaBuilder::new("Bits", Endianness::Little)
            .add_bits("a", FieldType::U8, 6)
            .unwrap()
            .add_bits("b", FieldType::U8, 6)
            .unwrap()
            .finish()
            .unwrap();

        assert_eq!(meta.field("a").unwrap().offset, 0);
        assert_eq!(meta.field("b").unwrap().offset, 1);
        assert_eq!(meta.size(), 2);
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result = StructMetaBuilder::new("Dup", Endianness::Little)
            .add("x", FieldType::U8)
            .unwrap()
            .add("x", FieldType::U8);
        assert!(matches!(result, Err(MetaError::DuplicateField(_))));
    }

    #[test]
    fn test_nested_struct_offsets() {
        let point = StructMetaBuilder::new("Point", Endianness::Little)
            .add("x", FieldType::I32)
            .unwrap()
            .add("y", FieldType::I32)
            .unwrap()
            .finish()
            .unwrap();

        let shape = StructMetaBuilder::new("Shape", Endianness::Little)
            .add("id", FieldType::U8)
            .unwrap()
            .add_struct("origin", point.clone(), 1)
            .unwrap()
            .add_struct("corners", point, 4)
            .unwrap()
            .finish()
            .unwrap();

        assert_eq!(shape.field("origin").unwrap().offset, 1);
        assert_eq!(shape.field("corners").unwrap().offset, 9);
        assert_eq!(shape.size(), 1 + 8 + 32);
    }

    #[test]
    fn test_enum_meta_lookup() {
        let colors = EnumMeta::new(
            "Color",
            vec![("RED".into(), 0), ("GREEN".into(), 1), ("BLUE".into(), 2)],
        );
        assert_eq!(colors.value("GREEN"), Some(1));
        assert_eq!(colors.symbol(2), Some("BLUE"));
        assert_eq!(colors.value("MAUVE"), None);
        assert_eq!(colors.size(), 4);
    }
}
