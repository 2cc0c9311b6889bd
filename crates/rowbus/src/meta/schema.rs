// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! JSON schema loader for struct and enum metadata.
//!
//! A struct schema is an object of `field-name -> attributes` entries in
//! declaration order:
//!
//! ```json
//! {
//!   "id":    { "t": "u16" },
//!   "mode":  { "t": "u8:4", "def": "1" },
//!   "state": { "t": "u8:4" },
//!   "temp":  { "t": "i16", "min": "-40", "max": "125", "c": "deg C" },
//!   "label": { "t": "charbuff[8]" },
//!   "gains": { "t": "f32[4]" },
//!   "pose":  { "t": "Point" }
//! }
//! ```
//!
//! Recognized attributes: `t` (type token), `def`/`min`/`max` (bound
//! literals, string-parsed per the declared type), `c` (human comment,
//! ignored by logic). Type tokens: primitive names, `charbuff[N]`,
//! bitfields as `type:bits`, arrays as `type[N]`, and registered enum or
//! struct names resolved against the target [`MetaStore`].
//!
//! Offsets and total size are computed by the packed builder - purely
//! additive, no padding - so hand-authored `#pragma pack(1)` structs and
//! schema-built layouts agree byte for byte.

use super::descriptor::{EnumMeta, StructMeta, StructMetaBuilder};
use super::store::MetaStore;
use super::types::{Bounds, Endianness, FieldType, Value};
use super::MetaError;
use serde_json::Value as Json;
use std::sync::Arc;

enum ParsedTy {
    Primitive(FieldType),
    PrimitiveArray(FieldType, usize),
    Bits(FieldType, u8),
    Enum(Arc<EnumMeta>),
    Struct(Arc<StructMeta>, usize),
}

fn parse_count(token: &str) -> Result<(&str, Option<usize>), MetaError> {
    match token.find('[') {
        None => Ok((token, None)),
        Some(open) if token.ends_with(']') => {
            let count = token[open + 1..token.len() - 1]
                .parse::<usize>()
                .map_err(|_| MetaError::BadTypeToken(token.to_string()))?;
            if count == 0 {
                return Err(MetaError::BadTypeToken(token.to_string()));
            }
            Ok((&token[..open], Some(count)))
        }
        Some(_) => Err(MetaError::BadTypeToken(token.to_string())),
    }
}

fn parse_type_token(store: &MetaStore, token: &str) -> Result<ParsedTy, MetaError> {
    // Bitfield: "u8:4"
    if let Some((base, bits)) = token.split_once(':') {
        let base_ty = FieldType::from_token(base)
            .filter(FieldType::is_integer)
            .ok_or_else(|| MetaError::BadTypeToken(token.to_string()))?;
        let width = bits
            .parse::<u8>()
            .map_err(|_| MetaError::BadTypeToken(token.to_string()))?;
        return Ok(ParsedTy::Bits(base_ty, width));
    }

    let (name, count) = parse_count(token)?;

    // Fixed text buffer: "charbuff[N]"
    if name == "charbuff" {
        let n = count.ok_or_else(|| MetaError::BadTypeToken(token.to_string()))?;
        return Ok(ParsedTy::Primitive(FieldType::CharBuf(n)));
    }

    if let Some(ty) = FieldType::from_token(name) {
        return Ok(match count {
            Some(n) => ParsedTy::PrimitiveArray(ty, n),
            None => ParsedTy::Primitive(ty),
        });
    }
    if let Some(enum_def) = store.get_enum(name) {
        if count.is_some() {
            return Err(MetaError::BadTypeToken(token.to_string()));
        }
        return Ok(ParsedTy::Enum(enum_def));
    }
    if let Some(nested) = store.get_struct(name) {
        return Ok(ParsedTy::Struct(nested, count.unwrap_or(1)));
    }
    Err(MetaError::UnknownType(name.to_string()))
}

fn attr_string(entry: &Json, key: &str) -> Option<String> {
    match entry.get(key) {
        Some(Json::String(s)) => Some(s.clone()),
        Some(Json::Number(n)) => Some(n.to_string()),
        Some(Json::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

fn bound_ty(parsed: &ParsedTy) -> FieldType {
    match parsed {
        ParsedTy::Primitive(ty) | ParsedTy::PrimitiveArray(ty, _) | ParsedTy::Bits(ty, _) => *ty,
        ParsedTy::Enum(_) => FieldType::Enum,
        ParsedTy::Struct(..) => FieldType::Struct,
    }
}

fn parse_bounds(entry: &Json, parsed: &ParsedTy) -> Result<Bounds, MetaError> {
    let ty = bound_ty(parsed);
    let parse = |key: &str| -> Result<Option<Value>, MetaError> {
        attr_string(entry, key)
            .map(|lit| Value::parse(ty, &lit))
            .transpose()
    };
    Ok(Bounds {
        min: parse("min")?,
        default: parse("def")?,
        max: parse("max")?,
    })
}

/// Build and register a struct layout from a JSON schema (host endian).
///
/// Registration is add-once: a name already present in `store` fails with
/// [`MetaError::AlreadyRegistered`] and the store is left unchanged.
pub fn load_struct(
    store: &MetaStore,
    name: &str,
    json: &str,
) -> Result<Arc<StructMeta>, MetaError> {
    load_struct_with_endian(store, name, json, Endianness::host())
}

/// Build and register a struct layout from a JSON schema with an explicit
/// byte order.
pub fn load_struct_with_endian(
    store: &MetaStore,
    name: &str,
    json: &str,
    endian: Endianness,
) -> Result<Arc<StructMeta>, MetaError> {
    let doc: Json =
        serde_json::from_str(json).map_err(|e| MetaError::BadSchema(e.to_string()))?;
    let fields = doc
        .as_object()
        .ok_or_else(|| MetaError::BadSchema("struct schema must be an object".into()))?;

    let mut builder = StructMetaBuilder::new(name, endian);
    for (field_name, entry) in fields {
        let token = attr_string(entry, "t")
            .ok_or_else(|| MetaError::BadSchema(format!("{field_name}: missing 't'")))?;
        let parsed = parse_type_token(store, &token)?;
        let bounds = parse_bounds(entry, &parsed)?;

        builder = match parsed {
            ParsedTy::Primitive(ty) => builder.add(field_name.clone(), ty)?,
            ParsedTy::PrimitiveArray(ty, n) => builder.add_array(field_name.clone(), ty, n)?,
            ParsedTy::Bits(base, width) => builder.add_bits(field_name.clone(), base, width)?,
            ParsedTy::Enum(enum_def) => builder.add_enum(field_name.clone(), enum_def)?,
            ParsedTy::Struct(nested, n) => builder.add_struct(field_name.clone(), nested, n)?,
        };
        if !bounds.is_none() {
            builder = builder.bounds(bounds);
        }
        if let Some(comment) = attr_string(entry, "c") {
            builder = builder.describe(comment);
        }
    }

    let meta = builder.finish()?;
    if !store.add_struct(meta.clone()) {
        return Err(MetaError::AlreadyRegistered(name.to_string()));
    }
    Ok(meta)
}

/// Build and register an enum symbol table from a `symbol -> value` JSON
/// object (add-once, underlying `u32`).
pub fn load_enum(store: &MetaStore, name: &str, json: &str) -> Result<Arc<EnumMeta>, MetaError> {
    let doc: Json =
        serde_json::from_str(json).map_err(|e| MetaError::BadSchema(e.to_string()))?;
    let entries = doc
        .as_object()
        .ok_or_else(|| MetaError::BadSchema("enum schema must be an object".into()))?;

    let mut variants = Vec::with_capacity(entries.len());
    for (symbol, value) in entries {
        let v = value
            .as_i64()
            .ok_or_else(|| MetaError::BadSchema(format!("{symbol}: value must be an integer")))?;
        variants.push((symbol.clone(), v));
    }

    let meta = EnumMeta::new(name, variants);
    if !store.add_enum(meta.clone()) {
        return Err(MetaError::AlreadyRegistered(name.to_string()));
    }
    Ok(meta)
}
