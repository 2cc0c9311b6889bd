// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name-keyed metadata registry.
//!
//! Maps a type name to its built [`StructMeta`] (and an enum name to its
//! [`EnumMeta`] symbol table). Entries are add-once: an existing name is
//! never overwritten and the add reports failure. Lookup is read-mostly and
//! lock-free (`DashMap`).
//!
//! Use [`MetaStore::shared`] for the process-wide instance, or construct
//! independent stores for isolated type universes (tests, multi-tenant
//! schemas).

use super::descriptor::{EnumMeta, StructMeta};
use dashmap::DashMap;
use std::sync::{Arc, OnceLock};

static SHARED: OnceLock<MetaStore> = OnceLock::new();

/// Process-wide or per-instance type registry.
pub struct MetaStore {
    structs: DashMap<String, Arc<StructMeta>>,
    enums: DashMap<String, Arc<EnumMeta>>,
}

impl MetaStore {
    /// Create an independent, empty store.
    pub fn new() -> Self {
        Self {
            structs: DashMap::new(),
            enums: DashMap::new(),
        }
    }

    /// The lazily-created process-wide instance.
    pub fn shared() -> &'static MetaStore {
        SHARED.get_or_init(MetaStore::new)
    }

    /// Register a struct layout under its own name. Returns `false` (and
    /// leaves the registry unchanged) if the name is already taken.
    pub fn add_struct(&self, meta: Arc<StructMeta>) -> bool {
        match self.structs.entry(meta.name().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                log::debug!("[MetaStore::add_struct] '{}' already registered", meta.name());
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(meta);
                true
            }
        }
    }

    /// Look up a struct layout by name.
    pub fn get_struct(&self, name: &str) -> Option<Arc<StructMeta>> {
        self.structs.get(name).map(|e| e.value().clone())
    }

    /// Register an enum symbol table under its own name (add-once).
    pub fn add_enum(&self, meta: Arc<EnumMeta>) -> bool {
        match self.enums.entry(meta.name().to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                log::debug!("[MetaStore::add_enum] '{}' already registered", meta.name());
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(meta);
                true
            }
        }
    }

    /// Look up an enum symbol table by name.
    pub fn get_enum(&self, name: &str) -> Option<Arc<EnumMeta>> {
        self.enums.get(name).map(|e| e.value().clone())
    }

    /// Number of registered struct layouts.
    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }

    /// Number of registered enums.
    pub fn enum_count(&self) -> usize {
        self.enums.len()
    }
}

impl Default for MetaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::types::{Endianness, FieldType};
    use crate::meta::StructMetaBuilder;

    fn simple(name: &str) -> Arc<StructMeta> {
        StructMetaBuilder::new(name, Endianness::Little)
            .add("v", FieldType::U32)
            .unwrap()
            .finish()
            .unwrap()
    }

    #[test]
    fn test_add_once_semantics() {
        let store = MetaStore::new();
        assert!(store.add_struct(simple("A")));
        assert!(!store.add_struct(simple("A"))); // not overwritten
        assert_eq!(store.struct_count(), 1);
        assert!(store.get_struct("A").is_some());
        assert!(store.get_struct("B").is_none());
    }

    #[test]
    fn test_enum_registry() {
        let store = MetaStore::new();
        let colors = EnumMeta::new("Color", vec![("RED".into(), 0), ("BLUE".into(), 2)]);
        assert!(store.add_enum(colors));
        assert!(!store.add_enum(EnumMeta::new("Color", vec![])));
        assert_eq!(store.get_enum("Color").unwrap().value("BLUE"), Some(2));
    }

    #[test]
    fn test_shared_instance_is_stable() {
        let a = MetaStore::shared() as *const MetaStore;
        let b = MetaStore::shared() as *const MetaStore;
        assert_eq!(a, b);
    }
}
