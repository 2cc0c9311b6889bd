// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datasets: the root of the hierarchy.

use super::table::Table;
use super::{Error, Key, Result};
use crate::core::{Guarded, Signal, SubToken};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Structure notification raised on table add/remove.
#[derive(Clone)]
pub enum DatasetEvent {
    TableAdded(Arc<Table>),
    TableRemoved(Arc<Table>),
}

/// Key-unique collection of tables; created standalone, never owned by
/// another in-process entity.
///
/// # Example
/// ```rust
/// use rowbus::{Dataset, Key, RowSpec};
///
/// let dataset = Dataset::new("vehicle");
/// let table = dataset.create_table(Key::from("sensors"), "sensors", "").unwrap();
/// table.create_row(RowSpec::new(Key::from(1u32))).unwrap();
/// assert_eq!(dataset.len(), 1);
/// ```
pub struct Dataset {
    self_ref: Weak<Dataset>,
    name: String,
    tables: Guarded<HashMap<Key, Arc<Table>>>,
    structure: Signal<DatasetEvent>,
}

impl Dataset {
    /// Memory-backed factory.
    pub fn new(name: &str) -> Arc<Dataset> {
        Arc::new_cyclic(|weak| Dataset {
            self_ref: weak.clone(),
            name: name.to_string(),
            tables: Guarded::new(HashMap::new()),
            structure: Signal::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Create a table. Fails on duplicate key, leaving the dataset
    /// unchanged.
    pub fn create_table(&self, key: Key, name: &str, description: &str) -> Result<Arc<Table>> {
        let table = Table::create(
            key.clone(),
            name.to_string(),
            description.to_string(),
            self.self_ref.clone(),
        );
        let inserted = self.tables.with(|tables| {
            if tables.contains_key(&key) {
                false
            } else {
                tables.insert(key.clone(), table.clone());
                true
            }
        });
        if !inserted {
            return Err(Error::DuplicateKey(key));
        }

        log::debug!("[Dataset::create_table] '{}' += '{}'", self.name, key);
        self.structure.raise(&DatasetEvent::TableAdded(table.clone()));
        Ok(table)
    }

    /// Remove a table by key. Unknown keys report `false`; on success the
    /// table and all of its rows are detached.
    pub fn remove_table(&self, key: &Key) -> bool {
        let removed = self.tables.with(|tables| tables.remove(key));
        match removed {
            Some(table) => {
                table.detach();
                log::debug!("[Dataset::remove_table] '{}' -= '{}'", self.name, key);
                self.structure.raise(&DatasetEvent::TableRemoved(table));
                true
            }
            None => false,
        }
    }

    /// Table by key.
    pub fn table(&self, key: &Key) -> Option<Arc<Table>> {
        self.tables.with(|tables| tables.get(key).cloned())
    }

    /// Consistent snapshot of all tables.
    pub fn tables(&self) -> Vec<Arc<Table>> {
        self.tables.with(|tables| tables.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.tables.with(|tables| tables.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convenience: row lookup through two keys.
    pub fn row(&self, table_key: &Key, row_key: &Key) -> Option<Arc<super::Row>> {
        self.table(table_key)?.row(row_key)
    }

    /// Subscribe to table add/remove events.
    pub fn subscribe_structure(
        &self,
        callback: impl Fn(&DatasetEvent) + Send + Sync + 'static,
    ) -> SubToken {
        self.structure.subscribe(callback)
    }

    /// Remove a structure subscription.
    pub fn unsubscribe_structure(&self, token: SubToken) -> bool {
        self.structure.unsubscribe(token)
    }

    /// Build a dataset (tables and typed rows) from a JSON description,
    /// resolving row types against `store`.
    ///
    /// ```json
    /// {
    ///   "tables": [
    ///     {
    ///       "key": "sensors", "name": "sensors",
    ///       "rows": [
    ///         { "key": "engine", "type": "EngineState", "priority": 0 },
    ///         { "key": "heartbeat", "kind": "empty" }
    ///       ]
    ///     }
    ///   ]
    /// }
    /// ```
    #[cfg(feature = "schema-json")]
    pub fn from_schema(
        name: &str,
        json: &str,
        store: &crate::meta::MetaStore,
    ) -> Result<Arc<Dataset>> {
        schema::build(name, json, store)
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("tables", &self.len())
            .finish()
    }
}

#[cfg(feature = "schema-json")]
mod schema {
    use super::*;
    use crate::meta::MetaStore;
    use crate::model::row::{RowInfo, RowKind, RowSpec};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum KeySchema {
        Id(u32),
        Name(String),
    }

    impl From<KeySchema> for Key {
        fn from(k: KeySchema) -> Key {
            match k {
                KeySchema::Id(id) => Key::Id(id),
                KeySchema::Name(name) => Key::Name(name),
            }
        }
    }

    #[derive(Deserialize)]
    struct RowSchema {
        key: KeySchema,
        #[serde(rename = "type")]
        type_name: Option<String>,
        #[serde(default)]
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        priority: i32,
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        capacity: Option<usize>,
    }

    #[derive(Deserialize)]
    struct TableSchema {
        key: KeySchema,
        #[serde(default)]
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        rows: Vec<RowSchema>,
    }

    #[derive(Deserialize)]
    struct DatasetSchema {
        #[serde(default)]
        tables: Vec<TableSchema>,
    }

    pub(super) fn build(name: &str, json: &str, store: &MetaStore) -> Result<Arc<Dataset>> {
        let doc: DatasetSchema =
            serde_json::from_str(json).map_err(|e| Error::Schema(e.to_string()))?;

        let dataset = Dataset::new(name);
        for table_schema in doc.tables {
            let table = dataset.create_table(
                table_schema.key.into(),
                &table_schema.name,
                &table_schema.description,
            )?;
            for row_schema in table_schema.rows {
                let mut spec = RowSpec::new(Key::from(row_schema.key))
                    .priority(row_schema.priority)
                    .info(RowInfo {
                        kind: RowKind::Bytes,
                        name: row_schema.name,
                        description: row_schema.description,
                    });
                if let Some(type_name) = &row_schema.type_name {
                    let meta = store
                        .get_struct(type_name)
                        .ok_or_else(|| Error::Schema(format!("unknown row type: {type_name}")))?;
                    spec = spec.with_meta(meta);
                }
                match row_schema.kind.as_deref() {
                    Some("empty") => spec = spec.kind(RowKind::Empty),
                    Some("bytes") | None => {}
                    Some(other) => {
                        return Err(Error::Schema(format!("unknown row kind: {other}")));
                    }
                }
                if let Some(capacity) = row_schema.capacity {
                    spec = spec.fixed_size(capacity);
                }
                table.create_row(spec)?;
            }
        }
        Ok(dataset)
    }
}
