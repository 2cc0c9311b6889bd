// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tables: key-unique row collections with structure events.

use super::dataset::Dataset;
use super::row::{Row, RowSpec};
use super::{Error, Key, Result};
use crate::core::{Guarded, Signal, SubToken};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Structure notification raised on row add/remove.
///
/// Distinct from row-content notifications: table subscribers see the
/// collection change, row subscribers see payload changes.
#[derive(Clone)]
pub enum TableEvent {
    RowAdded(Arc<Row>),
    RowRemoved(Arc<Row>),
}

/// Key-unique collection of rows, owned by a dataset.
///
/// Created by [`Dataset::create_table`], never directly. Rows can be added
/// and removed at any time; every mutation raises a [`TableEvent`] and is
/// atomic with respect to concurrent [`Table::rows`] snapshots.
pub struct Table {
    self_ref: Weak<Table>,
    key: Key,
    name: String,
    description: String,
    parent: Weak<Dataset>,
    detached: AtomicBool,
    rows: Guarded<HashMap<Key, Arc<Row>>>,
    structure: Signal<TableEvent>,
}

impl Table {
    pub(super) fn create(
        key: Key,
        name: String,
        description: String,
        parent: Weak<Dataset>,
    ) -> Arc<Table> {
        Arc::new_cyclic(|weak| Table {
            self_ref: weak.clone(),
            key,
            name,
            description,
            parent,
            detached: AtomicBool::new(false),
            rows: Guarded::new(HashMap::new()),
            structure: Signal::new(),
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Owning dataset; `None` once the table was removed.
    pub fn parent(&self) -> Option<Arc<Dataset>> {
        self.parent.upgrade()
    }

    /// True once removed from its dataset.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(super) fn detach(&self) {
        self.detached.store(true, Ordering::Release);
        // Rows die with their table: writes through stale handles fail.
        for row in self.rows.with(|rows| rows.values().cloned().collect::<Vec<_>>()) {
            row.detach();
        }
    }

    /// Create a row from `spec`. Fails on duplicate key (parent unchanged),
    /// on a detached table, and on an initial payload larger than the
    /// declared fixed capacity.
    pub fn create_row(&self, spec: RowSpec) -> Result<Arc<Row>> {
        if self.is_detached() {
            return Err(Error::Detached);
        }

        // Typed rows without explicit contents start zeroed at the struct
        // size with declared defaults applied.
        let initial = match (&spec.initial, &spec.meta) {
            (Some(bytes), _) => bytes.clone(),
            (None, Some(meta)) => {
                let mut buf = vec![0u8; meta.size()];
                meta.apply_defaults(&mut buf).map_err(Error::Meta)?;
                buf
            }
            (None, None) => Vec::new(),
        };
        if let Some(capacity) = spec.capacity {
            if initial.len() > capacity {
                return Err(Error::BufferTooLarge {
                    size: initial.len(),
                    capacity,
                });
            }
        }

        let key = spec.key.clone();
        let row = Row::create(spec, self.self_ref.clone(), initial);
        let inserted = self.rows.with(|rows| {
            if rows.contains_key(&key) {
                false
            } else {
                rows.insert(key.clone(), row.clone());
                true
            }
        });
        if !inserted {
            return Err(Error::DuplicateKey(key));
        }

        log::debug!("[Table::create_row] '{}' += '{}'", self.key, key);
        self.structure.raise(&TableEvent::RowAdded(row.clone()));
        Ok(row)
    }

    /// Remove a row by key. Unknown keys report `false` with no side
    /// effect; on success the row is detached and a
    /// [`TableEvent::RowRemoved`] is raised.
    pub fn remove_row(&self, key: &Key) -> bool {
        let removed = self.rows.with(|rows| rows.remove(key));
        match removed {
            Some(row) => {
                row.detach();
                log::debug!("[Table::remove_row] '{}' -= '{}'", self.key, key);
                self.structure.raise(&TableEvent::RowRemoved(row));
                true
            }
            None => false,
        }
    }

    /// Row by key.
    pub fn row(&self, key: &Key) -> Option<Arc<Row>> {
        self.rows.with(|rows| rows.get(key).cloned())
    }

    /// Consistent snapshot of all rows (never a partially-mutated set).
    pub fn rows(&self) -> Vec<Arc<Row>> {
        self.rows.with(|rows| rows.values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.rows.with(|rows| rows.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to row add/remove events.
    pub fn subscribe_structure(
        &self,
        callback: impl Fn(&TableEvent) + Send + Sync + 'static,
    ) -> SubToken {
        self.structure.subscribe(callback)
    }

    /// Remove a structure subscription.
    pub fn unsubscribe_structure(&self, token: SubToken) -> bool {
        self.structure.unsubscribe(token)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("key", &self.key)
            .field("rows", &self.len())
            .field("detached", &self.is_detached())
            .finish()
    }
}
