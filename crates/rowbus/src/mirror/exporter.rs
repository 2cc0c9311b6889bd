// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Export side: subscribe to exported rows, push frames on change.

use super::transport::MirrorTransport;
use super::wire::encode_frame;
use super::MirrorStats;
use crate::core::{Guarded, SubToken};
use crate::model::{Dataset, DatasetEvent, Key, Row, Table, TableEvent};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct ExporterInner {
    self_ref: Weak<ExporterInner>,
    dataset: Arc<Dataset>,
    exported: HashSet<Key>,
    transport: Arc<dyn MirrorTransport>,
    stats: Arc<MirrorStats>,
    row_subs: Guarded<Vec<(Arc<Row>, SubToken)>>,
    table_subs: Guarded<Vec<(Arc<Table>, SubToken)>>,
    dataset_sub: Guarded<Option<SubToken>>,
    started: AtomicBool,
}

impl ExporterInner {
    fn hook_row(&self, row: &Arc<Row>) {
        let weak = self.self_ref.clone();
        let token = row.subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.push_row(&event.row, &event.data);
            }
        });
        if token.is_undefined() {
            log::warn!("[Exporter::hook_row] subscription failed for '{}'", row.key());
            return;
        }
        self.row_subs.with(|subs| subs.push((row.clone(), token)));
    }

    fn unhook_row(&self, row: &Arc<Row>) {
        self.row_subs.with(|subs| {
            subs.retain(|(candidate, token)| {
                if Arc::ptr_eq(candidate, row) {
                    candidate.unsubscribe(*token);
                    false
                } else {
                    true
                }
            });
        });
    }

    fn hook_table(&self, table: &Arc<Table>) {
        let weak = self.self_ref.clone();
        let token = table.subscribe_structure(move |event| {
            let Some(inner) = weak.upgrade() else { return };
            match event {
                TableEvent::RowAdded(row) => inner.hook_row(row),
                TableEvent::RowRemoved(row) => inner.unhook_row(row),
            }
        });
        self.table_subs.with(|subs| subs.push((table.clone(), token)));

        for row in table.rows() {
            self.hook_row(&row);
        }
    }

    fn push_row(&self, row: &Arc<Row>, data: &[u8]) {
        let Some(table) = row.parent() else {
            return; // row detached mid-flight, nothing to address it by
        };
        let mut frame = Vec::with_capacity(data.len() + 16);
        if let Err(e) = encode_frame(table.key(), row.key(), data, &mut frame) {
            log::warn!("[Exporter::push_row] encode failed for '{}': {}", row.key(), e);
            self.stats.inc_send_failures();
            return;
        }
        match self.transport.send(&frame) {
            Ok(()) => self.stats.inc_sent(),
            Err(e) => {
                log::debug!("[Exporter::push_row] send failed for '{}': {}", row.key(), e);
                self.stats.inc_send_failures();
            }
        }
    }
}

/// Exporting half of a mirror: watches the configured tables and pushes
/// every accepted row change over the transport.
///
/// Tables created after [`start`](Exporter::start) are picked up through
/// the dataset structure signal; rows created after `start` through each
/// table's structure signal.
pub struct Exporter {
    inner: Arc<ExporterInner>,
}

impl Exporter {
    pub fn new(
        dataset: Arc<Dataset>,
        exported: impl IntoIterator<Item = Key>,
        transport: Arc<dyn MirrorTransport>,
        stats: Arc<MirrorStats>,
    ) -> Self {
        Self {
            inner: Arc::new_cyclic(|weak| ExporterInner {
                self_ref: weak.clone(),
                dataset,
                exported: exported.into_iter().collect(),
                transport,
                stats,
                row_subs: Guarded::new(Vec::new()),
                table_subs: Guarded::new(Vec::new()),
                dataset_sub: Guarded::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Subscribe to every row of every exported table. Idempotent.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let token = self.inner.dataset.subscribe_structure(move |event| {
            let Some(inner) = weak.upgrade() else { return };
            if let DatasetEvent::TableAdded(table) = event {
                if inner.exported.contains(table.key()) {
                    inner.hook_table(table);
                }
            }
        });
        self.inner.dataset_sub.with(|slot| *slot = Some(token));

        for table in self.inner.dataset.tables() {
            if self.inner.exported.contains(table.key()) {
                self.inner.hook_table(&table);
            }
        }
        log::debug!(
            "[Exporter::start] watching {} table(s)",
            self.inner.table_subs.with(|s| s.len())
        );
    }

    /// Drop every subscription. Idempotent.
    pub fn stop(&self) {
        if !self.inner.started.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(token) = self.inner.dataset_sub.with(|slot| slot.take()) {
            self.inner.dataset.unsubscribe_structure(token);
        }
        self.inner.row_subs.with(|subs| {
            for (row, token) in subs.drain(..) {
                row.unsubscribe(token);
            }
        });
        self.inner.table_subs.with(|subs| {
            for (table, token) in subs.drain(..) {
                table.unsubscribe_structure(token);
            }
        });
    }

    /// Push the current contents of every exported row (used on connect
    /// and reconnect: best-effort resume from current local state).
    pub fn push_snapshot(&self) {
        for table in self.inner.dataset.tables() {
            if !self.inner.exported.contains(table.key()) {
                continue;
            }
            for row in table.rows() {
                let data = row.to_vec();
                self.inner.push_row(&row, &data);
            }
        }
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<MirrorStats> {
        self.inner.stats.clone()
    }
}

impl Drop for Exporter {
    fn drop(&mut self) {
        self.stop();
    }
}
