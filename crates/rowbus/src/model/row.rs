// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rows: priority-gated byte buffers with change subscribers.

use super::table::Table;
use super::{Error, Key, Result};
use crate::core::{Observer, Signal, SubToken};
use crate::dispatch::Dispatcher;
use crate::meta::{StructMeta, ValidationReport, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Semantic flavor of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowKind {
    /// Pulse row: every accepted write is reported as a change, payload
    /// equality notwithstanding. Used for triggers/heartbeats.
    Empty,
    /// Raw byte payload without declared structure.
    #[default]
    Bytes,
    /// Structured payload described by attached [`StructMeta`].
    Struct,
}

/// Human-facing row description.
#[derive(Debug, Clone, Default)]
pub struct RowInfo {
    pub kind: RowKind,
    pub name: String,
    pub description: String,
}

/// Change notification payload.
///
/// Carries a strong reference to the row (keeping it alive for the duration
/// of the delivery) and the bytes captured at write time - **not** re-read
/// from the row, so a notification always reflects exactly the write that
/// produced it.
#[derive(Clone)]
pub struct RowEvent {
    pub row: Arc<Row>,
    pub data: Arc<[u8]>,
}

/// Construction parameters for [`Table::create_row`].
pub struct RowSpec {
    pub(super) key: Key,
    pub(super) info: RowInfo,
    /// `Some(n)` = fixed capacity, `None` = unbounded (high-water growth).
    pub(super) capacity: Option<usize>,
    pub(super) meta: Option<Arc<StructMeta>>,
    pub(super) initial_priority: i32,
    pub(super) initial: Option<Vec<u8>>,
}

impl RowSpec {
    /// Unbounded byte row with default info.
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            key: key.into(),
            info: RowInfo::default(),
            capacity: None,
            meta: None,
            initial_priority: 0,
            initial: None,
        }
    }

    /// Fix the buffer capacity; oversized writes will fail.
    pub fn fixed_size(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Set the row info block.
    pub fn info(mut self, info: RowInfo) -> Self {
        self.info = info;
        self
    }

    /// Shorthand for setting only the kind.
    pub fn kind(mut self, kind: RowKind) -> Self {
        self.info.kind = kind;
        self
    }

    /// Attach structured metadata: marks the row [`RowKind::Struct`] and,
    /// unless a capacity was set explicitly, fixes it to the struct size.
    pub fn with_meta(mut self, meta: Arc<StructMeta>) -> Self {
        if self.capacity.is_none() {
            self.capacity = Some(meta.size());
        }
        self.info.kind = RowKind::Struct;
        self.meta = Some(meta);
        self
    }

    /// Initial write-priority gate (default 0).
    pub fn priority(mut self, priority: i32) -> Self {
        self.initial_priority = priority;
        self
    }

    /// Initial buffer contents.
    pub fn initial(mut self, bytes: Vec<u8>) -> Self {
        self.initial = Some(bytes);
        self
    }
}

struct RowState {
    /// Backing allocation; for unbounded rows this only ever grows
    /// (high-water mark), the logical size below shrinks freely.
    buf: Vec<u8>,
    len: usize,
    capacity: Option<usize>,
    /// Current gate: priority of the last accepted write, or the floor
    /// forced through `set_write_priority`.
    write_priority: i32,
}

/// The unit of mutable state: a keyed byte buffer with a write-priority
/// gate and an independent set of change subscribers.
///
/// Created by [`Table::create_row`], never directly.
pub struct Row {
    self_ref: Weak<Row>,
    key: Key,
    info: RowInfo,
    meta: Option<Arc<StructMeta>>,
    parent: Weak<Table>,
    detached: AtomicBool,
    state: Mutex<RowState>,
    changed: Signal<RowEvent>,
}

impl Row {
    pub(super) fn create(spec: RowSpec, parent: Weak<Table>, initial: Vec<u8>) -> Arc<Row> {
        Arc::new_cyclic(|weak| Row {
            self_ref: weak.clone(),
            key: spec.key,
            info: spec.info,
            meta: spec.meta,
            parent,
            detached: AtomicBool::new(false),
            state: Mutex::new(RowState {
                len: initial.len(),
                buf: initial,
                capacity: spec.capacity,
                write_priority: spec.initial_priority,
            }),
            changed: Signal::new(),
        })
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn info(&self) -> &RowInfo {
        &self.info
    }

    /// Attached layout metadata, if any.
    pub fn meta(&self) -> Option<&Arc<StructMeta>> {
        self.meta.as_ref()
    }

    /// Owning table; `None` once the row (or its table) was removed.
    pub fn parent(&self) -> Option<Arc<Table>> {
        self.parent.upgrade()
    }

    /// True once removed from its table; all writes fail from then on.
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    pub(super) fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }

    /// Current logical payload size.
    pub fn size(&self) -> usize {
        self.state.lock().len
    }

    /// Fixed capacity, `None` for unbounded rows.
    pub fn capacity(&self) -> Option<usize> {
        self.state.lock().capacity
    }

    /// Current gate value.
    pub fn write_priority(&self) -> i32 {
        self.state.lock().write_priority
    }

    /// Force the gate floor regardless of past writes.
    pub fn set_write_priority(&self, priority: i32) {
        self.state.lock().write_priority = priority;
    }

    /// Write `data` through the priority gate.
    ///
    /// Returns `true` for accepted writes **and** for gate-rejected ones
    /// (a lower-priority writer is silently overridden - no state change,
    /// no notification). Returns `false` only for real failures: a detached
    /// row, or an oversized write into a fixed-capacity row.
    ///
    /// When the write constitutes a change (`force_report`, pulse row, size
    /// or byte difference), every subscriber is notified exactly once,
    /// synchronously, in subscription order, with the bytes captured before
    /// the row lock was released.
    pub fn write(&self, data: &[u8], force_report: bool, priority: i32) -> bool {
        if self.is_detached() {
            return false;
        }

        let event_data: Arc<[u8]> = {
            let mut state = self.state.lock();

            if priority < state.write_priority {
                // Gate rejection is deliberately success-shaped.
                log::trace!("[Row::write] '{}' gated: {} < {}", self.key, priority, state.write_priority);
                return true;
            }
            if let Some(capacity) = state.capacity {
                if data.len() > capacity {
                    log::debug!(
                        "[Row::write] '{}' rejected: {} bytes > fixed capacity {}",
                        self.key,
                        data.len(),
                        capacity
                    );
                    return false;
                }
            }

            let changed = force_report
                || self.info.kind == RowKind::Empty
                || data.len() != state.len
                || data != &state.buf[..state.len];

            if state.buf.len() < data.len() {
                // High-water growth: the allocation never shrinks afterwards.
                state.buf.resize(data.len(), 0);
            }
            state.buf[..data.len()].copy_from_slice(data);
            state.len = data.len();
            state.write_priority = priority;

            if !changed {
                return true;
            }
            Arc::from(&state.buf[..state.len])
        };

        // Lock released; deliver the captured payload.
        if let Some(row) = self.self_ref.upgrade() {
            self.changed.raise(&RowEvent {
                row,
                data: event_data,
            });
        }
        true
    }

    /// Copy up to `out.len()` payload bytes into `out`, returning the count
    /// actually copied.
    pub fn read_bytes(&self, out: &mut [u8]) -> usize {
        let state = self.state.lock();
        let n = out.len().min(state.len);
        out[..n].copy_from_slice(&state.buf[..n]);
        n
    }

    /// Snapshot the payload into a fresh vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let state = self.state.lock();
        state.buf[..state.len].to_vec()
    }

    /// Read a typed value by field path (requires attached metadata).
    pub fn read_field(&self, path: &str) -> Result<Value> {
        let meta = self.meta.as_ref().ok_or(Error::NoMetadata)?;
        let snapshot = self.to_vec();
        meta.read_field(&snapshot, path).map_err(Error::Meta)
    }

    /// Write a typed value by field path through the normal write gate
    /// (at the row's current gate priority, so the write always passes it).
    pub fn write_field(&self, path: &str, value: &Value) -> Result<()> {
        let meta = self.meta.clone().ok_or(Error::NoMetadata)?;
        let mut snapshot = self.to_vec();
        meta.write_field(&mut snapshot, path, value).map_err(Error::Meta)?;
        let priority = self.write_priority();
        if self.write(&snapshot, false, priority) {
            Ok(())
        } else {
            Err(Error::Detached)
        }
    }

    /// Bounds-check the current payload against attached metadata.
    pub fn validate(&self) -> Result<ValidationReport> {
        let meta = self.meta.as_ref().ok_or(Error::NoMetadata)?;
        Ok(meta.validate(&self.to_vec()))
    }

    /// Subscribe a closure to content changes. Delivery is synchronous on
    /// the writing thread.
    pub fn subscribe(&self, callback: impl Fn(&RowEvent) + Send + Sync + 'static) -> SubToken {
        self.changed.subscribe(callback)
    }

    /// Subscribe an observer object (rejected as duplicate when the same
    /// `Arc` is already registered on this row).
    pub fn subscribe_observer(&self, observer: Arc<dyn Observer<RowEvent>>) -> SubToken {
        self.changed.subscribe_observer(observer)
    }

    /// Subscribe with delivery marshaled onto `dispatcher`: callbacks for
    /// this subscription run FIFO on the dispatcher's worker and never
    /// concurrently with each other, regardless of which threads write.
    pub fn subscribe_on(
        &self,
        dispatcher: &Arc<Dispatcher>,
        callback: impl Fn(&RowEvent) + Send + Sync + 'static,
    ) -> SubToken {
        let dispatcher = dispatcher.clone();
        let callback = Arc::new(callback);
        self.changed.subscribe(move |event: &RowEvent| {
            let callback = callback.clone();
            let event = event.clone();
            dispatcher.begin_invoke(move || (*callback)(&event));
        })
    }

    /// Remove a subscription; unknown tokens report `false`.
    pub fn unsubscribe(&self, token: SubToken) -> bool {
        self.changed.unsubscribe(token)
    }

    /// Current subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.changed.len()
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("key", &self.key)
            .field("kind", &self.info.kind)
            .field("size", &self.size())
            .field("detached", &self.is_detached())
            .finish()
    }
}
