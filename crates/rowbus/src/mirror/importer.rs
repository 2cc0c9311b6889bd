// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Import side: apply received frames to local rows.

use super::wire::decode_frame;
use super::{MirrorError, MirrorStats};
use crate::config::DEFAULT_IMPORT_PRIORITY;
use crate::model::{Dataset, Key};
use std::collections::HashSet;
use std::sync::Arc;

/// Importing half of a mirror: decodes frames and writes them into the
/// configured tables with `force_report = true`, so even value-identical
/// remote updates propagate to local subscribers.
///
/// Frames addressing unconfigured tables or unknown rows are dropped and
/// counted, never fatal; only malformed bytes surface as an error (also
/// counted).
pub struct Importer {
    dataset: Arc<Dataset>,
    imported: HashSet<Key>,
    priority: i32,
    stats: Arc<MirrorStats>,
}

impl Importer {
    pub fn new(
        dataset: Arc<Dataset>,
        imported: impl IntoIterator<Item = Key>,
        stats: Arc<MirrorStats>,
    ) -> Self {
        Self {
            dataset,
            imported: imported.into_iter().collect(),
            priority: DEFAULT_IMPORT_PRIORITY,
            stats,
        }
    }

    /// Priority applied to imported writes (default
    /// [`DEFAULT_IMPORT_PRIORITY`]).
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Decode and apply one frame from the front of `buf`, returning the
    /// bytes consumed.
    pub fn apply(&self, buf: &[u8]) -> Result<usize, MirrorError> {
        let (frame, consumed) = decode_frame(buf).map_err(|e| {
            self.stats.inc_decode_errors();
            log::warn!("[Importer::apply] malformed frame: {}", e);
            MirrorError::Wire(e)
        })?;

        if !self.imported.contains(&frame.table_key) {
            self.stats.inc_dropped_unknown_table();
            log::debug!("[Importer::apply] unconfigured table '{}'", frame.table_key);
            return Ok(consumed);
        }
        let Some(row) = self.dataset.row(&frame.table_key, &frame.row_key) else {
            self.stats.inc_dropped_unknown_row();
            log::debug!(
                "[Importer::apply] unknown row '{}/{}'",
                frame.table_key,
                frame.row_key
            );
            return Ok(consumed);
        };

        if row.write(&frame.payload, true, self.priority) {
            self.stats.inc_applied();
        } else {
            self.stats.inc_write_rejects();
            log::debug!(
                "[Importer::apply] write rejected for '{}/{}'",
                frame.table_key,
                frame.row_key
            );
        }
        Ok(consumed)
    }

    /// Apply every frame in `buf`; returns the number of frames processed.
    /// Stops (with the decode error) at the first malformed frame.
    pub fn apply_all(&self, buf: &[u8]) -> Result<usize, MirrorError> {
        let mut offset = 0;
        let mut frames = 0;
        while offset < buf.len() {
            offset += self.apply(&buf[offset..])?;
            frames += 1;
        }
        Ok(frames)
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<MirrorStats> {
        self.stats.clone()
    }
}
