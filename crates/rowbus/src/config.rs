// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ROWBUS Global Configuration - Single Source of Truth
//!
//! This module centralizes ALL tunable constants and runtime configuration.
//! **NEVER hardcode elsewhere!**
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: Compile-time constants (snapshot bounds, wire limits)
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`] for runtime tuning (mirror backoff,
//!   free-form key/value settings)
//!
//! # Performance
//!
//! - **Lock-free**: `DashMap` for the settings store (no RwLock contention)
//! - **Atomic swap**: `ArcSwap` for [`MirrorTuning`] (no lock on the hot path)
//! - **Zero-copy**: `Arc<str>` for keys/values (no clone)

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

// =======================================================================
// Signal fan-out
// =======================================================================

/// Subscriber snapshots up to this size are cloned on the stack during
/// [`crate::core::Signal::raise`]; larger sets fall back to the heap.
pub const SIGNAL_STACK_SNAPSHOT: usize = 32;

/// Sentinel value backing [`crate::core::SubToken::UNDEFINED`].
///
/// Token allocation fails once the token space below this value is exhausted.
pub const TOKEN_UNDEFINED: u32 = u32::MAX;

// =======================================================================
// Mirror wire protocol
// =======================================================================

/// Upper bound on a single mirrored row payload.
///
/// Frames whose declared payload length exceeds this are rejected by the
/// decoder before any allocation happens.
pub const MAX_FRAME_PAYLOAD: usize = 1 << 20;

/// Upper bound on a string key on the wire (u16 length prefix).
pub const MAX_KEY_NAME_LEN: usize = u16::MAX as usize;

/// Priority applied by [`crate::mirror::Importer`] when no explicit import
/// priority is configured.
pub const DEFAULT_IMPORT_PRIORITY: i32 = 0;

// =======================================================================
// Mirror session reconnect
// =======================================================================

/// First reconnect delay after a transport failure.
pub const MIRROR_INITIAL_BACKOFF_MS: u64 = 100;

/// Reconnect delay ceiling.
pub const MIRROR_MAX_BACKOFF_MS: u64 = 5_000;

/// Backoff multiplier applied per consecutive failed attempt.
pub const MIRROR_BACKOFF_MULTIPLIER: u32 = 2;

/// Session housekeeping timer period (connection probing granularity).
pub const MIRROR_TICK_MS: u64 = 50;

/// Mirror session reconnect tuning, swappable at runtime.
///
/// Read on every session tick via `ArcSwap::load` (lock-free); replaced
/// wholesale with [`RuntimeConfig::set_mirror_tuning`].
#[derive(Debug, Clone)]
pub struct MirrorTuning {
    /// First reconnect delay.
    pub initial_backoff: Duration,
    /// Reconnect delay ceiling.
    pub max_backoff: Duration,
    /// Backoff multiplier per consecutive failure.
    pub multiplier: u32,
    /// Housekeeping timer period.
    pub tick: Duration,
}

impl Default for MirrorTuning {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(MIRROR_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MIRROR_MAX_BACKOFF_MS),
            multiplier: MIRROR_BACKOFF_MULTIPLIER,
            tick: Duration::from_millis(MIRROR_TICK_MS),
        }
    }
}

/// Runtime configuration store.
///
/// Free-form string settings plus the structured mirror tuning. One instance
/// is typically shared per process component; there is deliberately no
/// ambient global - pass the handle to whoever needs it.
pub struct RuntimeConfig {
    settings: DashMap<Arc<str>, Arc<str>>,
    mirror: ArcSwap<MirrorTuning>,
}

impl RuntimeConfig {
    /// Create a config with default tuning and no settings.
    pub fn new() -> Self {
        Self {
            settings: DashMap::new(),
            mirror: ArcSwap::from_pointee(MirrorTuning::default()),
        }
    }

    /// Set a free-form setting (overwrites).
    pub fn set_setting(&self, key: &str, value: &str) {
        self.settings.insert(Arc::from(key), Arc::from(value));
    }

    /// Get a setting value.
    pub fn get_setting(&self, key: &str) -> Option<Arc<str>> {
        self.settings.get(key).map(|e| e.value().clone())
    }

    /// All settings whose key starts with `prefix`, as (key, value) pairs.
    pub fn search_prefix(&self, prefix: &str) -> Vec<(Arc<str>, Arc<str>)> {
        self.settings
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Current mirror tuning snapshot (lock-free).
    pub fn mirror_tuning(&self) -> Arc<MirrorTuning> {
        self.mirror.load_full()
    }

    /// Replace the mirror tuning atomically.
    pub fn set_mirror_tuning(&self, tuning: MirrorTuning) {
        self.mirror.store(Arc::new(tuning));
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}
