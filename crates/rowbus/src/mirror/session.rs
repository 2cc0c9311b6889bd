// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mirror session: exporter lifetime + reconnect loop with backoff.

use super::exporter::Exporter;
use super::transport::MirrorTransport;
use super::MirrorStats;
use crate::config::RuntimeConfig;
use crate::dispatch::{Dispatcher, TimerToken};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

struct Backoff {
    /// Next attempt not before this point.
    hold_until: Option<Instant>,
    current: Duration,
}

struct SessionInner {
    exporter: Exporter,
    transport: Arc<dyn MirrorTransport>,
    config: Arc<RuntimeConfig>,
    stats: Arc<MirrorStats>,
    backoff: Mutex<Backoff>,
    /// Link state as of the previous tick (edge detection).
    was_connected: AtomicBool,
}

impl SessionInner {
    /// Housekeeping tick on the session dispatcher: probe the link and
    /// drive the reconnect/backoff state machine.
    fn tick(&self) {
        if self.transport.is_connected() {
            if !self.was_connected.swap(true, Ordering::AcqRel) {
                log::info!("[MirrorSession::tick] link up, pushing snapshot");
                self.exporter.push_snapshot();
            }
            let tuning = self.config.mirror_tuning();
            let mut backoff = self.backoff.lock();
            backoff.hold_until = None;
            backoff.current = tuning.initial_backoff;
            return;
        }
        self.was_connected.store(false, Ordering::Release);

        let tuning = self.config.mirror_tuning();
        let now = Instant::now();
        {
            let backoff = self.backoff.lock();
            if backoff.hold_until.is_some_and(|until| now < until) {
                return;
            }
        }

        if self.transport.connect() {
            log::info!("[MirrorSession::tick] reconnected, pushing snapshot");
            self.stats.inc_reconnects();
            self.was_connected.store(true, Ordering::Release);
            let mut backoff = self.backoff.lock();
            backoff.hold_until = None;
            backoff.current = tuning.initial_backoff;
            drop(backoff);
            // Best-effort resume: re-push everything from current local
            // state, no replay log.
            self.exporter.push_snapshot();
        } else {
            let mut backoff = self.backoff.lock();
            backoff.hold_until = Some(now + backoff.current);
            backoff.current = (backoff.current * tuning.multiplier).min(tuning.max_backoff);
            log::debug!(
                "[MirrorSession::tick] connect failed, next attempt in {:?}",
                backoff.current
            );
        }
    }
}

/// Owns the exporting half of a mirror and keeps its link alive.
///
/// A dispatcher timer probes the transport every
/// [`MirrorTuning::tick`](crate::config::MirrorTuning) period; on a lost
/// link the session retries `connect` with exponential backoff and, once
/// reconnected, re-pushes the full exported snapshot.
pub struct MirrorSession {
    inner: Arc<SessionInner>,
    dispatcher: Arc<Dispatcher>,
    timer: Mutex<Option<TimerToken>>,
}

impl MirrorSession {
    pub fn new(
        exporter: Exporter,
        transport: Arc<dyn MirrorTransport>,
        dispatcher: Arc<Dispatcher>,
        config: Arc<RuntimeConfig>,
    ) -> Self {
        let stats = exporter.stats();
        let initial = config.mirror_tuning().initial_backoff;
        Self {
            inner: Arc::new(SessionInner {
                exporter,
                transport,
                config,
                stats,
                backoff: Mutex::new(Backoff {
                    hold_until: None,
                    current: initial,
                }),
                was_connected: AtomicBool::new(false),
            }),
            dispatcher,
            timer: Mutex::new(None),
        }
    }

    /// Start exporting and the reconnect loop. Idempotent.
    pub fn start(&self) {
        let mut timer = self.timer.lock();
        if timer.is_some() {
            return;
        }

        self.inner.exporter.start();
        if self.inner.transport.is_connected() {
            self.inner.was_connected.store(true, Ordering::Release);
            self.inner.exporter.push_snapshot();
        }

        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let tick = self.inner.config.mirror_tuning().tick;
        *timer = Some(self.dispatcher.register_timer(
            tick,
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.tick();
                }
            },
            0,
        ));
    }

    /// Stop the reconnect loop and drop all subscriptions. After this
    /// returns no further mirror traffic is produced. Idempotent.
    pub fn stop(&self) {
        if let Some(token) = self.timer.lock().take() {
            self.dispatcher.unregister_timer(token);
        }
        self.inner.exporter.stop();
    }

    /// Shared counters.
    pub fn stats(&self) -> Arc<MirrorStats> {
        self.inner.stats.clone()
    }
}

impl Drop for MirrorSession {
    fn drop(&mut self) {
        self.stop();
    }
}
