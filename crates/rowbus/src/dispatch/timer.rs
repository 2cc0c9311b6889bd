// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic timer bookkeeping for a dispatcher worker.

use crate::config::TOKEN_UNDEFINED;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle for a registered timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(pub(crate) u32);

impl TimerToken {
    /// Sentinel for a failed registration.
    pub const UNDEFINED: TimerToken = TimerToken(TOKEN_UNDEFINED);

    /// True if this token marks a failed registration.
    pub fn is_undefined(&self) -> bool {
        self.0 == TOKEN_UNDEFINED
    }
}

pub(crate) struct TimerEntry {
    token: u32,
    interval: Duration,
    next_due: Instant,
    /// Remaining firings; `None` = infinite.
    remaining: Option<u32>,
    callback: Arc<dyn Fn() + Send + Sync>,
}

/// Timer table owned by one dispatcher; all mutation happens under the
/// dispatcher's timer lock, all firing on its worker thread.
pub(crate) struct TimerTable {
    entries: Vec<TimerEntry>,
    next_token: u32,
}

impl TimerTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_token: 0,
        }
    }

    pub(crate) fn register(
        &mut self,
        interval: Duration,
        callback: Arc<dyn Fn() + Send + Sync>,
        repeat_count: u32,
    ) -> TimerToken {
        if self.next_token == TOKEN_UNDEFINED {
            return TimerToken::UNDEFINED;
        }
        let token = self.next_token;
        self.next_token += 1;
        self.entries.push(TimerEntry {
            token,
            interval,
            next_due: Instant::now() + interval,
            remaining: (repeat_count != 0).then_some(repeat_count),
            callback,
        });
        TimerToken(token)
    }

    pub(crate) fn cancel(&mut self, token: TimerToken) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.token != token.0);
        self.entries.len() != before
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Earliest deadline across all registered timers.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.next_due).min()
    }

    /// Pop the callbacks due at `now`, advancing schedules and dropping
    /// exhausted entries. Callbacks are invoked by the caller after the
    /// table lock has been released.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<Arc<dyn Fn() + Send + Sync>> {
        let mut due = Vec::new();
        self.entries.retain_mut(|e| {
            if e.next_due > now {
                return true;
            }
            due.push(e.callback.clone());
            // Reschedule from `now`, not from the missed deadline: a stalled
            // worker fires once, not a burst of catch-up invocations.
            e.next_due = now + e.interval;
            match &mut e.remaining {
                Some(1) => false,
                Some(n) => {
                    *n -= 1;
                    true
                }
                None => true,
            }
        });
        due
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
