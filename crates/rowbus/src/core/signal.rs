// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Multi-subscriber callback fan-out.
//!
//! Broadcast path: clone the subscriber set under the lock, release the
//! lock, invoke the snapshot. Subscribers may therefore subscribe or
//! unsubscribe on the same signal from inside their own callback without
//! deadlock, and a raise in flight always delivers one consistent set.
//!
//! Snapshots up to [`SIGNAL_STACK_SNAPSHOT`](crate::config::SIGNAL_STACK_SNAPSHOT)
//! entries stay on the stack (`SmallVec`); larger subscriber counts spill to
//! the heap.

use crate::config::{SIGNAL_STACK_SNAPSHOT, TOKEN_UNDEFINED};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::marker::PhantomData;
use std::sync::Arc;

/// Subscription handle returned by [`Signal::subscribe`].
///
/// Tokens are the smallest non-negative integer not currently in use on the
/// signal; [`SubToken::UNDEFINED`] signals a failed registration (token
/// space exhausted or duplicate observer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubToken(pub(crate) u32);

impl SubToken {
    /// Sentinel for a failed registration.
    pub const UNDEFINED: SubToken = SubToken(TOKEN_UNDEFINED);

    /// True if this token marks a failed registration.
    pub fn is_undefined(&self) -> bool {
        self.0 == TOKEN_UNDEFINED
    }

    /// Raw token value.
    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Observer trait for signal subscribers.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`: callbacks run on whichever thread
/// raises the signal (or on a dispatcher worker when marshaled).
pub trait Observer<E>: Send + Sync {
    /// Called once per raise, with the event captured by the raiser.
    fn notify(&self, event: &E);
}

/// Closure adapter so plain functions can subscribe without a custom type.
struct FnObserver<E, F: Fn(&E) + Send + Sync> {
    callback: F,
    _marker: PhantomData<fn(&E)>,
}

impl<E, F: Fn(&E) + Send + Sync> Observer<E> for FnObserver<E, F> {
    fn notify(&self, event: &E) {
        (self.callback)(event);
    }
}

struct Entry<E: 'static> {
    token: u32,
    observer: Arc<dyn Observer<E>>,
}

/// Token-based synchronous fan-out to multiple subscribers.
///
/// # Ordering
/// Each raise invokes the snapshot in token order (= subscription order for
/// a set that only grows). Two concurrent raises may interleave arbitrarily;
/// each one delivers its own consistent snapshot.
pub struct Signal<E: 'static> {
    entries: Mutex<Vec<Entry<E>>>,
}

impl<E: 'static> Signal<E> {
    /// Create an empty signal.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe a closure. Always succeeds while token space remains.
    pub fn subscribe(&self, callback: impl Fn(&E) + Send + Sync + 'static) -> SubToken {
        self.subscribe_observer(Arc::new(FnObserver {
            callback,
            _marker: PhantomData,
        }))
    }

    /// Subscribe an observer object.
    ///
    /// Identity is the `Arc` itself: registering the same observer twice on
    /// the same signal is rejected with [`SubToken::UNDEFINED`].
    pub fn subscribe_observer(&self, observer: Arc<dyn Observer<E>>) -> SubToken {
        let mut entries = self.entries.lock();

        if entries.iter().any(|e| Arc::ptr_eq(&e.observer, &observer)) {
            log::debug!("[Signal::subscribe_observer] duplicate observer rejected");
            return SubToken::UNDEFINED;
        }

        // Smallest unused token; entries stay sorted by token.
        let mut token = 0u32;
        let mut insert_at = entries.len();
        for (i, e) in entries.iter().enumerate() {
            if e.token == token {
                token += 1;
            } else {
                insert_at = i;
                break;
            }
        }
        if token == TOKEN_UNDEFINED {
            log::warn!("[Signal::subscribe_observer] token space exhausted");
            return SubToken::UNDEFINED;
        }
        entries.insert(insert_at, Entry { token, observer });
        SubToken(token)
    }

    /// Remove a subscription. Unknown or already-removed tokens report
    /// `false` with no side effect.
    pub fn unsubscribe(&self, token: SubToken) -> bool {
        if token.is_undefined() {
            return false;
        }
        let mut entries = self.entries.lock();
        match entries.binary_search_by_key(&token.0, |e| e.token) {
            Ok(idx) => {
                entries.remove(idx);
                true
            }
            Err(_) => false,
        }
    }

    /// Deliver `event` to every current subscriber, in token order.
    pub fn raise(&self, event: &E) {
        let snapshot: SmallVec<[Arc<dyn Observer<E>>; SIGNAL_STACK_SNAPSHOT]> = {
            let entries = self.entries.lock();
            entries.iter().map(|e| e.observer.clone()).collect()
        };
        for observer in &snapshot {
            observer.notify(event);
        }
    }

    /// Current subscriber count.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<E: 'static> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_tokens_are_smallest_unused() {
        let signal: Signal<u32> = Signal::new();
        let t0 = signal.subscribe(|_| {});
        let t1 = signal.subscribe(|_| {});
        let t2 = signal.subscribe(|_| {});
        assert_eq!((t0.value(), t1.value(), t2.value()), (0, 1, 2));

        assert!(signal.unsubscribe(t1));
        let t1_again = signal.subscribe(|_| {});
        assert_eq!(t1_again.value(), 1);
        assert_eq!(signal.len(), 3);
    }

    #[test]
    fn test_unsubscribe_unknown_token_fails() {
        let signal: Signal<u32> = Signal::new();
        let t = signal.subscribe(|_| {});
        assert!(!signal.unsubscribe(SubToken(99)));
        assert!(!signal.unsubscribe(SubToken::UNDEFINED));
        assert!(signal.unsubscribe(t));
        assert!(!signal.unsubscribe(t)); // double unsubscribe
    }

    #[test]
    fn test_raise_invokes_all_in_order() {
        let signal: Signal<u32> = Signal::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            signal.subscribe(move |_| order.lock().push(id));
        }
        signal.raise(&7);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_duplicate_observer_rejected() {
        struct Counter(AtomicU32);
        impl Observer<u32> for Counter {
            fn notify(&self, _: &u32) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let signal: Signal<u32> = Signal::new();
        let obs = Arc::new(Counter(AtomicU32::new(0)));
        let t = signal.subscribe_observer(obs.clone());
        assert!(!t.is_undefined());

        let dup = signal.subscribe_observer(obs.clone());
        assert!(dup.is_undefined());

        signal.raise(&1);
        assert_eq!(obs.0.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_reentrant_unsubscribe_does_not_skip_others() {
        let signal: Arc<Signal<u32>> = Arc::new(Signal::new());
        let hits = Arc::new(AtomicU32::new(0));

        // Subscriber 0 unsubscribes itself mid-raise.
        let token_cell = Arc::new(Mutex::new(SubToken::UNDEFINED));
        {
            let signal = signal.clone();
            let token_cell = token_cell.clone();
            let token_cell_inner = token_cell.clone();
            let token = signal.clone().subscribe(move |_| {
                let t = *token_cell_inner.lock();
                signal.unsubscribe(t);
            });
            *token_cell.lock() = token;
        }
        {
            let hits = hits.clone();
            signal.subscribe(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            });
        }

        signal.raise(&0);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert_eq!(signal.len(), 1);

        // Second raise: the self-removed subscriber is gone.
        signal.raise(&0);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_reentrant_subscribe_during_raise() {
        let signal: Arc<Signal<u32>> = Arc::new(Signal::new());
        let late_hits = Arc::new(AtomicU32::new(0));

        {
            let signal = signal.clone();
            let late_hits = late_hits.clone();
            signal.clone().subscribe(move |_| {
                let late_hits = late_hits.clone();
                signal.subscribe(move |_| {
                    late_hits.fetch_add(1, Ordering::Relaxed);
                });
            });
        }

        // The newly added subscriber is not part of the in-flight snapshot.
        signal.raise(&0);
        assert_eq!(late_hits.load(Ordering::Relaxed), 0);

        signal.raise(&0);
        assert_eq!(late_hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_heap_fallback_beyond_stack_bound() {
        let signal: Signal<u32> = Signal::new();
        let hits = Arc::new(AtomicU32::new(0));
        let n = (crate::config::SIGNAL_STACK_SNAPSHOT * 2) as u32;

        for _ in 0..n {
            let hits = hits.clone();
            signal.subscribe(move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
            });
        }
        signal.raise(&0);
        assert_eq!(hits.load(Ordering::Relaxed), n);
    }
}
