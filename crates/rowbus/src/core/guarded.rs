// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Mutex-guarded value with scoped access.

use parking_lot::{Mutex, MutexGuard};

/// A value behind a mutex, with two access styles.
///
/// `with` runs a closure under the lock and returns its result; `lock`
/// hands out an RAII token ([`GuardedLock`]) released on scope exit. The
/// wrapper is deliberately not `Clone` - exclusive access is the whole
/// point - and provides no recursive locking; lock ordering across multiple
/// `Guarded` values is the caller's responsibility.
///
/// # Example
/// ```rust
/// use rowbus::Guarded;
///
/// let counter = Guarded::new(0u32);
/// counter.with(|c| *c += 1);
/// assert_eq!(counter.with(|c| *c), 1);
/// ```
pub struct Guarded<T> {
    inner: Mutex<T>,
}

impl<T> Guarded<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Run `f` with exclusive access, returning its result.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Acquire an explicit lock token. Exclusive access lasts until the
    /// token is dropped.
    pub fn lock(&self) -> GuardedLock<'_, T> {
        GuardedLock {
            guard: self.inner.lock(),
        }
    }

    /// Consume the wrapper, returning the inner value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for Guarded<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// RAII lock token for a [`Guarded`] value.
pub struct GuardedLock<'a, T> {
    guard: MutexGuard<'a, T>,
}

impl<T> std::ops::Deref for GuardedLock<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> std::ops::DerefMut for GuardedLock<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
