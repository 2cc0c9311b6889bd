// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-worker dispatcher: FIFO queue, blocking invoke, periodic timers.

use super::timer::{TimerTable, TimerToken};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

enum Job {
    Run(Box<dyn FnOnce() + Send + 'static>),
    Shutdown,
}

struct Shared {
    name: String,
    disposed: AtomicBool,
    /// Worker thread id, stored by the worker at loop entry.
    worker_id: Mutex<Option<ThreadId>>,
    timers: Mutex<TimerTable>,
    pending: AtomicUsize,
    executed: AtomicU64,
    panicked: AtomicU64,
}

impl Shared {
    fn is_worker_thread(&self) -> bool {
        self.worker_id.lock().is_some_and(|id| id == thread::current().id())
    }
}

/// Blocking-invoke completion cell: (done, result) + condvar.
struct Completion<R> {
    state: Mutex<(bool, Option<R>)>,
    cv: Condvar,
}

/// Single-thread work queue with begin/end-invoke and periodic timers.
///
/// # Ordering
/// `begin_invoke`d closures run FIFO on the dedicated worker. Timer firings
/// interleave between jobs on the same thread, so timers and jobs never run
/// concurrently either.
///
/// # Failure semantics
/// Work enqueued after [`Dispatcher::dispose`] is rejected silently. A job
/// that panics is caught and counted; it never poisons the queue.
///
/// # Example
/// ```rust
/// use rowbus::Dispatcher;
///
/// let dispatcher = Dispatcher::new("worker");
/// dispatcher.begin_invoke(|| println!("ran on the worker"));
/// let answer = dispatcher.invoke(|| 42);
/// assert_eq!(answer, Some(42));
/// ```
pub struct Dispatcher {
    shared: Arc<Shared>,
    tx: Sender<Job>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Create a dispatcher with a dedicated worker thread.
    pub fn new(name: &str) -> Self {
        let (tx, rx) = unbounded();
        let shared = Arc::new(Shared {
            name: name.to_string(),
            disposed: AtomicBool::new(false),
            worker_id: Mutex::new(None),
            timers: Mutex::new(TimerTable::new()),
            pending: AtomicUsize::new(0),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        });

        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(format!("rowbus-{name}"))
            .spawn(move || worker_loop(&worker_shared, &rx))
            .expect("failed to spawn dispatcher worker");

        Self {
            shared,
            tx,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Dispatcher name (also the worker thread name suffix).
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Enqueue `f` and return immediately. Returns `false` (and drops `f`)
    /// once the dispatcher is disposed.
    pub fn begin_invoke(&self, f: impl FnOnce() + Send + 'static) -> bool {
        if self.shared.disposed.load(Ordering::Acquire) {
            log::debug!("[Dispatcher::begin_invoke] '{}' rejected: disposed", self.shared.name);
            return false;
        }
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if self.tx.send(Job::Run(Box::new(f))).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// Enqueue `f` and block until it completes, returning its result.
    ///
    /// Called from the dispatcher's own worker, `f` executes inline instead
    /// of deadlocking. Returns `None` if the dispatcher is disposed or the
    /// job panicked.
    pub fn invoke<R: Send + 'static>(&self, f: impl FnOnce() -> R + Send + 'static) -> Option<R> {
        if self.shared.disposed.load(Ordering::Acquire) {
            return None;
        }
        if self.shared.is_worker_thread() {
            return Some(f());
        }

        // Signals completion when dropped, so the caller wakes (with `None`)
        // even if `f` panics or the queued job is discarded by a concurrent
        // dispose before it ever runs.
        struct Finish<R>(Arc<Completion<R>>);
        impl<R> Drop for Finish<R> {
            fn drop(&mut self) {
                let mut state = self.0.state.lock();
                state.0 = true;
                self.0.cv.notify_all();
            }
        }

        let cell = Arc::new(Completion::<R> {
            state: Mutex::new((false, None)),
            cv: Condvar::new(),
        });
        let finish = Finish(cell.clone());
        let accepted = self.begin_invoke(move || {
            let result = f();
            finish.0.state.lock().1 = Some(result);
            // `finish` drops here, waking the caller.
        });
        if !accepted {
            return None;
        }

        let mut state = cell.state.lock();
        while !state.0 {
            cell.cv.wait(&mut state);
        }
        state.1.take()
    }

    /// Block until all work enqueued before this call has completed.
    ///
    /// From the worker thread itself this is a no-op (everything enqueued
    /// before the currently running job has already completed).
    pub fn sync(&self) {
        if self.shared.disposed.load(Ordering::Acquire) || self.shared.is_worker_thread() {
            return;
        }
        let _ = self.invoke(|| {});
    }

    /// Schedule `callback` every `interval` on this dispatcher's worker.
    ///
    /// `repeat_count == 0` means fire until unregistered. Returns
    /// [`TimerToken::UNDEFINED`] once disposed.
    pub fn register_timer(
        &self,
        interval: Duration,
        callback: impl Fn() + Send + Sync + 'static,
        repeat_count: u32,
    ) -> TimerToken {
        if self.shared.disposed.load(Ordering::Acquire) {
            return TimerToken::UNDEFINED;
        }
        let token = self
            .shared
            .timers
            .lock()
            .register(interval, Arc::new(callback), repeat_count);
        // Nudge the worker so it recomputes its sleep deadline.
        self.begin_invoke(|| {});
        token
    }

    /// Cancel a timer. After this returns, no further firing of the timer
    /// can be observed: an in-flight firing on the worker is waited out.
    pub fn unregister_timer(&self, token: TimerToken) -> bool {
        let found = self.shared.timers.lock().cancel(token);
        if found && !self.shared.is_worker_thread() && !self.shared.disposed.load(Ordering::Acquire)
        {
            // Timer callbacks run between jobs on the worker, so one queue
            // barrier is enough to order out any in-flight firing.
            self.sync();
        }
        found
    }

    /// Stop the worker and timers, then reject all further work. Idempotent;
    /// implied by `Drop`.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.timers.lock().clear();
        let _ = self.tx.send(Job::Shutdown);
        if !self.shared.is_worker_thread() {
            if let Some(handle) = self.worker.lock().take() {
                let _ = handle.join();
            }
        }
        log::debug!("[Dispatcher::dispose] '{}' stopped", self.shared.name);
    }

    /// Jobs enqueued but not yet executed.
    pub fn pending_jobs(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Jobs executed since construction (including panicked ones).
    pub fn executed_jobs(&self) -> u64 {
        self.shared.executed.load(Ordering::Acquire)
    }

    /// Jobs that panicked and were swallowed.
    pub fn panicked_jobs(&self) -> u64 {
        self.shared.panicked.load(Ordering::Acquire)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn worker_loop(shared: &Arc<Shared>, rx: &Receiver<Job>) {
    *shared.worker_id.lock() = Some(thread::current().id());

    loop {
        let deadline = shared.timers.lock().next_deadline();
        let job = match deadline {
            Some(due) => match rx.recv_deadline(due) {
                Ok(job) => Some(job),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(job) => Some(job),
                Err(_) => break,
            },
        };

        match job {
            Some(Job::Run(f)) => {
                shared.pending.fetch_sub(1, Ordering::AcqRel);
                run_guarded(shared, f);
            }
            Some(Job::Shutdown) => break,
            None => {}
        }

        fire_due_timers(shared);
    }
}

fn run_guarded(shared: &Shared, f: Box<dyn FnOnce() + Send>) {
    shared.executed.fetch_add(1, Ordering::AcqRel);
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        shared.panicked.fetch_add(1, Ordering::AcqRel);
        log::error!("[Dispatcher] '{}' job panicked (swallowed)", shared.name);
    }
}

fn fire_due_timers(shared: &Shared) {
    let due = shared.timers.lock().take_due(Instant::now());
    for callback in due {
        if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            shared.panicked.fetch_add(1, Ordering::AcqRel);
            log::error!("[Dispatcher] '{}' timer callback panicked (swallowed)", shared.name);
        }
    }
}
