// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime primitives shared by every stateful component.
//!
//! - [`Guarded`] - a mutex-wrapped value with scoped access and an explicit
//!   RAII lock token
//! - [`Signal`] - token-based multi-subscriber callback fan-out, safe against
//!   re-entrant subscribe/unsubscribe from inside a callback
//!
//! Ownership throughout the crate is plain `Arc`/`Weak`: atomic reference
//! counts, synchronous destruction on the releasing thread when the last
//! strong reference drops, and weak back-references up the entity hierarchy
//! so the ownership graph stays acyclic.

mod guarded;
mod signal;

pub use guarded::{Guarded, GuardedLock};
pub use signal::{Observer, Signal, SubToken};
