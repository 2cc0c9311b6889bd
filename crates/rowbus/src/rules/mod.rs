// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Rule Engine
//!
//! Named numeric rules evaluated against the data model. A rule is an
//! expression over row fields, enum symbols, and registered functions; its
//! result is written back into a target row through the normal write path,
//! so every downstream subscriber sees rule outputs like any other write.
//!
//! ## Bindings
//!
//! Rules see the world only through [`RuleContext`]:
//!
//! - `lookup_row(name)` - row lookup by string name
//! - `lookup_enum(name)` - enumeration value lookup by name
//! - `lookup_fn(name)` - named `f64`-returning callbacks
//!
//! Lookups happen **at evaluation time** - there is no caching that could
//! return a stale row after a table structure change.
//!
//! ## Gating
//!
//! Rule existence and enablement are themselves ordinary rows (one `u8` row
//! per rule in the `rule_exists` / `rule_enabled` tables), so toggling a
//! rule is just a row write and reuses the subscription machinery verbatim
//! instead of introducing a second notification mechanism.
//!
//! ## Expressions
//!
//! ```text
//! sensors.engine.temp > limits.engine.max_temp AND NOT overrides.engine.manual
//! (pressure.tank.raw - 512) * 0.25 + offset()
//! ```
//!
//! Arithmetic (`+ - * /`), comparisons (`> < >= <= == !=`), logic
//! (`AND OR NOT`, case-insensitive), parentheses, numeric literals, dotted
//! row-field references (array indices as `name[i]`), and zero-argument
//! function calls. Comparisons and logic evaluate to `1.0` / `0.0`.

mod engine;
mod evaluator;
mod parser;

pub use engine::{DatasetContext, Rule, RuleEngine};
pub use evaluator::evaluate;
pub use parser::{parse, BinOp, Expr, UnaryOp};

use crate::model::Row;
use std::fmt;
use std::sync::Arc;

/// Named `f64`-returning callback exposed to rules.
pub type RuleFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Lookup surface a rule evaluation runs against.
///
/// Implementations must not cache row handles across calls; the engine
/// relies on resolution happening per evaluation.
pub trait RuleContext: Send + Sync {
    /// Row by string name (e.g. `"sensors.engine"`), or `None`.
    fn lookup_row(&self, name: &str) -> Option<Arc<Row>>;

    /// Enumeration value by name (e.g. `"Gear.DRIVE"`), or `None`.
    fn lookup_enum(&self, name: &str) -> Option<i64>;

    /// Named function by name, or `None`.
    fn lookup_fn(&self, name: &str) -> Option<RuleFn>;
}

/// Errors raised by rule parsing and evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleError {
    /// Expression text failed to parse.
    Parse(String),
    /// Reference resolved to neither an enum symbol nor a row field.
    UnknownReference(String),
    /// Function name not registered.
    UnknownFunction(String),
    /// Row resolved but the field access failed.
    RowAccess(String),
    /// Rule exists but its enabled row is zero.
    Disabled(String),
    /// No rule under this name.
    UnknownRule(String),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleError::Parse(msg) => write!(f, "Parse error: {}", msg),
            RuleError::UnknownReference(name) => write!(f, "Unknown reference: {}", name),
            RuleError::UnknownFunction(name) => write!(f, "Unknown function: {}", name),
            RuleError::RowAccess(msg) => write!(f, "Row access failed: {}", msg),
            RuleError::Disabled(name) => write!(f, "Rule disabled: {}", name),
            RuleError::UnknownRule(name) => write!(f, "Unknown rule: {}", name),
        }
    }
}

impl std::error::Error for RuleError {}
