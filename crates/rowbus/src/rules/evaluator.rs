// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rule Expression Evaluator
//!
//! Walks an [`Expr`] AST against a [`RuleContext`]. All lookups happen at
//! evaluation time; nothing is cached between calls.

use super::parser::{BinOp, Expr, UnaryOp};
use super::{RuleContext, RuleError};

fn truthy(v: f64) -> bool {
    v != 0.0
}

fn bool_val(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Resolve a dotted reference: enum symbol first, then the longest row-name
/// prefix with the remainder as a field path.
///
/// `"sensors.engine.temp"` tries the enum symbol, then rows
/// `"sensors.engine.temp"`, `"sensors.engine"` (field `"temp"`), then
/// `"sensors"` (field `"engine.temp"`). A row without a field path must
/// carry single-field metadata.
fn resolve_ref(ctx: &dyn RuleContext, name: &str) -> Result<f64, RuleError> {
    if let Some(value) = ctx.lookup_enum(name) {
        return Ok(value as f64);
    }

    let parts: Vec<&str> = name.split('.').collect();
    for split in (1..=parts.len()).rev() {
        let row_name = parts[..split].join(".");
        let Some(row) = ctx.lookup_row(&row_name) else {
            continue;
        };
        let field = parts[split..].join(".");
        let value = if field.is_empty() {
            // Bare row reference: only meaningful for single-field layouts.
            let meta = row
                .meta()
                .ok_or_else(|| RuleError::RowAccess(format!("{name}: row has no metadata")))?;
            if meta.fields().len() != 1 {
                return Err(RuleError::RowAccess(format!(
                    "{name}: bare reference needs a single-field layout"
                )));
            }
            let field_name = meta.fields()[0].name.clone();
            row.read_field(&field_name)
        } else {
            row.read_field(&field)
        };
        return value
            .map_err(|e| RuleError::RowAccess(format!("{name}: {e}")))?
            .as_f64()
            .ok_or_else(|| RuleError::RowAccess(format!("{name}: not numeric")));
    }
    Err(RuleError::UnknownReference(name.to_string()))
}

/// Evaluate `expr` against `ctx`, yielding a double. Comparisons and logic
/// produce `1.0` / `0.0`; division follows IEEE semantics.
pub fn evaluate(expr: &Expr, ctx: &dyn RuleContext) -> Result<f64, RuleError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Ref(name) => resolve_ref(ctx, name),
        Expr::Call(name) => {
            let function = ctx
                .lookup_fn(name)
                .ok_or_else(|| RuleError::UnknownFunction(name.clone()))?;
            Ok(function())
        }
        Expr::Unary(op, operand) => {
            let v = evaluate(operand, ctx)?;
            Ok(match op {
                UnaryOp::Neg => -v,
                UnaryOp::Not => bool_val(!truthy(v)),
            })
        }
        Expr::Binary(op, left, right) => {
            // Short-circuit the logical operators.
            match op {
                BinOp::And => {
                    let l = evaluate(left, ctx)?;
                    if !truthy(l) {
                        return Ok(0.0);
                    }
                    return Ok(bool_val(truthy(evaluate(right, ctx)?)));
                }
                BinOp::Or => {
                    let l = evaluate(left, ctx)?;
                    if truthy(l) {
                        return Ok(1.0);
                    }
                    return Ok(bool_val(truthy(evaluate(right, ctx)?)));
                }
                _ => {}
            }

            let l = evaluate(left, ctx)?;
            let r = evaluate(right, ctx)?;
            Ok(match op {
                BinOp::Add => l + r,
                BinOp::Sub => l - r,
                BinOp::Mul => l * r,
                BinOp::Div => l / r,
                BinOp::Gt => bool_val(l > r),
                BinOp::Lt => bool_val(l < r),
                BinOp::Ge => bool_val(l >= r),
                BinOp::Le => bool_val(l <= r),
                BinOp::Eq => bool_val(l == r),
                BinOp::Ne => bool_val(l != r),
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            })
        }
    }
}
