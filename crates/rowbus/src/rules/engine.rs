// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Rule engine: rule set, gating tables, and the XML loader.

use super::evaluator::evaluate;
use super::parser::{parse, Expr};
use super::{RuleContext, RuleError, RuleFn};
use crate::core::Guarded;
use crate::meta::{MetaStore, Value};
use crate::model::{Dataset, Error, Key, Result, Row, RowInfo, RowKind, RowSpec, Table};
use std::collections::HashMap;
use std::sync::Arc;

/// Table holding one `u8` existence row per rule (1 = loaded).
pub const RULE_EXISTS_TABLE: &str = "rule_exists";
/// Table holding one `u8` enable row per rule (non-zero = enabled).
pub const RULE_ENABLED_TABLE: &str = "rule_enabled";

/// One named rule.
pub struct Rule {
    pub name: String,
    /// Optional gate condition; a zero result skips the action.
    pub when: Option<Expr>,
    /// Action expression; its result is written to the target.
    pub expr: Expr,
    /// Target row name, resolved through the context at evaluation time.
    pub target_row: String,
    /// Target field path; `None` requires single-field row metadata.
    pub target_field: Option<String>,
}

/// Default [`RuleContext`] over a dataset and a metadata store.
///
/// - Rows resolve as `"table.row"` (two dotted segments; numeric segments
///   try `Key::Id` first).
/// - Enum symbols resolve as `"EnumName.SYMBOL"` against the store.
/// - Functions come from [`register_fn`](DatasetContext::register_fn).
pub struct DatasetContext {
    dataset: Arc<Dataset>,
    store: Arc<MetaStore>,
    funcs: Guarded<HashMap<String, RuleFn>>,
}

impl DatasetContext {
    pub fn new(dataset: Arc<Dataset>, store: Arc<MetaStore>) -> Arc<Self> {
        Arc::new(Self {
            dataset,
            store,
            funcs: Guarded::new(HashMap::new()),
        })
    }

    /// Register a named `f64` callback (overwrites an existing name).
    pub fn register_fn(&self, name: &str, function: impl Fn() -> f64 + Send + Sync + 'static) {
        self.funcs
            .with(|funcs| funcs.insert(name.to_string(), Arc::new(function)));
    }

    fn segment_key(segment: &str) -> Key {
        match segment.parse::<u32>() {
            Ok(id) => Key::Id(id),
            Err(_) => Key::Name(segment.to_string()),
        }
    }
}

impl RuleContext for DatasetContext {
    fn lookup_row(&self, name: &str) -> Option<Arc<Row>> {
        let mut parts = name.split('.');
        let table = parts.next()?;
        let row = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        self.dataset
            .row(&Self::segment_key(table), &Self::segment_key(row))
    }

    fn lookup_enum(&self, name: &str) -> Option<i64> {
        let (enum_name, symbol) = name.split_once('.')?;
        self.store.get_enum(enum_name)?.value(symbol)
    }

    fn lookup_fn(&self, name: &str) -> Option<RuleFn> {
        self.funcs.with(|funcs| funcs.get(name).cloned())
    }
}

/// XML-driven rule evaluator.
///
/// Rule existence and enablement live in two ordinary tables of the target
/// dataset ([`RULE_EXISTS_TABLE`], [`RULE_ENABLED_TABLE`]), one `u8` row
/// per rule; toggling is a plain row write.
pub struct RuleEngine {
    dataset: Arc<Dataset>,
    ctx: Arc<dyn RuleContext>,
    rules: Guarded<Vec<Rule>>,
    exists: Arc<Table>,
    enabled: Arc<Table>,
}

impl RuleEngine {
    /// Create the engine, materializing the gating tables in `dataset` if
    /// they do not exist yet.
    pub fn new(dataset: Arc<Dataset>, ctx: Arc<dyn RuleContext>) -> Result<Self> {
        let exists = Self::gating_table(&dataset, RULE_EXISTS_TABLE)?;
        let enabled = Self::gating_table(&dataset, RULE_ENABLED_TABLE)?;
        Ok(Self {
            dataset,
            ctx,
            rules: Guarded::new(Vec::new()),
            exists,
            enabled,
        })
    }

    fn gating_table(dataset: &Arc<Dataset>, name: &str) -> Result<Arc<Table>> {
        let key = Key::Name(name.to_string());
        if let Some(table) = dataset.table(&key) {
            return Ok(table);
        }
        dataset.create_table(key, name, "rule gating rows")
    }

    fn gating_row(table: &Arc<Table>, rule: &str, initial: u8) -> Result<Arc<Row>> {
        let key = Key::Name(rule.to_string());
        if let Some(row) = table.row(&key) {
            row.write(&[initial], false, row.write_priority());
            return Ok(row);
        }
        table.create_row(
            RowSpec::new(key)
                .fixed_size(1)
                .initial(vec![initial])
                .info(RowInfo {
                    kind: RowKind::Bytes,
                    name: rule.to_string(),
                    description: String::new(),
                }),
        )
    }

    fn gate_value(table: &Arc<Table>, rule: &str) -> bool {
        let mut byte = [0u8; 1];
        table
            .row(&Key::Name(rule.to_string()))
            .is_some_and(|row| row.read_bytes(&mut byte) == 1 && byte[0] != 0)
    }

    /// Add one rule. Fails on a duplicate name; creates/refreshes the
    /// gating rows.
    pub fn add_rule(&self, rule: Rule, enabled: bool) -> Result<()> {
        let duplicate = self
            .rules
            .with(|rules| rules.iter().any(|r| r.name == rule.name));
        if duplicate {
            return Err(Error::DuplicateKey(Key::Name(rule.name)));
        }
        Self::gating_row(&self.exists, &rule.name, 1)?;
        Self::gating_row(&self.enabled, &rule.name, u8::from(enabled))?;
        self.rules.with(|rules| rules.push(rule));
        Ok(())
    }

    /// Loaded rule names.
    pub fn rule_names(&self) -> Vec<String> {
        self.rules
            .with(|rules| rules.iter().map(|r| r.name.clone()).collect())
    }

    /// Toggle a rule by writing its enable row (an ordinary row write, so
    /// subscribers on the gating table see it). Unknown rules report
    /// `false`.
    pub fn set_enabled(&self, name: &str, on: bool) -> bool {
        match self.enabled.row(&Key::Name(name.to_string())) {
            Some(row) => row.write(&[u8::from(on)], false, row.write_priority()),
            None => false,
        }
    }

    /// Current enable state (missing row = disabled).
    pub fn is_enabled(&self, name: &str) -> bool {
        Self::gate_value(&self.enabled, name)
    }

    /// Evaluate one rule: enable gate, optional `when` gate, action
    /// expression, write-back. Returns the action value, or `None` when the
    /// `when` gate evaluated to zero.
    pub fn evaluate(&self, name: &str) -> core::result::Result<Option<f64>, RuleError> {
        if !self.is_enabled(name) {
            return Err(RuleError::Disabled(name.to_string()));
        }

        // Evaluate against a snapshot of the rule definition; row lookups
        // inside stay live through the context.
        let (when, expr, target_row, target_field) = self.rules.with(|rules| {
            rules.iter().find(|r| r.name == name).map(|r| {
                (
                    r.when.clone(),
                    r.expr.clone(),
                    r.target_row.clone(),
                    r.target_field.clone(),
                )
            })
        })
        .ok_or_else(|| RuleError::UnknownRule(name.to_string()))?;

        if let Some(when) = when {
            if evaluate(&when, self.ctx.as_ref())? == 0.0 {
                return Ok(None);
            }
        }

        let value = evaluate(&expr, self.ctx.as_ref())?;
        self.write_target(&target_row, target_field.as_deref(), value)?;
        Ok(Some(value))
    }

    /// Evaluate every loaded rule; disabled and `when`-gated rules are
    /// skipped. Returns the number of rules that wrote their target.
    pub fn evaluate_all(&self) -> usize {
        let mut written = 0;
        for name in self.rule_names() {
            match self.evaluate(&name) {
                Ok(Some(_)) => written += 1,
                Ok(None) => {}
                Err(RuleError::Disabled(_)) => {}
                Err(e) => log::warn!("[RuleEngine::evaluate_all] '{}' failed: {}", name, e),
            }
        }
        written
    }

    fn write_target(
        &self,
        target_row: &str,
        target_field: Option<&str>,
        value: f64,
    ) -> core::result::Result<(), RuleError> {
        let row = self
            .ctx
            .lookup_row(target_row)
            .ok_or_else(|| RuleError::RowAccess(format!("{target_row}: no such row")))?;

        let field = match target_field {
            Some(field) => field.to_string(),
            None => {
                let meta = row.meta().ok_or_else(|| {
                    RuleError::RowAccess(format!("{target_row}: row has no metadata"))
                })?;
                if meta.fields().len() != 1 {
                    return Err(RuleError::RowAccess(format!(
                        "{target_row}: target needs an explicit field"
                    )));
                }
                meta.fields()[0].name.clone()
            }
        };
        row.write_field(&field, &Value::F64(value))
            .map_err(|e| RuleError::RowAccess(format!("{target_row}.{field}: {e}")))
    }

    /// Parse rule definitions from XML and add them.
    ///
    /// ```xml
    /// <rules>
    ///   <rule name="overtemp" enabled="true">
    ///     <when>sensors.engine.temp > 90</when>
    ///     <set row="alarms.engine" field="active">1</set>
    ///   </rule>
    /// </rules>
    /// ```
    ///
    /// Returns the number of rules loaded. Loader failures never panic and
    /// leave already-added rules in place.
    #[cfg(feature = "rules")]
    pub fn load_xml(&self, xml: &str) -> core::result::Result<usize, String> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| format!("XML parse error: {e}"))?;
        let root = doc.root_element();
        if root.tag_name().name() != "rules" {
            return Err("expected <rules> root element".to_string());
        }

        let mut loaded = 0;
        for node in root.children().filter(|n| n.is_element()) {
            if node.tag_name().name() != "rule" {
                continue;
            }
            let name = node
                .attribute("name")
                .ok_or("rule without 'name' attribute")?;
            let enabled = node
                .attribute("enabled")
                .map_or(true, |v| v.eq_ignore_ascii_case("true") || v == "1");

            let when = node
                .children()
                .find(|n| n.tag_name().name() == "when")
                .and_then(|n| n.text())
                .map(|text| parse(text).map_err(|e| format!("{name}/when: {e}")))
                .transpose()?;

            let set = node
                .children()
                .find(|n| n.tag_name().name() == "set")
                .ok_or_else(|| format!("{name}: missing <set>"))?;
            let target_row = set
                .attribute("row")
                .ok_or_else(|| format!("{name}: <set> without 'row'"))?;
            let expr_text = set.text().ok_or_else(|| format!("{name}: empty <set>"))?;
            let expr = parse(expr_text).map_err(|e| format!("{name}/set: {e}"))?;

            self.add_rule(
                Rule {
                    name: name.to_string(),
                    when,
                    expr,
                    target_row: target_row.to_string(),
                    target_field: set.attribute("field").map(str::to_string),
                },
                enabled,
            )
            .map_err(|e| format!("{name}: {e}"))?;
            loaded += 1;
        }
        log::info!("[RuleEngine::load_xml] loaded {} rule(s)", loaded);
        Ok(loaded)
    }

    /// Replace the rule set from new XML: existing existence rows drop to
    /// zero, the rule list clears, then the new definitions load.
    #[cfg(feature = "rules")]
    pub fn reload(&self, xml: &str) -> core::result::Result<usize, String> {
        for row in self.exists.rows() {
            row.write(&[0], false, row.write_priority());
        }
        self.rules.with(|rules| rules.clear());
        self.load_xml(xml)
    }

    /// The dataset this engine gates through.
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }
}
