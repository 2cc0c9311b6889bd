// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::shadow_unrelated)] // Test scoping

//! Rule engine integration tests: XML loading, row-gated enablement,
//! reload, and write-back through the data model.

use rowbus::meta::{load_enum, load_struct};
use rowbus::rules::{DatasetContext, RuleEngine};
use rowbus::{Dataset, Key, MetaStore, RowSpec, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const RULES_XML: &str = r#"
<rules>
  <rule name="overtemp" enabled="true">
    <when>sensors.engine.temp > limits.engine.max_temp</when>
    <set row="alarms.engine" field="active">1</set>
  </rule>
  <rule name="fan_speed" enabled="true">
    <set row="outputs.fan" field="pwm">(sensors.engine.temp - 60) * 4</set>
  </rule>
  <rule name="parked" enabled="false">
    <set row="alarms.engine" field="active">0</set>
  </rule>
</rules>
"#;

fn build_world() -> (Arc<Dataset>, Arc<MetaStore>) {
    let store = Arc::new(MetaStore::new());
    load_enum(&store, "Gear", r#"{ "PARK": 0, "DRIVE": 3 }"#).unwrap();
    load_struct(&store, "EngineState", r#"{ "temp": { "t": "f32" }, "gear": { "t": "Gear" } }"#)
        .unwrap();
    load_struct(&store, "Limits", r#"{ "max_temp": { "t": "f32", "def": "90" } }"#).unwrap();
    load_struct(&store, "Alarm", r#"{ "active": { "t": "u8" } }"#).unwrap();
    load_struct(&store, "Fan", r#"{ "pwm": { "t": "u16" } }"#).unwrap();

    let dataset = Dataset::new("vehicle");
    let sensors = dataset.create_table(Key::from("sensors"), "sensors", "").unwrap();
    sensors
        .create_row(RowSpec::new(Key::from("engine")).with_meta(store.get_struct("EngineState").unwrap()))
        .unwrap();
    let limits = dataset.create_table(Key::from("limits"), "limits", "").unwrap();
    limits
        .create_row(RowSpec::new(Key::from("engine")).with_meta(store.get_struct("Limits").unwrap()))
        .unwrap();
    let alarms = dataset.create_table(Key::from("alarms"), "alarms", "").unwrap();
    alarms
        .create_row(RowSpec::new(Key::from("engine")).with_meta(store.get_struct("Alarm").unwrap()))
        .unwrap();
    let outputs = dataset.create_table(Key::from("outputs"), "outputs", "").unwrap();
    outputs
        .create_row(RowSpec::new(Key::from("fan")).with_meta(store.get_struct("Fan").unwrap()))
        .unwrap();

    (dataset, store)
}

#[test]
fn test_load_and_evaluate_rules() {
    let (dataset, store) = build_world();
    let ctx = DatasetContext::new(dataset.clone(), store);
    let engine = RuleEngine::new(dataset.clone(), ctx).unwrap();
    assert_eq!(engine.load_xml(RULES_XML).unwrap(), 3);

    // Existence and enablement materialized as ordinary rows.
    assert!(dataset
        .row(&Key::from("rule_exists"), &Key::from("overtemp"))
        .is_some());
    assert!(engine.is_enabled("overtemp"));
    assert!(!engine.is_enabled("parked"));

    // Cool engine: the when-gate holds the alarm rule back.
    let sensor = dataset.row(&Key::from("sensors"), &Key::from("engine")).unwrap();
    sensor.write_field("temp", &Value::F64(70.0)).unwrap();
    assert_eq!(engine.evaluate("overtemp").unwrap(), None);

    // fan_speed always writes: (70 - 60) * 4 = 40.
    assert_eq!(engine.evaluate("fan_speed").unwrap(), Some(40.0));
    let fan = dataset.row(&Key::from("outputs"), &Key::from("fan")).unwrap();
    assert_eq!(fan.read_field("pwm").unwrap(), Value::U64(40));

    // Hot engine: alarm fires through the row write path.
    sensor.write_field("temp", &Value::F64(95.0)).unwrap();
    assert_eq!(engine.evaluate("overtemp").unwrap(), Some(1.0));
    let alarm = dataset.row(&Key::from("alarms"), &Key::from("engine")).unwrap();
    assert_eq!(alarm.read_field("active").unwrap(), Value::U64(1));
}

#[test]
fn test_rule_output_notifies_row_subscribers() {
    let (dataset, store) = build_world();
    let ctx = DatasetContext::new(dataset.clone(), store);
    let engine = RuleEngine::new(dataset.clone(), ctx).unwrap();
    engine.load_xml(RULES_XML).unwrap();

    let fan = dataset.row(&Key::from("outputs"), &Key::from("fan")).unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let sub_hits = hits.clone();
    fan.subscribe(move |_| {
        sub_hits.fetch_add(1, Ordering::Relaxed);
    });

    let sensor = dataset.row(&Key::from("sensors"), &Key::from("engine")).unwrap();
    sensor.write_field("temp", &Value::F64(80.0)).unwrap();
    engine.evaluate("fan_speed").unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 1);

    // Unchanged output value: the write path's change detection holds.
    engine.evaluate("fan_speed").unwrap();
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_enable_toggle_is_a_row_write() {
    let (dataset, store) = build_world();
    let ctx = DatasetContext::new(dataset.clone(), store);
    let engine = RuleEngine::new(dataset.clone(), ctx).unwrap();
    engine.load_xml(RULES_XML).unwrap();

    let enable_row = dataset
        .row(&Key::from("rule_enabled"), &Key::from("fan_speed"))
        .unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let sub_hits = hits.clone();
    enable_row.subscribe(move |_| {
        sub_hits.fetch_add(1, Ordering::Relaxed);
    });

    assert!(engine.set_enabled("fan_speed", false));
    assert_eq!(hits.load(Ordering::Relaxed), 1);
    assert!(matches!(
        engine.evaluate("fan_speed"),
        Err(rowbus::RuleError::Disabled(_))
    ));

    // Writing the gating row directly works too - it is just a row.
    enable_row.write(&[1], false, 0);
    assert!(engine.is_enabled("fan_speed"));
    let sensor = dataset.row(&Key::from("sensors"), &Key::from("engine")).unwrap();
    sensor.write_field("temp", &Value::F64(80.0)).unwrap();
    assert_eq!(engine.evaluate("fan_speed").unwrap(), Some(80.0));
}

#[test]
fn test_evaluate_all_skips_disabled_and_gated() {
    let (dataset, store) = build_world();
    let ctx = DatasetContext::new(dataset.clone(), store);
    let engine = RuleEngine::new(dataset.clone(), ctx).unwrap();
    engine.load_xml(RULES_XML).unwrap();

    let sensor = dataset.row(&Key::from("sensors"), &Key::from("engine")).unwrap();
    sensor.write_field("temp", &Value::F64(70.0)).unwrap();

    // overtemp gated off, parked disabled: only fan_speed writes.
    assert_eq!(engine.evaluate_all(), 1);
}

#[test]
fn test_functions_and_enum_symbols() {
    let (dataset, store) = build_world();
    let ctx = DatasetContext::new(dataset.clone(), store);
    ctx.register_fn("ambient", || 21.5);
    let engine = RuleEngine::new(dataset.clone(), ctx).unwrap();

    engine
        .load_xml(
            r#"<rules>
                 <rule name="drive_check">
                   <set row="outputs.fan" field="pwm">(sensors.engine.gear == Gear.DRIVE) * 100 + ambient()</set>
                 </rule>
               </rules>"#,
        )
        .unwrap();

    let sensor = dataset.row(&Key::from("sensors"), &Key::from("engine")).unwrap();
    sensor.write_field("gear", &Value::I64(3)).unwrap(); // DRIVE
    assert_eq!(engine.evaluate("drive_check").unwrap(), Some(121.5));
}

#[test]
fn test_reload_reconciles_existence_rows() {
    let (dataset, store) = build_world();
    let ctx = DatasetContext::new(dataset.clone(), store);
    let engine = RuleEngine::new(dataset.clone(), ctx).unwrap();
    engine.load_xml(RULES_XML).unwrap();
    assert_eq!(engine.rule_names().len(), 3);

    let replacement = r#"
        <rules>
          <rule name="fan_speed">
            <set row="outputs.fan" field="pwm">10</set>
          </rule>
        </rules>
    "#;
    assert_eq!(engine.reload(replacement).unwrap(), 1);
    assert_eq!(engine.rule_names(), vec!["fan_speed".to_string()]);

    // Dropped rules keep their existence row, zeroed.
    let overtemp_exists = dataset
        .row(&Key::from("rule_exists"), &Key::from("overtemp"))
        .unwrap();
    assert_eq!(overtemp_exists.to_vec(), vec![0]);
    let fan_exists = dataset
        .row(&Key::from("rule_exists"), &Key::from("fan_speed"))
        .unwrap();
    assert_eq!(fan_exists.to_vec(), vec![1]);

    assert!(matches!(
        engine.evaluate("overtemp"),
        Err(rowbus::RuleError::Disabled(_)) | Err(rowbus::RuleError::UnknownRule(_))
    ));
}

#[test]
fn test_bad_xml_reports_error() {
    let (dataset, store) = build_world();
    let ctx = DatasetContext::new(dataset.clone(), store);
    let engine = RuleEngine::new(dataset, ctx).unwrap();

    assert!(engine.load_xml("<not-rules/>").is_err());
    assert!(engine
        .load_xml(r#"<rules><rule><set row="a.b">1</set></rule></rules>"#)
        .is_err());
    assert!(engine
        .load_xml(r#"<rules><rule name="x"><set row="a.b">1 +</set></rule></rules>"#)
        .is_err());
}
