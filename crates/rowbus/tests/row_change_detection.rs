// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::shadow_unrelated)] // Test scoping

//! Change detection and buffer growth integration tests

use rowbus::{Dataset, Key, RowInfo, RowKind, RowSpec, Table};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

fn table() -> (Arc<Dataset>, Arc<Table>) {
    let dataset = Dataset::new("detect");
    let table = dataset.create_table(Key::from("t"), "t", "").unwrap();
    (dataset, table)
}

fn counted_subscriber(row: &Arc<rowbus::Row>) -> Arc<AtomicU32> {
    let hits = Arc::new(AtomicU32::new(0));
    let sub_hits = hits.clone();
    row.subscribe(move |_| {
        sub_hits.fetch_add(1, Ordering::Relaxed);
    });
    hits
}

#[test]
fn test_identical_bytes_fire_no_notification() {
    let (_dataset, table) = table();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();
    let hits = counted_subscriber(&row);

    assert!(row.write(&[5, 6], false, 0));
    assert!(row.write(&[5, 6], false, 0));
    assert!(row.write(&[5, 6], false, 0));
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_force_report_always_fires() {
    let (_dataset, table) = table();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();
    let hits = counted_subscriber(&row);

    assert!(row.write(&[5, 6], false, 0));
    assert!(row.write(&[5, 6], true, 0));
    assert!(row.write(&[5, 6], true, 0));
    assert_eq!(hits.load(Ordering::Relaxed), 3);
}

#[test]
fn test_size_change_is_a_change() {
    let (_dataset, table) = table();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();
    let hits = counted_subscriber(&row);

    assert!(row.write(&[5, 6], false, 0));
    assert!(row.write(&[5], false, 0)); // same prefix, shorter
    assert_eq!(hits.load(Ordering::Relaxed), 2);
}

#[test]
fn test_empty_kind_row_pulses_every_write() {
    let (_dataset, table) = table();
    let row = table
        .create_row(RowSpec::new(Key::from("pulse")).info(RowInfo {
            kind: RowKind::Empty,
            name: "pulse".into(),
            description: String::new(),
        }))
        .unwrap();
    let hits = counted_subscriber(&row);

    for _ in 0..4 {
        assert!(row.write(&[], false, 0));
    }
    assert_eq!(hits.load(Ordering::Relaxed), 4);
}

#[test]
fn test_unbounded_growth_high_water() {
    let (_dataset, table) = table();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();

    // Grow: N then M > N bytes; read returns the full M bytes.
    let n: Vec<u8> = (0..10).collect();
    let m: Vec<u8> = (0..100).collect();
    assert!(row.write(&n, false, 0));
    assert!(row.write(&m, false, 0));
    assert_eq!(row.size(), 100);
    assert_eq!(row.to_vec(), m);

    // Shrink to K < M: exactly the last-written K bytes come back, no
    // stale tail beyond K.
    let k = vec![7u8; 30];
    assert!(row.write(&k, false, 0));
    assert_eq!(row.size(), 30);
    assert_eq!(row.to_vec(), k);

    let mut out = vec![0u8; 30];
    assert_eq!(row.read_bytes(&mut out), 30);
    assert_eq!(out, k);

    // A larger destination still only receives the logical size.
    let mut big = vec![0xAAu8; 64];
    assert_eq!(row.read_bytes(&mut big), 30);
    assert_eq!(&big[..30], k.as_slice());
    assert!(big[30..].iter().all(|&b| b == 0xAA));
}

#[test]
fn test_fixed_row_rejects_oversized_write() {
    let (_dataset, table) = table();
    let row = table
        .create_row(RowSpec::new(Key::from("r")).fixed_size(4))
        .unwrap();
    let hits = counted_subscriber(&row);

    assert!(row.write(&[1, 2, 3, 4], false, 0));
    assert!(!row.write(&[1, 2, 3, 4, 5], false, 0));
    assert_eq!(row.to_vec(), vec![1, 2, 3, 4]);
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_notification_payload_is_write_snapshot() {
    // The event payload reflects the write that produced it even if the
    // row has moved on by the time the subscriber looks.
    let (_dataset, table) = table();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();

    let row_inner = row.clone();
    let depth = Arc::new(AtomicU32::new(0));
    let seen = Arc::new(AtomicU32::new(0));
    let sub_depth = depth.clone();
    let sub_seen = seen.clone();
    row.subscribe(move |event| {
        sub_seen.fetch_add(1, Ordering::Relaxed);
        if sub_depth.fetch_add(1, Ordering::Relaxed) == 0 {
            // Re-entrant write from inside the callback.
            row_inner.write(&[2], false, 0);
            // Our own event still shows the original bytes.
            assert_eq!(event.data.as_ref(), &[1]);
        }
        sub_depth.fetch_sub(1, Ordering::Relaxed);
    });

    assert!(row.write(&[1], false, 0));
    assert_eq!(row.to_vec(), vec![2]);
    assert_eq!(seen.load(Ordering::Relaxed), 2);
}
