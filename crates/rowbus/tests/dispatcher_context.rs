// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::shadow_unrelated)] // Test scoping

//! Dispatcher-bound delivery integration tests

use rowbus::{Dataset, Dispatcher, Key, RowSpec};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn test_subscribe_on_marshals_to_dispatcher_thread() {
    let dataset = Dataset::new("d");
    let table = dataset.create_table(Key::from("t"), "t", "").unwrap();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();

    let dispatcher = Arc::new(Dispatcher::new("delivery"));
    let writer_thread = thread::current().id();
    let on_writer_thread = Arc::new(AtomicBool::new(false));
    let hits = Arc::new(AtomicU32::new(0));

    let sub_flag = on_writer_thread.clone();
    let sub_hits = hits.clone();
    row.subscribe_on(&dispatcher, move |event| {
        if thread::current().id() == writer_thread {
            sub_flag.store(true, Ordering::Release);
        }
        assert_eq!(event.data.as_ref(), &[42]);
        sub_hits.fetch_add(1, Ordering::Relaxed);
    });

    row.write(&[42], false, 0);
    dispatcher.sync();

    assert_eq!(hits.load(Ordering::Relaxed), 1);
    // Delivery happened on the dispatcher worker, not the writer thread.
    assert!(!on_writer_thread.load(Ordering::Acquire));
}

#[test]
fn test_per_subscriber_serialization_across_writers() {
    // Many threads hammer the row; the dispatcher-bound subscriber must
    // never run its callback concurrently with itself.
    let dataset = Dataset::new("d");
    let table = dataset.create_table(Key::from("t"), "t", "").unwrap();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();

    let dispatcher = Arc::new(Dispatcher::new("serial"));
    let in_callback = Arc::new(AtomicBool::new(false));
    let overlap = Arc::new(AtomicBool::new(false));
    let hits = Arc::new(AtomicU32::new(0));

    let sub_in = in_callback.clone();
    let sub_overlap = overlap.clone();
    let sub_hits = hits.clone();
    row.subscribe_on(&dispatcher, move |_| {
        if sub_in.swap(true, Ordering::AcqRel) {
            sub_overlap.store(true, Ordering::Release);
        }
        thread::sleep(Duration::from_micros(50));
        sub_in.store(false, Ordering::Release);
        sub_hits.fetch_add(1, Ordering::Relaxed);
    });

    let mut handles = Vec::new();
    for t in 0..4u8 {
        let row = row.clone();
        handles.push(thread::spawn(move || {
            for i in 0..50u8 {
                row.write(&[t, i], false, 0);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    dispatcher.sync();

    assert!(!overlap.load(Ordering::Acquire));
    assert!(hits.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_ordering_per_row_preserved_through_dispatcher() {
    let dataset = Dataset::new("d");
    let table = dataset.create_table(Key::from("t"), "t", "").unwrap();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();

    let dispatcher = Arc::new(Dispatcher::new("order"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sub_seen = seen.clone();
    row.subscribe_on(&dispatcher, move |event| {
        sub_seen.lock().unwrap().push(event.data[0]);
    });

    // Single writer: notifications arrive in write order.
    for i in 0..32u8 {
        assert!(row.write(&[i], false, 0));
    }
    dispatcher.sync();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), (0..32).collect::<Vec<u8>>().as_slice());
}

#[test]
fn test_no_delivery_after_dispose() {
    let dataset = Dataset::new("d");
    let table = dataset.create_table(Key::from("t"), "t", "").unwrap();
    let row = table.create_row(RowSpec::new(Key::from("r"))).unwrap();

    let dispatcher = Arc::new(Dispatcher::new("doomed"));
    let hits = Arc::new(AtomicU32::new(0));
    let sub_hits = hits.clone();
    row.subscribe_on(&dispatcher, move |_| {
        sub_hits.fetch_add(1, Ordering::Relaxed);
    });

    row.write(&[1], false, 0);
    dispatcher.sync();
    assert_eq!(hits.load(Ordering::Relaxed), 1);

    dispatcher.dispose();
    // Writes still succeed; the marshaled delivery is rejected silently.
    assert!(row.write(&[2], false, 0));
    thread::sleep(Duration::from_millis(20));
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

#[test]
fn test_timer_driven_row_writes() {
    // The timer-driven sample pattern: a periodic producer publishing into
    // a row at a fixed rate.
    let dataset = Dataset::new("d");
    let table = dataset.create_table(Key::from("t"), "t", "").unwrap();
    let row = table.create_row(RowSpec::new(Key::from("sample"))).unwrap();

    let hits = Arc::new(AtomicU32::new(0));
    let sub_hits = hits.clone();
    row.subscribe(move |_| {
        sub_hits.fetch_add(1, Ordering::Relaxed);
    });

    let dispatcher = Dispatcher::new("sampler");
    let writer_row = row.clone();
    let counter = Arc::new(AtomicU32::new(0));
    let timer_counter = counter.clone();
    let token = dispatcher.register_timer(
        Duration::from_millis(5),
        move || {
            let n = timer_counter.fetch_add(1, Ordering::Relaxed);
            writer_row.write(&n.to_le_bytes(), false, 0);
        },
        0,
    );

    while hits.load(Ordering::Relaxed) < 5 {
        thread::sleep(Duration::from_millis(2));
    }
    assert!(dispatcher.unregister_timer(token));

    let frozen = hits.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(hits.load(Ordering::Relaxed), frozen);
}
