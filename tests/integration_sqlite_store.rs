//! Integration tests for the SQLite event store.
//!
//! These tests verify:
//! - Exclusive claims across connections to one database file
//! - Persistence across reopen
//! - A full dispatcher run against SQLite

mod common;

use common::wait_until;
use event_dispatcher::core::store::{EventStatus, EventStore, SqliteEventStore};
use event_dispatcher::core::{CancellationToken, Dispatcher, EventEmitter, HandlerContext, HandlerRegistry};
use event_dispatcher::error::HandlerError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct OrderPlaced {
    order_id: u64,
    total_cents: i64,
}

#[test]
fn concurrent_claims_never_overlap() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("events.db");

    // Open every connection up front so schema setup is not contended
    let stores: Vec<SqliteEventStore> = (0..4)
        .map(|_| SqliteEventStore::open(&db_path).unwrap())
        .collect();

    let emitter = EventEmitter::new(Arc::new(SqliteEventStore::open(&db_path).unwrap()));
    for i in 0..200 {
        emitter.emit("tick", &i).unwrap();
    }

    let handles: Vec<_> = stores
        .into_iter()
        .map(|store| {
            thread::spawn(move || {
                let mut claimed = Vec::new();
                loop {
                    let batch = store.claim_pending(7).unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    claimed.extend(batch.into_iter().map(|e| e.id));
                }
                claimed
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap());
    }

    let unique: HashSet<_> = all.iter().copied().collect();
    assert_eq!(all.len(), 200);
    assert_eq!(unique.len(), 200);

    let stats = SqliteEventStore::open(&db_path).unwrap().stats().unwrap();
    assert_eq!(stats.processing, 200);
    assert_eq!(stats.pending, 0);
}

#[test]
fn emitted_payload_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("events.db");

    let order = OrderPlaced {
        order_id: 42,
        total_cents: 1999,
    };
    let id = {
        let store = Arc::new(SqliteEventStore::open(&db_path).unwrap());
        EventEmitter::new(store).emit("order.placed", &order).unwrap()
    };

    let store = SqliteEventStore::open(&db_path).unwrap();
    let event = store.get(id).unwrap().unwrap();

    assert_eq!(event.name, "order.placed");
    assert_eq!(event.status, EventStatus::Pending);
    assert!(event.processed_at.is_none());
    let decoded: OrderPlaced = serde_json::from_slice(&event.payload).unwrap();
    assert_eq!(decoded, order);
}

#[test]
fn dispatcher_run_over_sqlite_then_requeue() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("events.db");
    let store = Arc::new(SqliteEventStore::open(&db_path).unwrap());
    let emitter = EventEmitter::new(store.clone());

    let good = emitter
        .emit("order.placed", &OrderPlaced { order_id: 1, total_cents: 500 })
        .unwrap();
    let bad = emitter
        .emit("order.placed", &OrderPlaced { order_id: 2, total_cents: -1 })
        .unwrap();

    let build_registry = |reject_negative: bool| {
        let mut registry = HandlerRegistry::new();
        registry
            .register_json("order.placed", move |_: &HandlerContext, order: OrderPlaced| {
                if reject_negative && order.total_cents < 0 {
                    return Err(HandlerError::msg("negative total"));
                }
                Ok(())
            })
            .unwrap();
        registry
    };

    let run = |registry: HandlerRegistry, expected_terminal: usize| {
        let dispatcher = Dispatcher::builder(store.clone(), registry)
            .workers(2)
            .poll_interval(Duration::from_millis(10))
            .build()
            .unwrap();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = thread::spawn(move || dispatcher.run(&token));

        let finished = wait_until(Duration::from_secs(3), || {
            let stats = store.stats().unwrap();
            stats.done + stats.failed == expected_terminal && stats.processing == 0
        });
        cancel.cancel();
        let summary = handle.join().unwrap();
        assert!(finished, "dispatcher did not finish in time");
        summary
    };

    let first = run(build_registry(true), 2);
    assert_eq!(first.done, 1);
    assert_eq!(first.failed, 1);

    let good_event = store.get(good).unwrap().unwrap();
    assert_eq!(good_event.status, EventStatus::Done);
    assert!(good_event.processed_at.is_some());

    let bad_event = store.get(bad).unwrap().unwrap();
    assert_eq!(bad_event.status, EventStatus::Failed);
    assert_eq!(bad_event.error.as_deref(), Some("negative total"));
    assert!(bad_event.processed_at.is_some());

    assert_eq!(store.requeue_failed().unwrap(), 1);
    let requeued = store.get(bad).unwrap().unwrap();
    assert_eq!(requeued.status, EventStatus::Pending);
    assert!(requeued.error.is_none());

    let second = run(build_registry(false), 2);
    assert_eq!(second.claimed, 1);
    assert_eq!(second.done, 1);

    let stats = store.stats().unwrap();
    assert_eq!(stats.done, 2);
    assert_eq!(stats.failed, 0);
}
