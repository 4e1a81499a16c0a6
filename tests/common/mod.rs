//! Helpers shared by the integration tests.

#![allow(dead_code)]

use event_dispatcher::core::store::{Event, EventStatus, EventStore, InMemoryEventStore, StoreStats};
use event_dispatcher::error::StoreError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Status of `id`, panicking if it is missing
pub fn status_of(store: &dyn EventStore, id: Uuid) -> EventStatus {
    store.get(id).unwrap().expect("event exists").status
}

/// Take one from `counter` if it is positive
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// In-memory store that fails a configurable number of calls
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryEventStore,
    pub claim_failures: AtomicUsize,
    pub write_failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(claim_failures: usize, write_failures: usize) -> Self {
        Self {
            inner: InMemoryEventStore::new(),
            claim_failures: AtomicUsize::new(claim_failures),
            write_failures: AtomicUsize::new(write_failures),
        }
    }

    fn unavailable() -> StoreError {
        StoreError::QueryFailed("database is locked".to_string())
    }
}

impl EventStore for FlakyStore {
    fn claim_pending(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        if take_one(&self.claim_failures) {
            return Err(Self::unavailable());
        }
        self.inner.claim_pending(limit)
    }

    fn create(&self, event: &Event) -> Result<(), StoreError> {
        self.inner.create(event)
    }

    fn mark_done(&self, id: Uuid) -> Result<(), StoreError> {
        if take_one(&self.write_failures) {
            return Err(Self::unavailable());
        }
        self.inner.mark_done(id)
    }

    fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        if take_one(&self.write_failures) {
            return Err(Self::unavailable());
        }
        self.inner.mark_failed(id, error)
    }

    fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.inner.get(id)
    }

    fn list(&self, status: Option<EventStatus>, limit: usize) -> Result<Vec<Event>, StoreError> {
        self.inner.list(status, limit)
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        self.inner.stats()
    }

    fn requeue_failed(&self) -> Result<usize, StoreError> {
        self.inner.requeue_failed()
    }

    fn reset_processing(&self) -> Result<usize, StoreError> {
        self.inner.reset_processing()
    }
}
