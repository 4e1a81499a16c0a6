//! Event store trait definition.

use super::{Event, EventStatus, StoreStats};
use crate::error::StoreError;
use uuid::Uuid;

/// Trait for event store backends
pub trait EventStore: Send + Sync {
    /// Claim up to `limit` of the oldest pending events
    ///
    /// Selection and the flip to `Processing` happen in one unit of
    /// work, so concurrent callers never receive the same event.
    /// Events are returned oldest first.
    fn claim_pending(&self, limit: usize) -> Result<Vec<Event>, StoreError>;

    /// Persist a new event
    fn create(&self, event: &Event) -> Result<(), StoreError>;

    /// Mark a processing event as done
    fn mark_done(&self, id: Uuid) -> Result<(), StoreError>;

    /// Mark a processing event as failed with the given error text
    fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError>;

    /// Look up a single event
    fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    /// List events, oldest first, optionally filtered by status
    fn list(&self, status: Option<EventStatus>, limit: usize) -> Result<Vec<Event>, StoreError>;

    /// Get event counts per status
    fn stats(&self) -> Result<StoreStats, StoreError>;

    /// Move every failed event back to pending
    ///
    /// Returns the number of events requeued.
    fn requeue_failed(&self) -> Result<usize, StoreError>;

    /// Move every processing event back to pending
    ///
    /// Only safe while no dispatcher is running against this store.
    /// Returns the number of events reset.
    fn reset_processing(&self) -> Result<usize, StoreError>;
}
