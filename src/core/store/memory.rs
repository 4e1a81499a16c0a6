//! In-memory event store backend for testing.

use super::{now, Event, EventStatus, EventStore, StoreStats};
use crate::error::StoreError;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// In-memory event store
///
/// Events are kept in insertion order, which doubles as the tie-breaker
/// for equal creation times. Useful for testing and scenarios where
/// persistence isn't needed.
pub struct InMemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Event>>, StoreError> {
        self.events.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Event>>, StoreError> {
        self.events.write().map_err(|_| StoreError::Poisoned)
    }

    fn finish(&self, id: Uuid, status: EventStatus, error: Option<&str>) -> Result<(), StoreError> {
        debug_assert!(status.is_terminal());
        let mut events = self.write()?;

        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::NotFound { id })?;

        if event.status != EventStatus::Processing {
            return Err(StoreError::InvalidTransition {
                id,
                status: event.status.to_string(),
            });
        }

        event.status = status;
        event.error = error.map(str::to_string);
        event.processed_at = Some(now());
        Ok(())
    }

    fn reset(&self, from: EventStatus) -> Result<usize, StoreError> {
        let mut events = self.write()?;

        let mut count = 0;
        for event in events.iter_mut().filter(|e| e.status == from) {
            event.status = EventStatus::Pending;
            event.error = None;
            event.processed_at = None;
            count += 1;
        }

        Ok(count)
    }

    /// Indices of events with `status`, oldest first
    fn ordered(events: &[Event], status: Option<EventStatus>) -> Vec<usize> {
        let mut indices: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| status.map_or(true, |s| e.status == s))
            .map(|(i, _)| i)
            .collect();
        // Stable sort keeps insertion order for equal timestamps
        indices.sort_by_key(|&i| events[i].created_at);
        indices
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStore for InMemoryEventStore {
    fn claim_pending(&self, limit: usize) -> Result<Vec<Event>, StoreError> {
        let mut events = self.write()?;

        let claimed = Self::ordered(&events, Some(EventStatus::Pending))
            .into_iter()
            .take(limit)
            .map(|i| {
                events[i].status = EventStatus::Processing;
                events[i].clone()
            })
            .collect();

        Ok(claimed)
    }

    fn create(&self, event: &Event) -> Result<(), StoreError> {
        let mut events = self.write()?;

        if events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::QueryFailed(format!(
                "event {} already exists",
                event.id
            )));
        }

        events.push(event.clone());
        Ok(())
    }

    fn mark_done(&self, id: Uuid) -> Result<(), StoreError> {
        self.finish(id, EventStatus::Done, None)
    }

    fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), StoreError> {
        self.finish(id, EventStatus::Failed, Some(error))
    }

    fn get(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        let events = self.read()?;
        Ok(events.iter().find(|e| e.id == id).cloned())
    }

    fn list(&self, status: Option<EventStatus>, limit: usize) -> Result<Vec<Event>, StoreError> {
        let events = self.read()?;

        Ok(Self::ordered(&events, status)
            .into_iter()
            .take(limit)
            .map(|i| events[i].clone())
            .collect())
    }

    fn stats(&self) -> Result<StoreStats, StoreError> {
        let events = self.read()?;

        let mut stats = StoreStats::default();
        for event in events.iter() {
            stats.bump(event.status, 1);
        }

        Ok(stats)
    }

    fn requeue_failed(&self) -> Result<usize, StoreError> {
        self.reset(EventStatus::Failed)
    }

    fn reset_processing(&self) -> Result<usize, StoreError> {
        self.reset(EventStatus::Processing)
    }
}
