//! # Store Module
//!
//! Durable record of queued events.
//!
//! ## Lifecycle
//! - `Pending` - created by the emitter
//! - `Processing` - flipped by `claim_pending`, one batch per transaction
//! - `Done` / `Failed` - terminal, written back by the dispatcher
//!
//! ## Backends
//! - `SqliteEventStore` - Persistent storage using SQLite
//! - `InMemoryEventStore` - For testing

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;
pub use traits::EventStore;

use crate::error::StoreError;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One unit of queued work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier assigned at creation
    pub id: Uuid,
    /// Name of the handler that processes this event
    pub name: String,
    /// Opaque payload, JSON when produced by the emitter
    pub payload: Vec<u8>,
    /// Current lifecycle state
    pub status: EventStatus,
    /// Last failure message, only set when `status` is `Failed`
    pub error: Option<String>,
    /// When the event was created
    pub created_at: DateTime<Utc>,
    /// When the event reached a terminal state
    pub processed_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Create a new pending event
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            status: EventStatus::Pending,
            error: None,
            created_at: now(),
            processed_at: None,
        }
    }
}

/// Current time at the precision the stores persist (microseconds)
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Lifecycle state of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Pending,
    Processing,
    Done,
    Failed,
}

impl EventStatus {
    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Processing => "processing",
            EventStatus::Done => "done",
            EventStatus::Failed => "failed",
        }
    }

    /// `Done` and `Failed` have no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Done | EventStatus::Failed)
    }
}

impl FromStr for EventStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "processing" => Ok(EventStatus::Processing),
            "done" => Ok(EventStatus::Done),
            "failed" => Ok(EventStatus::Failed),
            other => Err(StoreError::Corrupt(format!("unknown status \"{}\"", other))),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub failed: usize,
}

impl StoreStats {
    /// Total number of stored events
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.done + self.failed
    }

    fn bump(&mut self, status: EventStatus, by: usize) {
        match status {
            EventStatus::Pending => self.pending += by,
            EventStatus::Processing => self.processing += by,
            EventStatus::Done => self.done += by,
            EventStatus::Failed => self.failed += by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_is_pending() {
        let event = Event::new("user.registered", b"{}".to_vec());

        assert_eq!(event.status, EventStatus::Pending);
        assert!(event.error.is_none());
        assert!(event.processed_at.is_none());
    }

    #[test]
    fn status_round_trips_through_storage_text() {
        for status in [
            EventStatus::Pending,
            EventStatus::Processing,
            EventStatus::Done,
            EventStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<EventStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let result = "archived".parse::<EventStatus>();
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn new_event_time_fits_microsecond_storage() {
        let event = Event::new("user.registered", Vec::new());

        assert_eq!(event.created_at.timestamp_subsec_nanos() % 1_000, 0);
        assert_eq!(
            DateTime::from_timestamp_micros(event.created_at.timestamp_micros()),
            Some(event.created_at)
        );
    }

    #[test]
    fn only_done_and_failed_are_terminal() {
        assert!(!EventStatus::Pending.is_terminal());
        assert!(!EventStatus::Processing.is_terminal());
        assert!(EventStatus::Done.is_terminal());
        assert!(EventStatus::Failed.is_terminal());
    }

    #[test]
    fn stats_total_sums_all_statuses() {
        let mut stats = StoreStats::default();
        stats.bump(EventStatus::Pending, 2);
        stats.bump(EventStatus::Failed, 1);

        assert_eq!(stats.total(), 3);
    }
}
