//! Notice type definitions for dispatcher monitoring.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Everything a running dispatcher reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DispatchNotice {
    /// The poller, workers and writer are running
    Started { workers: usize },
    /// A batch was claimed from the store
    Claimed { count: usize },
    /// Claiming failed; the poller retries on the next tick
    ClaimFailed { message: String },
    /// An event reached a terminal state
    Completed {
        event_id: Uuid,
        name: String,
        outcome: Outcome,
    },
    /// The terminal write for an event failed after all retries
    WriteBackFailed { event_id: Uuid, message: String },
    /// Cancellation observed, queues are draining
    Draining,
    /// Every queued event has been written back
    Stopped { summary: DispatchSummary },
}

/// How an event was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Done,
    Failed { error: String },
}

/// Totals for one dispatcher run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Events claimed from the store
    pub claimed: usize,
    /// Events marked done
    pub done: usize,
    /// Events marked failed
    pub failed: usize,
    /// Poll ticks whose claim failed
    pub claim_errors: usize,
    /// Events whose terminal write could not be stored
    pub write_failures: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl DispatchSummary {
    /// Events that reached a terminal write
    pub fn completed(&self) -> usize {
        self.done + self.failed
    }
}
