//! The writer: stores the terminal state of each processed event.

use super::executor::{Dispatcher, RunStats};
use super::worker::Completion;
use crate::error::StoreError;
use crate::monitor::{DispatchNotice, Outcome};
use crossbeam_channel::Receiver;
use std::sync::atomic::Ordering;
use std::thread;
use uuid::Uuid;

impl Dispatcher {
    /// Write back results until the result queue is closed and empty
    pub(super) fn writer_loop(&self, results: Receiver<Completion>, stats: &RunStats) {
        for completion in results.iter() {
            let outcome = match &completion.result {
                Ok(()) => Outcome::Done,
                Err(error) => Outcome::Failed {
                    error: error.to_string(),
                },
            };

            match self.write_back(completion.event_id, &outcome) {
                Ok(()) => {
                    let counter = match outcome {
                        Outcome::Done => &stats.done,
                        Outcome::Failed { .. } => &stats.failed,
                    };
                    counter.fetch_add(1, Ordering::SeqCst);

                    self.monitor.send(DispatchNotice::Completed {
                        event_id: completion.event_id,
                        name: completion.name,
                        outcome,
                    });
                }
                Err(error) => {
                    tracing::error!(
                        event_id = %completion.event_id,
                        %error,
                        "write-back failed, event left processing"
                    );
                    stats.write_failures.fetch_add(1, Ordering::SeqCst);
                    self.monitor.send(DispatchNotice::WriteBackFailed {
                        event_id: completion.event_id,
                        message: error.to_string(),
                    });
                }
            }
        }

        tracing::debug!("writer stopped");
    }

    /// Store `outcome`, retrying transient failures with doubling backoff
    fn write_back(&self, id: Uuid, outcome: &Outcome) -> Result<(), StoreError> {
        let mut delay = self.config.write_retry_backoff;
        let mut attempt = 0;

        loop {
            let result = match outcome {
                Outcome::Done => self.store.mark_done(id),
                Outcome::Failed { error } => self.store.mark_failed(id, error),
            };

            match result {
                Ok(()) => return Ok(()),
                // Retrying cannot fix a missing row or a bad transition
                Err(error @ (StoreError::NotFound { .. } | StoreError::InvalidTransition { .. })) => {
                    return Err(error)
                }
                Err(error) if attempt < self.config.write_retries => {
                    attempt += 1;
                    tracing::warn!(event_id = %id, %error, attempt, "write-back failed, retrying");
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                Err(error) => return Err(error),
            }
        }
    }
}
