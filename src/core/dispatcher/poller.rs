//! The poller: claims pending events on a fixed interval.

use super::cancel::CancellationToken;
use super::executor::{Dispatcher, RunStats};
use crate::core::store::Event;
use crate::monitor::DispatchNotice;
use crossbeam_channel::{select, tick, Sender};
use std::sync::atomic::Ordering;

impl Dispatcher {
    /// Claim and enqueue events until cancelled
    ///
    /// Returning drops `jobs`, the only job sender, which closes the
    /// job queue.
    pub(super) fn poll_loop(&self, jobs: Sender<Event>, cancel: &CancellationToken, stats: &RunStats) {
        let ticker = tick(self.config.poll_interval);

        loop {
            select! {
                recv(cancel.signal()) -> _ => break,
                recv(ticker) -> _ => {
                    // select! picks at random when both are ready
                    if cancel.is_cancelled() {
                        break;
                    }
                    if !self.poll_once(&jobs, stats) {
                        break;
                    }
                }
            }
        }

        tracing::debug!("poller stopped");
    }

    /// One claim cycle. Returns `false` if the job queue has no receivers.
    fn poll_once(&self, jobs: &Sender<Event>, stats: &RunStats) -> bool {
        let events = match self.store.claim_pending(self.config.batch_size) {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(%error, "claim failed, retrying next tick");
                stats.claim_errors.fetch_add(1, Ordering::SeqCst);
                self.monitor.send(DispatchNotice::ClaimFailed {
                    message: error.to_string(),
                });
                return true;
            }
        };

        if events.is_empty() {
            return true;
        }

        let count = events.len();
        tracing::debug!(count, "claimed events");
        stats.claimed.fetch_add(count, Ordering::SeqCst);
        self.monitor.send(DispatchNotice::Claimed { count });

        // The whole batch is pushed even if cancellation arrives meanwhile;
        // the events are already marked processing in the store.
        for event in events {
            let id = event.id;
            if jobs.send(event).is_err() {
                tracing::error!(event_id = %id, "job queue closed, event left processing");
                return false;
            }
        }

        true
    }
}
