//! # Dispatcher Module
//!
//! Moves events from the store through their handlers and back.
//!
//! ## Threads
//! 1. **Poller** - claims up to `batch_size` pending events per tick
//! 2. **Workers** - look up and run handlers, one event at a time each
//! 3. **Writer** - marks each event done or failed
//!
//! The three roles only share two bounded crossbeam channels: a job queue
//! (poller to workers) and a result queue (workers to writer). A full
//! queue blocks its producer, which throttles claiming when handlers fall
//! behind.
//!
//! ## Failure handling
//! - Claim errors are logged and retried on the next tick
//! - Unknown event names and handler errors end as `Failed`
//! - Handler panics are caught and end as `Failed` ("panic in handler: ...")
//! - Write-back errors are retried with backoff, then logged; the event
//!   stays `Processing` until reset
//!
//! Handlers are never interrupted. A handler that never returns blocks its
//! worker, and shutdown waits for it.

mod cancel;
mod executor;
mod poller;
mod worker;
mod writer;

pub use cancel::CancellationToken;
pub use executor::{Dispatcher, DispatcherBuilder, DispatcherConfig};
