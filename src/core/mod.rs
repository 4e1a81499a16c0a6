//! # Core Module
//!
//! The event queue engine.
//!
//! ## Modules
//! - `store` - Durable event rows and the claim operation
//! - `registry` - Maps event names to handlers
//! - `emitter` - Enqueues new events
//! - `dispatcher` - Poller, worker pool, writer and shutdown

pub mod dispatcher;
pub mod emitter;
pub mod registry;
pub mod store;

// Re-export commonly used types
pub use dispatcher::{CancellationToken, Dispatcher, DispatcherConfig};
pub use emitter::EventEmitter;
pub use registry::{HandlerContext, HandlerRegistry};
pub use store::{Event, EventStatus, EventStore, InMemoryEventStore, SqliteEventStore};
