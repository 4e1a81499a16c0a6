//! # Event Dispatcher
//!
//! A durable, at-least-once event queue backed by a relational table.
//!
//! ## Guarantees
//! - **At-least-once** - handlers must be idempotent
//! - **Exclusive claims** - an event is processing in one place at a time
//! - **Fault isolation** - a failing or panicking handler only fails its own event
//! - **Complete shutdown** - every claimed event is written back before `run` returns
//!
//! ## Architecture
//! - `core` - Store, registry, emitter and dispatcher
//! - `monitor` - Channel-based progress notices (UI-ready)
//! - `error` - Error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod monitor;

// Re-export commonly used types at the crate root
pub use error::{DispatchError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG`
/// overrides `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
