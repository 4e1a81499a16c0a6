//! # Error Module
//!
//! Error types for the event dispatcher.
//!
//! ## Design Principles
//! - **Never panic** on stored data - return errors instead
//! - **Include context** - event ids, handler names, what went wrong
//! - **Keep failure text readable** - it is stored verbatim on failed events

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Emit error: {0}")]
    Emit(#[from] EmitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Errors raised by an event store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open event database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Event not found: {id}")]
    NotFound { id: Uuid },

    #[error("Event {id} is {status}, expected processing")]
    InvalidTransition { id: Uuid, status: String },

    #[error("Stored event is unreadable: {0}")]
    Corrupt(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

/// Errors from handler registration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Handler already registered for event \"{name}\"")]
    Duplicate { name: String },
}

/// Errors returned to producers enqueueing events
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("Failed to serialize payload for \"{name}\": {source}")]
    Serialization {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Event name must not be empty")]
    EmptyName,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failure reported by a registered handler
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl HandlerError {
    /// Build a handler error from any displayable message
    pub fn msg(message: impl Into<String>) -> Self {
        HandlerError::Message(message.into())
    }
}

/// Why an event ended in the failed state
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("no handler registered for event \"{name}\"")]
    UnregisteredHandler { name: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("panic in handler: {0}")]
    Panicked(String),
}

/// Invalid dispatcher configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Worker count must be at least 1")]
    NoWorkers,

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("{queue} queue capacity must be at least 1")]
    ZeroCapacity { queue: &'static str },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_handler_names_the_event() {
        let error = ProcessError::UnregisteredHandler {
            name: "no.such.handler".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("no handler"));
        assert!(message.contains("no.such.handler"));
    }

    #[test]
    fn handler_error_is_recorded_verbatim() {
        let error = ProcessError::from(HandlerError::msg("smtp unavailable"));
        assert_eq!(error.to_string(), "smtp unavailable");
    }

    #[test]
    fn panic_error_has_prefix() {
        let error = ProcessError::Panicked("index out of bounds".to_string());
        assert_eq!(error.to_string(), "panic in handler: index out of bounds");
    }

    #[test]
    fn emit_store_error_passes_through() {
        let error = EmitError::from(StoreError::QueryFailed("disk full".to_string()));
        assert_eq!(error.to_string(), "Database query failed: disk full");
    }
}
