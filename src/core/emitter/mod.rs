//! # Emitter Module
//!
//! Entry point for producers: turns a payload into a pending event row.
//!
//! The emitter keeps no state besides the store handle. Failures are
//! returned to the caller as-is; retrying is the caller's decision.

use crate::core::store::{Event, EventStore};
use crate::error::EmitError;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Enqueues events into an [`EventStore`]
#[derive(Clone)]
pub struct EventEmitter {
    store: Arc<dyn EventStore>,
}

impl EventEmitter {
    /// Create an emitter writing to `store`
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Serialize `payload` as JSON and enqueue it under `name`
    ///
    /// Returns the id of the new event.
    pub fn emit<T>(&self, name: &str, payload: &T) -> Result<Uuid, EmitError>
    where
        T: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(payload).map_err(|source| EmitError::Serialization {
            name: name.to_string(),
            source,
        })?;

        self.emit_raw(name, bytes)
    }

    /// Enqueue an already encoded payload under `name`
    pub fn emit_raw(&self, name: &str, payload: Vec<u8>) -> Result<Uuid, EmitError> {
        if name.trim().is_empty() {
            return Err(EmitError::EmptyName);
        }

        let event = Event::new(name, payload);
        self.store.create(&event)?;

        tracing::debug!(event_id = %event.id, event = name, "emitted event");
        Ok(event.id)
    }
}
