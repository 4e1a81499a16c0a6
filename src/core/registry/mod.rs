//! # Registry Module
//!
//! Maps event names to the handlers that process them.
//!
//! Registration happens at startup, before the registry is handed to a
//! dispatcher. Once moved into the dispatcher it is shared read-only, so
//! no handler can be added while events are being processed.

use crate::core::dispatcher::CancellationToken;
use crate::error::{HandlerError, RegistryError};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Per-invocation information handed to a handler
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Id of the event being processed
    pub event_id: Uuid,
    /// Name the event was emitted under
    pub event_name: String,
    cancel: CancellationToken,
}

impl HandlerContext {
    pub fn new(event_id: Uuid, event_name: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            event_id,
            event_name: event_name.into(),
            cancel,
        }
    }

    /// Whether the dispatcher has been asked to shut down
    ///
    /// Handlers are never interrupted. Long-running ones should check this
    /// and return early.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A function that processes one event payload.
pub trait Handler: Fn(&HandlerContext, &[u8]) -> Result<(), HandlerError> + Send + Sync {}

// Any closure or fn matching the signature is a handler.
impl<T> Handler for T where T: Fn(&HandlerContext, &[u8]) -> Result<(), HandlerError> + Send + Sync {}

/// Name to handler mapping
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for raw payload bytes
    ///
    /// Fails if a handler is already registered under `name`; the
    /// existing handler is kept.
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H) -> Result<(), RegistryError>
    where
        H: Handler + 'static,
    {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }

        tracing::debug!(event = %name, "registered handler");
        self.handlers.insert(name, Arc::new(handler));
        Ok(())
    }

    /// Register a handler that receives the payload decoded from JSON
    pub fn register_json<T, F>(&mut self, name: impl Into<String>, handler: F) -> Result<(), RegistryError>
    where
        T: DeserializeOwned,
        F: Fn(&HandlerContext, T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(name, move |ctx: &HandlerContext, payload: &[u8]| {
            let value: T = serde_json::from_slice(payload)?;
            handler(ctx, value)
        })
    }

    /// Look up the handler for `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered event names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Mutex;

    fn context(name: &str) -> HandlerContext {
        HandlerContext::new(Uuid::new_v4(), name, CancellationToken::new())
    }

    fn ok_handler(_: &HandlerContext, _: &[u8]) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn registered_handler_is_found() {
        let mut registry = HandlerRegistry::new();
        registry
            .register("user.registered", |_: &HandlerContext, _: &[u8]| {
                Err(HandlerError::msg("marker"))
            })
            .unwrap();

        let handler = registry.get("user.registered").unwrap();
        let result = handler(&context("user.registered"), b"{}");

        assert_eq!(result.unwrap_err().to_string(), "marker");
    }

    #[test]
    fn unregistered_name_is_not_found() {
        let registry = HandlerRegistry::new();

        assert!(registry.get("no.such.handler").is_none());
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_original() {
        let mut registry = HandlerRegistry::new();
        registry.register("a", ok_handler).unwrap();

        let result = registry.register("a", |_: &HandlerContext, _: &[u8]| {
            Err(HandlerError::msg("replacement"))
        });

        assert_eq!(
            result,
            Err(RegistryError::Duplicate {
                name: "a".to_string()
            })
        );
        let handler = registry.get("a").unwrap();
        assert!(handler(&context("a"), b"").is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn json_handler_receives_decoded_payload() {
        #[derive(Deserialize)]
        struct Registered {
            username: String,
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mut registry = HandlerRegistry::new();
        registry
            .register_json("user.registered", move |_, payload: Registered| {
                sink.lock().unwrap().push(payload.username);
                Ok(())
            })
            .unwrap();

        let handler = registry.get("user.registered").unwrap();
        handler(&context("user.registered"), br#"{"username":"john"}"#).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["john".to_string()]);
    }

    #[test]
    fn json_handler_reports_decode_errors() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_json("typed", |_, _: Vec<u32>| Ok(()))
            .unwrap();

        let handler = registry.get("typed").unwrap();
        let result = handler(&context("typed"), b"not json");

        assert!(matches!(result, Err(HandlerError::Decode(_))));
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register("b", ok_handler).unwrap();
        registry.register("a", ok_handler).unwrap();

        assert_eq!(registry.names(), vec!["a", "b"]);
    }
}
