//! Worker threads: handler lookup and the panic boundary.

use super::cancel::CancellationToken;
use super::executor::Dispatcher;
use crate::core::registry::{Handler, HandlerContext};
use crate::core::store::Event;
use crate::error::ProcessError;
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use uuid::Uuid;

/// Outcome of processing one event, handed to the writer
#[derive(Debug)]
pub(super) struct Completion {
    pub event_id: Uuid,
    pub name: String,
    pub result: Result<(), ProcessError>,
}

impl Dispatcher {
    /// Process jobs until the job queue is closed and empty
    pub(super) fn worker_loop(
        &self,
        index: usize,
        jobs: Receiver<Event>,
        results: Sender<Completion>,
        cancel: &CancellationToken,
    ) {
        tracing::debug!(worker = index, "worker started");

        for event in jobs.iter() {
            let completion = self.process(event, cancel);
            if results.send(completion).is_err() {
                // Only possible if the writer died
                tracing::error!(worker = index, "result queue closed, worker exiting");
                break;
            }
        }

        tracing::debug!(worker = index, "worker stopped");
    }

    /// Run the handler for one event; always yields exactly one completion
    pub(super) fn process(&self, event: Event, cancel: &CancellationToken) -> Completion {
        let result = match self.registry.get(&event.name) {
            None => Err(ProcessError::UnregisteredHandler {
                name: event.name.clone(),
            }),
            Some(handler) => {
                let ctx = HandlerContext::new(event.id, event.name.as_str(), cancel.clone());
                invoke(handler.as_ref(), &ctx, &event.payload)
            }
        };

        if let Err(error) = &result {
            tracing::warn!(event_id = %event.id, event = %event.name, %error, "event failed");
        } else {
            tracing::debug!(event_id = %event.id, event = %event.name, "event handled");
        }

        Completion {
            event_id: event.id,
            name: event.name,
            result,
        }
    }
}

/// Call `handler`, turning a panic into an error
fn invoke(handler: &dyn Handler, ctx: &HandlerContext, payload: &[u8]) -> Result<(), ProcessError> {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(ctx, payload))) {
        Ok(result) => result.map_err(ProcessError::from),
        Err(panic) => Err(ProcessError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
