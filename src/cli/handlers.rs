//! Handlers registered by `event-dispatch run`.
//!
//! The real application registers its own services (mailers and the
//! like); these stand in for them so the queue can be exercised from the
//! command line.

use event_dispatcher::core::registry::{HandlerContext, HandlerRegistry};
use event_dispatcher::error::{HandlerError, RegistryError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct LogMessage {
    message: String,
    #[serde(default)]
    level: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserRegistered {
    username: String,
    #[serde(default)]
    email: Option<String>,
}

/// Register every built-in handler
pub fn register_builtin(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    registry.register_json("log.message", log_message)?;
    registry.register_json("user.registered", user_registered)?;
    Ok(())
}

fn log_message(ctx: &HandlerContext, payload: LogMessage) -> Result<(), HandlerError> {
    match payload.level.as_deref() {
        Some("warn") => tracing::warn!(event_id = %ctx.event_id, "{}", payload.message),
        Some("error") => tracing::error!(event_id = %ctx.event_id, "{}", payload.message),
        _ => tracing::info!(event_id = %ctx.event_id, "{}", payload.message),
    }
    Ok(())
}

fn user_registered(ctx: &HandlerContext, payload: UserRegistered) -> Result<(), HandlerError> {
    if payload.username.trim().is_empty() {
        return Err(HandlerError::msg("username is empty"));
    }

    tracing::info!(
        event_id = %ctx.event_id,
        username = %payload.username,
        email = payload.email.as_deref().unwrap_or("-"),
        "welcome notification sent"
    );
    Ok(())
}
