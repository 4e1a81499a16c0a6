//! # event-dispatch CLI
//!
//! Command-line interface for the event dispatcher.
//!
//! ## Usage
//! ```bash
//! event-dispatch emit user.registered --payload '{"username":"john"}'
//! event-dispatch run --workers 4
//! ```

mod cli;

use event_dispatcher::Result;

fn main() -> Result<()> {
    cli::run()
}
