//! # Monitor Module
//!
//! Progress reporting for a running dispatcher.
//!
//! ## Design
//! The dispatcher sends notices through a channel, allowing any UI
//! (CLI, dashboard, tests) to follow claims and outcomes without
//! touching the store.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = MonitorChannel::new();
//!
//! std::thread::spawn(move || {
//!     for notice in receiver.iter() {
//!         if let DispatchNotice::Completed { name, outcome, .. } = notice {
//!             println!("{name}: {outcome:?}");
//!         }
//!     }
//! });
//!
//! let dispatcher = Dispatcher::builder(store, registry).monitor(sender).build()?;
//! ```

mod channel;
mod types;

pub use channel::{null_sender, MonitorChannel, MonitorReceiver, MonitorSender};
pub use types::*;
