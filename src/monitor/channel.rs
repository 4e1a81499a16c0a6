//! Notice channel built on crossbeam-channel.
//!
//! Sending never blocks. A dispatcher thread that reports progress must not
//! wait on a slow or absent reader, so a full bounded channel drops the
//! notice and counts it instead.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::DispatchNotice;

/// Sending half, cloned into each dispatcher thread
#[derive(Clone)]
pub struct MonitorSender {
    inner: Sender<DispatchNotice>,
    dropped: Arc<AtomicUsize>,
}

impl MonitorSender {
    /// Deliver `notice` if there is room
    ///
    /// A disconnected receiver discards it silently; a full channel
    /// discards it and bumps the dropped count.
    pub fn send(&self, notice: DispatchNotice) {
        if let Err(TrySendError::Full(_)) = self.inner.try_send(notice) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Receiving half
pub struct MonitorReceiver {
    inner: Receiver<DispatchNotice>,
    dropped: Arc<AtomicUsize>,
}

impl MonitorReceiver {
    /// Block until the next notice, or `None` once every sender is gone
    pub fn recv(&self) -> Option<DispatchNotice> {
        self.inner.recv().ok()
    }

    pub fn try_recv(&self) -> Option<DispatchNotice> {
        self.inner.try_recv().ok()
    }

    /// Iterate until every sender is dropped
    pub fn iter(&self) -> impl Iterator<Item = DispatchNotice> + '_ {
        self.inner.iter()
    }

    /// Notices discarded because the channel was full
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Constructors for monitor channels
pub struct MonitorChannel;

impl MonitorChannel {
    /// Unbounded channel; nothing is ever dropped while the receiver lives
    pub fn new() -> (MonitorSender, MonitorReceiver) {
        Self::pair(unbounded())
    }

    /// Channel holding at most `capacity` unread notices
    ///
    /// Notices sent while it is full are dropped, see
    /// [`MonitorReceiver::dropped`].
    pub fn bounded(capacity: usize) -> (MonitorSender, MonitorReceiver) {
        Self::pair(bounded(capacity))
    }

    fn pair(
        (sender, receiver): (Sender<DispatchNotice>, Receiver<DispatchNotice>),
    ) -> (MonitorSender, MonitorReceiver) {
        let dropped = Arc::new(AtomicUsize::new(0));
        (
            MonitorSender {
                inner: sender,
                dropped: dropped.clone(),
            },
            MonitorReceiver {
                inner: receiver,
                dropped,
            },
        )
    }
}

/// A sender whose notices go nowhere
pub fn null_sender() -> MonitorSender {
    MonitorChannel::new().0
}
