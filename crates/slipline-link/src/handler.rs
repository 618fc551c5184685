use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::LinkError;

/// Receives link notifications.
///
/// Callbacks run on the thread driving the link, in the order the events
/// happened on the wire. `on_frame` borrows the link's receive buffer, so
/// copy the frame out if it must outlive the call.
pub trait LinkHandler {
    /// The transport was acquired and the link is ready.
    fn on_opened(&mut self) {}

    /// A complete, non-empty, unescaped frame arrived.
    fn on_frame(&mut self, frame: &[u8]);

    /// An inbound frame exceeded the receive buffer and was discarded.
    fn on_overflow(&mut self, capacity: usize) {
        let _ = capacity;
    }

    /// The transport failed; the link is no longer usable.
    fn on_error(&mut self, err: &LinkError) {
        let _ = err;
    }

    /// The link was closed, by either side.
    fn on_closed(&mut self) {}
}

impl<F> LinkHandler for F
where
    F: FnMut(&[u8]),
{
    fn on_frame(&mut self, frame: &[u8]) {
        self(frame)
    }
}

/// Requests that a running link close.
///
/// Clones share one flag, so a handle can be moved into a signal handler or
/// another thread while the link is pumped elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    requested: Arc<AtomicBool>,
}

impl CloseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the link to close at its next opportunity.
    pub fn close(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
