use std::cell::Cell;

/// Coalesces redraw requests. Any number of `request` calls between two flushes produce one
/// redraw; requests made while the surface is not ready are dropped.
#[derive(Debug, Default)]
pub struct RedrawScheduler {
    ready: Cell<bool>,
    pending: Cell<bool>,
    frame_queued: Cell<bool>,
    coalesced: Cell<u64>,
}

impl RedrawScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
        if !ready {
            self.pending.set(false);
            self.frame_queued.set(false);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Returns true when this call armed a new redraw.
    pub fn request(&self) -> bool {
        if !self.ready.get() {
            return false;
        }
        if self.pending.replace(true) {
            self.coalesced.set(self.coalesced.get() + 1);
            return false;
        }
        true
    }

    /// Defers the request to the next animation frame, for bursts of movement updates.
    pub fn request_next_frame(&self) -> bool {
        !self.frame_queued.replace(true)
    }

    /// Promotes a frame-deferred request. Returns whether a redraw is now due.
    pub fn on_frame(&self) -> bool {
        if self.frame_queued.replace(false) {
            self.request();
        }
        self.pending.get()
    }

    /// Consumes the pending flag.
    pub fn take_due(&self) -> bool {
        self.pending.replace(false)
    }

    /// Requests absorbed into an already-pending redraw since creation.
    pub fn coalesced(&self) -> u64 {
        self.coalesced.get()
    }
}
