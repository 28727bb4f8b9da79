/*!
 * MULTI/EXEC Batch Buffer
 */

use crate::protocol::Frame;

/// Pending commands queued between MULTI and EXEC. One per connection,
/// touched only by that connection's session.
#[derive(Default)]
pub struct Batch {
    queue: Vec<Frame>,
    active: bool,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart, idempotently) queueing.
    pub fn activate(&mut self) {
        self.active = true;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn push(&mut self, frame: Frame) {
        self.queue.push(frame);
    }

    /// Take the queued commands in arrival order and deactivate.
    pub fn drain(&mut self) -> Vec<Frame> {
        self.active = false;
        std::mem::take(&mut self.queue)
    }
}
