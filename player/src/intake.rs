//! The intake list (spec §4.7, §5's second mutex): "append to an intake
//! list behind its own mutex+condvar, kept as a genuinely separate
//! structure from the heap so the intake critical section stays
//! microseconds-short." A plain `VecDeque`, not `core_buffers::PacketHeap`
//! — the listen thread only ever pushes to the back; ordering into
//! sequence-space happens later, in the queue thread, off the hot path.

use core_buffers::PacketHandle;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::Duration;

pub struct IntakeEntry {
    pub timestamp: u32,
    pub handle: PacketHandle,
}

#[derive(Default)]
pub struct IntakeList {
    queue: Mutex<VecDeque<IntakeEntry>>,
    ready: Condvar,
}

impl IntakeList {
    pub fn new() -> Self {
        IntakeList::default()
    }

    /// Append one entry and wake the queue thread. Called from the
    /// listen thread; must stay cheap (spec §4.7).
    pub fn push(&self, timestamp: u32, handle: PacketHandle) {
        self.queue.lock().push_back(IntakeEntry { timestamp, handle });
        self.ready.notify_one();
    }

    /// Wait up to `timeout` for at least one entry, then drain everything
    /// queued so far. Returns empty on timeout so the queue thread can
    /// recheck its shutdown flag instead of blocking forever.
    pub fn drain_wait(&self, timeout: Duration) -> Vec<IntakeEntry> {
        let mut guard = self.queue.lock();
        if guard.is_empty() {
            self.ready.wait_for(&mut guard, timeout);
        }
        guard.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_buffers::PacketAllocator;

    #[test]
    fn drain_returns_pushed_entries_in_order() {
        let alloc = PacketAllocator::new();
        let intake = IntakeList::new();
        intake.push(10, alloc.alloc());
        intake.push(20, alloc.alloc());

        let drained = intake.drain_wait(Duration::from_millis(50));
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].timestamp, 10);
        assert_eq!(drained[1].timestamp, 20);
    }

    #[test]
    fn drain_times_out_empty_when_nothing_pushed() {
        let intake = IntakeList::new();
        let drained = intake.drain_wait(Duration::from_millis(10));
        assert!(drained.is_empty());
    }
}
