//! Queue thread (spec §4.7, §5 lock order "intake -> playback"): drains
//! the intake list into the jitter-buffer heap, enforcing the backlog
//! bound on the way in.

use crate::intake::IntakeList;
use crate::state::PlaybackShared;
use core_buffers::PacketAllocator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const DRAIN_POLL_TIMEOUT: Duration = Duration::from_millis(200);
/// How long a single backlog-bound wait can run before re-checking the
/// shutdown flag, so `stop` is never held up by a full heap.
const BACKLOG_POLL_TIMEOUT: Duration = Duration::from_millis(50);

pub fn spawn(
    intake: Arc<IntakeList>,
    shared: Arc<PlaybackShared>,
    allocator: Arc<PacketAllocator>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("rtp-queue".into())
        .spawn(move || {
            while running.load(Ordering::SeqCst) {
                let drained = intake.drain_wait(DRAIN_POLL_TIMEOUT);
                if drained.is_empty() {
                    continue;
                }

                let mut guard = shared.state.lock();
                for entry in drained {
                    // Backlog bound (spec §4.7, open question resolved in
                    // DESIGN.md in favor of the spec's literal "block"
                    // behavior over dropping the oldest packet).
                    while guard.total_bytes > shared.watermarks.maxbuffer_bytes
                        && running.load(Ordering::SeqCst)
                    {
                        shared
                            .space_available
                            .wait_for(&mut guard, BACKLOG_POLL_TIMEOUT);
                    }
                    if !running.load(Ordering::SeqCst) {
                        allocator.free(entry.handle);
                        break;
                    }

                    let len = allocator.with(entry.handle, |p| p.samples().len()) as u64;
                    guard.heap.insert(entry.timestamp, entry.handle);
                    guard.total_bytes += len;
                }
            }
        })
        .expect("spawn rtp-queue thread")
}
