//! Player FSM (spec §4.7, C9): Buffering fills to readahead before first
//! activation; Active drains the heap in sequence-space order, infilling
//! silence across gaps and dropping back to Buffering when the buffer
//! runs dry below the minimum watermark.

use crate::dump::CircularDump;
use crate::state::{PlaybackCursor, PlaybackShared, PlaybackState};
use core_backend::PullCallback;
use core_buffers::PacketAllocator;
use core_proto::seqspace::{seq_cmp_u32, seq_diff_u32};
use std::cmp::Ordering;
use std::sync::Arc;

/// Build the callback the audio backend drives. All FSM state lives in
/// `shared.state` behind its mutex; this closure is the real-time path's
/// only reader of it.
pub fn make_pull_callback(
    shared: Arc<PlaybackShared>,
    allocator: Arc<PacketAllocator>,
    cursor: Arc<PlaybackCursor>,
    dump: Option<Arc<CircularDump>>,
) -> PullCallback {
    Box::new(move |buf: &mut [u8]| -> usize {
        let filled = fill_from_heap(buf, &shared, &allocator, &cursor);
        if let Some(dump) = &dump {
            if filled > 0 {
                dump.write(&buf[..filled]);
            }
        }
        filled
    })
}

fn fill_from_heap(
    buf: &mut [u8],
    shared: &PlaybackShared,
    allocator: &PacketAllocator,
    cursor: &PlaybackCursor,
) -> usize {
    let mut filled = 0;
    let mut state = shared.state.lock();

    while filled < buf.len() {
        match state.state {
            PlaybackState::Buffering => {
                if state.total_bytes < shared.watermarks.readahead_bytes {
                    break;
                }
                // Sync the read cursor to the heap root's timestamp rather
                // than leaving it at its prior value (spec §4.7: "set
                // next_timestamp to the heap root's timestamp, enable the
                // backend") — otherwise the first Active iteration would
                // read the root as a gap and infill silence back to 0.
                if let Some((ts, _)) = state.heap.peek_min() {
                    state.next_timestamp = ts;
                }
                state.state = PlaybackState::Active;
                cursor.set_active(true);
            }
            PlaybackState::Active => {
                if let Some((handle, offset)) = state.current {
                    let (done, copied) = allocator.with(handle, |p| {
                        let payload = p.samples();
                        let remaining = &payload[offset..];
                        let n = remaining.len().min(buf.len() - filled);
                        buf[filled..filled + n].copy_from_slice(&remaining[..n]);
                        (offset + n >= payload.len(), n)
                    });
                    filled += copied;
                    state.next_timestamp = state.next_timestamp.wrapping_add((copied / 2) as u32);
                    if done {
                        allocator.free(handle);
                        state.current = None;
                    } else {
                        state.current = Some((handle, offset + copied));
                    }
                    continue;
                }

                match state.heap.peek_min() {
                    None => {
                        if state.total_bytes < shared.watermarks.minbuffer_bytes {
                            state.state = PlaybackState::Buffering;
                            cursor.set_active(false);
                        }
                        break;
                    }
                    Some((ts, handle)) => {
                        if seq_cmp_u32(ts, state.next_timestamp) == Ordering::Less {
                            // Already behind our read cursor: drop outright
                            // rather than play it back out of order.
                            drop_heap_packet(&mut state, allocator, shared);
                            continue;
                        }

                        if ts != state.next_timestamp {
                            let gap_samples =
                                seq_diff_u32(ts, state.next_timestamp).max(0) as u64;
                            let gap_bytes =
                                (gap_samples * 2).min((buf.len() - filled) as u64) as usize;
                            if gap_bytes == 0 {
                                break;
                            }
                            buf[filled..filled + gap_bytes].fill(0);
                            filled += gap_bytes;
                            state.next_timestamp =
                                state.next_timestamp.wrapping_add((gap_bytes / 2) as u32);
                            continue;
                        }

                        state.heap.remove_min();
                        let len = allocator.with(handle, |p| p.samples().len()) as u64;
                        state.total_bytes = state.total_bytes.saturating_sub(len);
                        state.current = Some((handle, 0));
                        cursor.publish(state.next_timestamp);
                        shared.space_available.notify_one();
                    }
                }
            }
        }
    }

    filled
}

fn drop_heap_packet(
    state: &mut crate::state::PlayerState,
    allocator: &PacketAllocator,
    shared: &PlaybackShared,
) {
    if let Some((_, handle)) = state.heap.remove_min() {
        let len = allocator.with(handle, |p| p.samples().len()) as u64;
        state.total_bytes = state.total_bytes.saturating_sub(len);
        allocator.free(handle);
        shared.space_available.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Watermarks;

    fn test_shared() -> Arc<PlaybackShared> {
        // Byte-level watermarks tiny enough for hand-built single-packet
        // fixtures, rather than the spec's millisecond-scale defaults.
        let watermarks = Watermarks {
            readahead_bytes: 8,
            minbuffer_bytes: 4,
            maxbuffer_bytes: 64,
        };
        Arc::new(PlaybackShared::new(watermarks))
    }

    #[test]
    fn stays_buffering_until_readahead_reached() {
        let shared = test_shared();
        let allocator = Arc::new(PacketAllocator::new());
        let cursor = Arc::new(PlaybackCursor::new());
        let mut callback = make_pull_callback(shared.clone(), allocator, cursor.clone(), None);

        let mut buf = [0xAAu8; 64];
        let n = callback(&mut buf);
        assert_eq!(n, 0);
        assert!(!cursor.is_active());
    }

    #[test]
    fn activates_and_plays_once_readahead_is_met() {
        let shared = test_shared();
        let allocator = Arc::new(PacketAllocator::new());
        let cursor = Arc::new(PlaybackCursor::new());

        let handle = allocator.alloc();
        allocator.with_mut(handle, |p| {
            p.timestamp = 0;
            p.sample_count = 4;
            p.data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        });
        {
            let mut state = shared.state.lock();
            state.heap.insert(0, handle);
            state.total_bytes = 8;
        }

        let mut callback = make_pull_callback(shared.clone(), allocator, cursor.clone(), None);
        let mut buf = [0u8; 8];
        let n = callback(&mut buf);
        assert_eq!(n, 8);
        assert_eq!(&buf, &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(cursor.is_active());
    }

    #[test]
    fn gap_ahead_of_cursor_is_infilled_with_silence() {
        let shared = test_shared();
        let allocator = Arc::new(PacketAllocator::new());
        let cursor = Arc::new(PlaybackCursor::new());

        let handle = allocator.alloc();
        allocator.with_mut(handle, |p| {
            p.timestamp = 4;
            p.sample_count = 2;
            p.data[..4].copy_from_slice(&[9, 9, 9, 9]);
        });
        {
            let mut state = shared.state.lock();
            state.state = PlaybackState::Active;
            state.next_timestamp = 0;
            state.heap.insert(4, handle);
            state.total_bytes = 4;
        }
        cursor.set_active(true);

        let mut callback = make_pull_callback(shared.clone(), allocator, cursor, None);
        let mut buf = [0xFFu8; 8];
        let n = callback(&mut buf);
        assert_eq!(n, 8);
        assert_eq!(&buf[..8], &[0, 0, 0, 0, 9, 9, 9, 9]);
    }
}
