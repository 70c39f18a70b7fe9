//! Playback state (spec §4.7, §5's first mutex): the heap, its
//! buffered-byte total, and the player's Buffering/Active state, held
//! together behind one lock so a state transition and the heap mutation
//! that causes it are never observed apart.

use core_buffers::{PacketHandle, PacketHeap};
use core_proto::SampleFormat;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Target depth before first activation (spec §4.7: "~0.5s").
const READAHEAD_MS: u64 = 500;
/// Depth below which an active player drops back to Buffering (spec
/// §4.7: "~0.2s").
const MINBUFFER_MS: u64 = 200;
/// Backlog bound multiplier over readahead (spec §4.7: "4x readahead").
const MAXBUFFER_MULTIPLIER: u64 = 4;

#[derive(Debug, Clone, Copy)]
pub struct Watermarks {
    pub readahead_bytes: u64,
    pub minbuffer_bytes: u64,
    pub maxbuffer_bytes: u64,
}

impl Watermarks {
    /// `*_ms` overrides widen or shrink the spec defaults (CLI
    /// `--readahead-ms`/`--minbuffer-ms`/`--maxbuffer-ms`).
    pub fn new(
        format: SampleFormat,
        readahead_ms: Option<u64>,
        minbuffer_ms: Option<u64>,
        maxbuffer_ms: Option<u64>,
    ) -> Self {
        let bpm = format.bytes_per_ms() as u64;
        let readahead_bytes = bpm * readahead_ms.unwrap_or(READAHEAD_MS);
        let minbuffer_bytes = bpm * minbuffer_ms.unwrap_or(MINBUFFER_MS);
        let maxbuffer_bytes = match maxbuffer_ms {
            Some(ms) => bpm * ms,
            None => readahead_bytes * MAXBUFFER_MULTIPLIER,
        };
        Watermarks {
            readahead_bytes,
            minbuffer_bytes,
            maxbuffer_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Buffering,
    Active,
}

/// A packet mid-consumption: its handle plus how many payload bytes the
/// player has already copied out of it.
pub type InFlight = (PacketHandle, usize);

pub struct PlayerState {
    pub heap: PacketHeap,
    pub total_bytes: u64,
    pub state: PlaybackState,
    pub next_timestamp: u32,
    pub current: Option<InFlight>,
}

impl PlayerState {
    fn new() -> Self {
        PlayerState {
            heap: PacketHeap::new(),
            total_bytes: 0,
            state: PlaybackState::Buffering,
            next_timestamp: 0,
            current: None,
        }
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared between the queue thread (producer into the heap) and the
/// playback callback (consumer out of it). `space_available` is the
/// backlog bound's condvar (spec §4.7: intake blocks, rather than
/// drops, once the heap holds more than `maxbuffer_bytes` — see
/// DESIGN.md for why "block" was chosen over "drop-oldest").
pub struct PlaybackShared {
    pub state: Mutex<PlayerState>,
    pub space_available: Condvar,
    pub watermarks: Watermarks,
}

impl PlaybackShared {
    pub fn new(watermarks: Watermarks) -> Self {
        PlaybackShared {
            state: Mutex::new(PlayerState::default()),
            space_available: Condvar::new(),
            watermarks,
        }
    }
}

/// The player's current read position, published for the listen thread's
/// stale-timestamp check (spec §4.7: dropped "only once playback is
/// active" — before that there is no cursor to be stale against).
#[derive(Default)]
pub struct PlaybackCursor {
    active: AtomicBool,
    next_timestamp: AtomicU32,
}

impl PlaybackCursor {
    pub fn new() -> Self {
        PlaybackCursor::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub fn next_timestamp(&self) -> u32 {
        self.next_timestamp.load(Ordering::Relaxed)
    }

    pub fn publish(&self, timestamp: u32) {
        self.next_timestamp.store(timestamp, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermarks_default_to_spec_fractions_of_a_second() {
        let w = Watermarks::new(SampleFormat::L16_STEREO_44100, None, None, None);
        let bpm = SampleFormat::L16_STEREO_44100.bytes_per_ms() as u64;
        assert_eq!(w.readahead_bytes, bpm * 500);
        assert_eq!(w.minbuffer_bytes, bpm * 200);
        assert_eq!(w.maxbuffer_bytes, w.readahead_bytes * 4);
    }

    #[test]
    fn explicit_maxbuffer_override_is_not_derived() {
        let w = Watermarks::new(SampleFormat::L16_STEREO_44100, None, None, Some(10_000));
        let bpm = SampleFormat::L16_STEREO_44100.bytes_per_ms() as u64;
        assert_eq!(w.maxbuffer_bytes, bpm * 10_000);
    }

    #[test]
    fn cursor_starts_inactive() {
        let cursor = PlaybackCursor::new();
        assert!(!cursor.is_active());
        assert_eq!(cursor.next_timestamp(), 0);
    }
}
