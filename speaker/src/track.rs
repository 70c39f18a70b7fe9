//! Track lifecycle state (spec §3, §4.6): "a per-track record: buffer,
//! end-of-input flag, playable flag, finished-reported flag, cumulative
//! sample count played." Plus the table-level invariant: "at most one
//! *current* and one *pending* playing track at a time."

use core_buffers::TrackBuffer;
use core_proto::TrackId;
use std::collections::HashMap;
use std::os::unix::net::UnixStream;
use std::thread::JoinHandle;

/// One track's buffered-PCM state and connection bookkeeping.
pub struct Track {
    pub id: TrackId,
    /// Set once the decoder's connection has completed the handshake.
    /// `None` means the track was named by a `PLAY`/`CANCEL` before any
    /// decoder connected.
    pub connected: bool,
    /// The accepted connection, kept only so `CANCEL`/shutdown can force
    /// the per-track reader thread's blocking read to unblock.
    pub input: Option<UnixStream>,
    pub buffer: TrackBuffer,
    pub eof: bool,
    pub playable: bool,
    pub finished_reported: bool,
    pub samples_played: u64,
    pub reader_thread: Option<JoinHandle<()>>,
}

impl Track {
    fn new(id: TrackId) -> Self {
        Track {
            id,
            connected: false,
            input: None,
            buffer: TrackBuffer::new(core_buffers::DEFAULT_CAPACITY),
            eof: false,
            playable: false,
            finished_reported: false,
            samples_played: 0,
            reader_thread: None,
        }
    }

    /// A track that has never had a byte delivered to the backend yet
    /// (spec §4.6 `CANCEL`: "if it had not yet begun, reply STILLBORN").
    pub fn has_begun(&self) -> bool {
        self.samples_played > 0
    }
}

/// At most one current and one pending track (spec §3 invariant),
/// enforced by the caller (the `PLAY` handler) rather than by this type
/// itself — `TrackTable` is a plain container; `engine.rs` is where the
/// invariant is checked and acted on.
#[derive(Default)]
pub struct TrackTable {
    tracks: HashMap<TrackId, Track>,
    pub current: Option<TrackId>,
    pub pending: Option<TrackId>,
    pub paused: bool,
}

impl TrackTable {
    pub fn new() -> Self {
        TrackTable::default()
    }

    /// Fetch the track record, creating it if this is the first mention
    /// of `id` — from either an inbound connection or a control command
    /// (spec §3: "created on either an arriving inbound connection or a
    /// control command naming it, whichever arrives first").
    pub fn get_or_create(&mut self, id: &TrackId) -> &mut Track {
        self.tracks
            .entry(id.clone())
            .or_insert_with(|| Track::new(id.clone()))
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn get_mut(&mut self, id: &TrackId) -> Option<&mut Track> {
        self.tracks.get_mut(id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.tracks.contains_key(id)
    }

    pub fn remove(&mut self, id: &TrackId) -> Option<Track> {
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        if self.pending.as_ref() == Some(id) {
            self.pending = None;
        }
        self.tracks.remove(id)
    }

    /// Promote the pending track to current (spec §4.6 gapless
    /// transition: "the engine destroys [the drained current track] and
    /// promotes the pending track in a single transition").
    pub fn promote_pending(&mut self) {
        self.current = self.pending.take();
    }

    /// Whether the backend should currently be emitting audio: a current
    /// track exists, is playable, and the engine is not paused (spec
    /// §4.6: "Playback is enabled only when a current track exists, is
    /// playable, and the engine is not paused").
    pub fn playback_enabled(&self) -> bool {
        if self.paused {
            return false;
        }
        match &self.current {
            Some(id) => self.tracks.get(id).is_some_and(|t| t.playable),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TrackId {
        TrackId::new(s).unwrap()
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut table = TrackTable::new();
        table.get_or_create(&id("t1"));
        assert!(table.contains(&id("t1")));
        table.get_or_create(&id("t1"));
        assert_eq!(table.tracks.len(), 1);
    }

    #[test]
    fn removing_current_clears_the_slot() {
        let mut table = TrackTable::new();
        table.get_or_create(&id("t1"));
        table.current = Some(id("t1"));
        table.remove(&id("t1"));
        assert!(table.current.is_none());
    }

    #[test]
    fn promote_pending_moves_slot_and_empties_pending() {
        let mut table = TrackTable::new();
        table.get_or_create(&id("t1"));
        table.get_or_create(&id("t2"));
        table.current = Some(id("t1"));
        table.pending = Some(id("t2"));
        table.promote_pending();
        assert_eq!(table.current, Some(id("t2")));
        assert!(table.pending.is_none());
    }

    #[test]
    fn playback_disabled_while_paused_even_if_playable() {
        let mut table = TrackTable::new();
        table.get_or_create(&id("t1")).playable = true;
        table.current = Some(id("t1"));
        assert!(table.playback_enabled());
        table.paused = true;
        assert!(!table.playback_enabled());
    }
}
