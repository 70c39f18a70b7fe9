//! Fixed-capacity ring buffer (spec §4.1, C1): "Fixed-capacity byte buffer
//! with start/length representation... Write and read MAY be called
//! concurrently provided the buffer's length and start are updated with
//! ordering discipline."
//!
//! Built on `ringbuf::HeapRb`, the same lock-free SPSC ring the teacher
//! uses for its own audio path (`bass-rtp/src/input/stream.rs`), re-exposed
//! as the three operations the spec actually calls for: `write_from`,
//! `peek_contiguous`, `consume`.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::io::{self, Read};

/// ~6s of 44.1kHz 16-bit stereo audio (spec §3).
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// A single-producer single-consumer byte ring buffer for one track's
/// inbound PCM stream.
pub struct TrackBuffer {
    producer: HeapProd<u8>,
    consumer: HeapCons<u8>,
    capacity: usize,
}

impl TrackBuffer {
    pub fn new(capacity: usize) -> Self {
        let rb = HeapRb::<u8>::new(capacity);
        let (producer, consumer) = rb.split();
        TrackBuffer {
            producer,
            consumer,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered, `0..=capacity` (spec invariant).
    pub fn occupancy(&self) -> usize {
        self.consumer.occupied_len()
    }

    pub fn is_full(&self) -> bool {
        self.producer.vacant_len() == 0
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }

    /// Free bytes right now, `0..=capacity`. Lets a producer cap a
    /// single read so it never overruns the buffer's free region.
    pub fn vacant_len(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Perform one non-blocking read from `reader` into the buffer's free
    /// region, returning the number of bytes actually written. Never
    /// blocks the caller beyond what `reader.read` itself does; a
    /// `WouldBlock` error is folded into `Ok(0)` so callers can treat "no
    /// data yet" uniformly.
    pub fn write_from(&mut self, reader: &mut impl Read) -> io::Result<usize> {
        let vacant = self.producer.vacant_len();
        if vacant == 0 {
            return Ok(0);
        }

        let mut staging = vec![0u8; vacant];
        match reader.read(&mut staging) {
            Ok(0) => Ok(0),
            Ok(n) => Ok(self.producer.push_slice(&staging[..n])),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// The largest contiguous readable span right now. May be shorter than
    /// total occupancy if the buffer has wrapped.
    pub fn peek_contiguous(&self) -> &[u8] {
        self.consumer.as_slices().0
    }

    /// Advance the read cursor past `n` already-consumed bytes.
    pub fn consume(&mut self, n: usize) {
        self.consumer.skip(n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_then_read_roundtrip() {
        let mut buf = TrackBuffer::new(16);
        let mut src = Cursor::new(vec![1, 2, 3, 4]);
        let written = buf.write_from(&mut src).unwrap();
        assert_eq!(written, 4);
        assert_eq!(buf.occupancy(), 4);

        let span = buf.peek_contiguous().to_vec();
        assert_eq!(span, vec![1, 2, 3, 4]);
        buf.consume(span.len());
        assert_eq!(buf.occupancy(), 0);
    }

    #[test]
    fn full_buffer_rejects_further_writes() {
        let mut buf = TrackBuffer::new(4);
        let mut src = Cursor::new(vec![1, 2, 3, 4, 5, 6]);
        let written = buf.write_from(&mut src).unwrap();
        assert_eq!(written, 4);
        assert!(buf.is_full());

        let mut more = Cursor::new(vec![9]);
        let written2 = buf.write_from(&mut more).unwrap();
        assert_eq!(written2, 0);
    }

    #[test]
    fn empty_buffer_has_empty_contiguous_span() {
        let buf = TrackBuffer::new(8);
        assert!(buf.peek_contiguous().is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn capacity_one_still_functions() {
        let mut buf = TrackBuffer::new(1);
        let mut src = Cursor::new(vec![7, 8]);
        let written = buf.write_from(&mut src).unwrap();
        assert_eq!(written, 1);
        assert!(buf.is_full());
        buf.consume(1);
        assert!(buf.is_empty());
    }

    #[test]
    fn no_byte_lost_or_duplicated_across_wraparound() {
        // A small capacity relative to total bytes pushed forces the
        // underlying ring to wrap repeatedly; writing 3 and fully draining
        // 3 each round walks the write/read cursors around the ring many
        // times over, exercising peek_contiguous/consume at every wrap
        // boundary (capacity 4 is not a multiple of the 3-byte chunk).
        let mut buf = TrackBuffer::new(4);
        let mut expected = Vec::new();
        let mut actual = Vec::new();

        for round in 0u8..200 {
            let chunk = vec![round, round.wrapping_add(1), round.wrapping_add(2)];
            expected.extend_from_slice(&chunk);

            let mut src = Cursor::new(chunk);
            let written = buf.write_from(&mut src).unwrap();
            assert_eq!(written, 3);

            let mut drained = 0;
            while drained < 3 {
                let span = buf.peek_contiguous().to_vec();
                assert!(!span.is_empty());
                actual.extend_from_slice(&span);
                buf.consume(span.len());
                drained += span.len();
            }
        }
        assert_eq!(expected, actual);
        assert!(buf.is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use std::io::Cursor;

    proptest! {
        /// For any sequence of writes and drains against a small ring, every
        /// byte pushed in comes back out exactly once, in order, and
        /// occupancy never exceeds the ring's declared capacity.
        #[test]
        fn no_byte_lost_or_duplicated_for_random_write_drain_sequences(
            capacity in 1usize..64,
            chunks in vec(vec(any::<u8>(), 0..32), 0..64),
        ) {
            let mut buf = TrackBuffer::new(capacity);
            let mut expected = Vec::new();
            let mut actual = Vec::new();

            for chunk in chunks {
                let mut src = Cursor::new(chunk.clone());
                let written = buf.write_from(&mut src).unwrap();
                prop_assert!(written <= chunk.len());
                prop_assert!(buf.occupancy() <= capacity);
                expected.extend_from_slice(&chunk[..written]);

                // Drain whatever fraction happens to be contiguous this
                // round so the cursor wraps unevenly, same as real usage.
                let span_len = buf.peek_contiguous().len();
                if span_len > 0 {
                    let span = buf.peek_contiguous()[..span_len].to_vec();
                    actual.extend_from_slice(&span);
                    buf.consume(span_len);
                }
            }

            // Drain whatever remains after the chunk loop.
            loop {
                let span_len = buf.peek_contiguous().len();
                if span_len == 0 {
                    break;
                }
                let span = buf.peek_contiguous()[..span_len].to_vec();
                actual.extend_from_slice(&span);
                buf.consume(span_len);
            }

            prop_assert_eq!(expected, actual);
            prop_assert!(buf.is_empty());
        }

        /// A full buffer never accepts more bytes than its declared
        /// capacity can hold, whatever that capacity is.
        #[test]
        fn occupancy_never_exceeds_capacity(
            capacity in 1usize..256,
            chunk_len in 0usize..512,
        ) {
            let mut buf = TrackBuffer::new(capacity);
            let chunk = vec![0xABu8; chunk_len];
            let mut src = Cursor::new(chunk);
            let written = buf.write_from(&mut src).unwrap();
            prop_assert!(written <= capacity);
            prop_assert!(buf.occupancy() <= capacity);
        }
    }
}
