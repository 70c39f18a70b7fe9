//! Fixed-capacity structures shared by the speaker engine and the RTP
//! receiver: the per-track ring buffer (C1), the packet slab allocator
//! (C3), and the jitter buffer's min-heap (C2).
//!
//! None of this touches sockets or threads; callers own the concurrency
//! discipline (spec §5) around these structures.

pub mod alloc;
pub mod heap;
pub mod ring;

pub use alloc::{Packet, PacketAllocator, PacketHandle, FLAG_IDLE, MAX_PACKET_SAMPLES};
pub use heap::PacketHeap;
pub use ring::{TrackBuffer, DEFAULT_CAPACITY};
