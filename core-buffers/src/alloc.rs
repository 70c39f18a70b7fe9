//! Packet allocator (spec §4.2, C3): "a free list of fixed-size packet
//! records and a bump pointer into a slab of ~1024 such records; on
//! exhaustion of both, allocate a fresh slab." Rationale: "bounding
//! working-set size under steady-state packet churn and eliminating
//! allocator pressure from the real-time path."
//!
//! Per spec §9's "Pointer-graph structures to arena-and-index" redesign
//! note, this is an arena (`Vec<Packet>`) indexed by a stable handle
//! rather than a pointer-linked free-list union.

use parking_lot::Mutex;

/// Maximum samples a single received packet can carry (spec §3: "inline
/// sample data up to a fixed maximum (~2048 samples for 44.1 kHz
/// stereo)").
pub const MAX_PACKET_SAMPLES: usize = 2048;

/// Idle marker bit, derived from the RTP marker bit on receive (spec §3).
pub const FLAG_IDLE: u8 = 0x01;

/// A received packet record (spec §3, C8/C2/C3 "Received packet").
#[derive(Clone)]
pub struct Packet {
    pub timestamp: u32,
    pub sample_count: u16,
    pub flags: u8,
    pub data: [u8; MAX_PACKET_SAMPLES * 2],
}

impl Packet {
    fn empty() -> Self {
        Packet {
            timestamp: 0,
            sample_count: 0,
            flags: 0,
            data: [0u8; MAX_PACKET_SAMPLES * 2],
        }
    }

    pub fn samples(&self) -> &[u8] {
        &self.data[..self.sample_count as usize * 2]
    }

    pub fn samples_mut(&mut self) -> &mut [u8] {
        let n = self.sample_count as usize * 2;
        &mut self.data[..n]
    }

    pub fn is_idle(&self) -> bool {
        self.flags & FLAG_IDLE != 0
    }
}

/// A stable index into the allocator's slab (spec §9: "array-backed min-
/// heap indexed by a stable handle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHandle(pub(crate) u32);

const SLAB_GROWTH: usize = 1024;

struct Inner {
    slab: Vec<Packet>,
    free_list: Vec<u32>,
}

/// Slab/free-list allocator for `Packet` records, guarded by a single
/// leaf mutex (spec §5: "allocator mutex is a leaf (never held while
/// acquiring any other)").
pub struct PacketAllocator {
    inner: Mutex<Inner>,
}

impl PacketAllocator {
    pub fn new() -> Self {
        PacketAllocator {
            inner: Mutex::new(Inner {
                slab: Vec::new(),
                free_list: Vec::new(),
            }),
        }
    }

    /// Allocate a packet record, recycling from the free list first and
    /// growing the slab by `SLAB_GROWTH` records only on exhaustion.
    pub fn alloc(&self) -> PacketHandle {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.free_list.pop() {
            return PacketHandle(idx);
        }

        let start = inner.slab.len();
        inner.slab.resize_with(start + SLAB_GROWTH, Packet::empty);
        let idx = start as u32;
        // The freshly grown slab's remaining slots go straight to the free
        // list so the next SLAB_GROWTH-1 allocations are pure free-list pops.
        for i in (start + 1..start + SLAB_GROWTH).rev() {
            inner.free_list.push(i as u32);
        }
        PacketHandle(idx)
    }

    pub fn free(&self, handle: PacketHandle) {
        let mut inner = self.inner.lock();
        inner.free_list.push(handle.0);
    }

    pub fn with<R>(&self, handle: PacketHandle, f: impl FnOnce(&Packet) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.slab[handle.0 as usize])
    }

    pub fn with_mut<R>(&self, handle: PacketHandle, f: impl FnOnce(&mut Packet) -> R) -> R {
        let mut inner = self.inner.lock();
        f(&mut inner.slab[handle.0 as usize])
    }

    pub fn slab_len(&self) -> usize {
        self.inner.lock().slab.len()
    }
}

impl Default for PacketAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_free_reuse() {
        let alloc = PacketAllocator::new();
        let h1 = alloc.alloc();
        alloc.with_mut(h1, |p| p.timestamp = 42);
        alloc.free(h1);

        let h2 = alloc.alloc();
        // Freed handle should be recycled before the slab grows further.
        assert_eq!(h1, h2);
    }

    #[test]
    fn grows_in_slabs_of_1024() {
        let alloc = PacketAllocator::new();
        let mut handles = Vec::new();
        for _ in 0..1500 {
            handles.push(alloc.alloc());
        }
        assert_eq!(alloc.slab_len(), 2048);
    }
}
