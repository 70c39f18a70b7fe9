//! Optional circular diagnostic dump (spec §4.7): "a pre-sized,
//! pre-zeroed memory-mapped ring ... written sample-by-sample as the
//! player decodes." Strictly a side channel for offline inspection; a
//! failure to write to it never affects playback.

use memmap2::MmapMut;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default dump depth, in seconds of audio (spec §4.7: "default ~20s").
pub const DEFAULT_DUMP_SECONDS: u64 = 20;

pub struct CircularDump {
    mmap: Mutex<MmapMut>,
    capacity: usize,
    cursor: AtomicUsize,
}

impl CircularDump {
    /// Create (or truncate) `path`, size it to `capacity_bytes`, and
    /// memory-map it zeroed.
    pub fn create(path: &Path, capacity_bytes: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity_bytes as u64)?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        mmap.fill(0);

        Ok(CircularDump {
            mmap: Mutex::new(mmap),
            capacity: capacity_bytes,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Append `bytes`, wrapping back to the start of the ring once the
    /// capacity is exhausted.
    pub fn write(&self, bytes: &[u8]) {
        if bytes.is_empty() || self.capacity == 0 {
            return;
        }
        let mut mmap = self.mmap.lock();
        let mut pos = self.cursor.load(Ordering::Relaxed);
        let mut remaining = bytes;
        while !remaining.is_empty() {
            let space = self.capacity - pos;
            let n = remaining.len().min(space);
            mmap[pos..pos + n].copy_from_slice(&remaining[..n]);
            pos += n;
            if pos == self.capacity {
                pos = 0;
            }
            remaining = &remaining[n..];
        }
        self.cursor.store(pos, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn dump_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("player-dump-test-{}-{}.raw", std::process::id(), name))
    }

    #[test]
    fn write_wraps_around_capacity() {
        let path = dump_path("wrap");
        let dump = CircularDump::create(&path, 8).unwrap();
        dump.write(&[1, 2, 3, 4, 5, 6]);
        dump.write(&[7, 8, 9, 10]);

        let bytes = std::fs::read(&path).unwrap();
        // 10 bytes written into an 8-byte ring: the final state is
        // whatever the last 8 logical bytes wrote, wrapped.
        assert_eq!(bytes.len(), 8);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn created_file_is_zeroed_up_front() {
        let path = dump_path("zeroed");
        let _dump = CircularDump::create(&path, 16).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes, vec![0u8; 16]);
        let _ = std::fs::remove_file(&path);
    }
}
