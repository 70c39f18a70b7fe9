//! Playback scheduler (spec §4.3, C4): paces a backend that does not
//! self-clock its output (RTP over a plain UDP socket, a subprocess pipe)
//! against a monotonic wall-clock reference, so the long-run emission
//! rate matches `rate * channels` samples per second regardless of pause
//! state.
//!
//! Grounded in `bass-system-clock/src/timer.rs`'s `Instant`-anchored
//! sleep loop, generalized here from a fixed-interval tick to a
//! rate-governed schedule that also tracks a sample-index timestamp.

use core_proto::SampleFormat;
use std::thread;
use std::time::{Duration, Instant};

/// Default rate-limit slack: how far ahead of wall-clock the scheduler is
/// allowed to run before it sleeps (spec §4.3 step 3).
pub const DEFAULT_DELAY_THRESHOLD: Duration = Duration::from_millis(200);

/// Produces a wall-clock schedule for packet emission and tracks the
/// 64-bit sample-index timestamp the RTP layer truncates onto the wire
/// (spec §3 "Playback schedule state").
pub struct PlaybackScheduler {
    rate_channels_per_sec: u64,
    channels: u64,
    timestamp: u64,
    anchor: Option<Instant>,
    reactivated: bool,
    delay_threshold: Duration,
    marker_pending: bool,
}

impl PlaybackScheduler {
    pub fn new(format: SampleFormat) -> Self {
        Self::with_delay_threshold(format, DEFAULT_DELAY_THRESHOLD)
    }

    pub fn with_delay_threshold(format: SampleFormat, delay_threshold: Duration) -> Self {
        PlaybackScheduler {
            rate_channels_per_sec: format.rate as u64 * format.channels as u64,
            channels: format.channels as u64,
            timestamp: 0,
            anchor: None,
            // Starts deactivated: the first synchronize() call anchors to "now".
            reactivated: true,
            delay_threshold,
            marker_pending: true,
        }
    }

    /// Current 64-bit sample-index timestamp.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Low 32 bits, the RFC3550 wire truncation (spec §3).
    pub fn rtp_timestamp(&self) -> u32 {
        self.timestamp as u32
    }

    /// Mark that output is resuming after any period of deactivation
    /// (pause, buffer underrun, backend stop/start) — spec §3: "set when
    /// output resumes after any period of deactivation". The next
    /// `synchronize` call re-anchors to wall-clock time instead of rate-
    /// limiting against the old anchor.
    pub fn mark_reactivated(&mut self) {
        self.reactivated = true;
    }

    /// Mark that the RTP marker bit should be set on the next packet
    /// (spec §4.3: "The resume boundary is marked by a flag that causes
    /// the RTP marker bit to be set on the next transmitted packet").
    pub fn mark_resumed(&mut self) {
        self.marker_pending = true;
    }

    /// Consume the pending-marker flag; the caller (RTP transmitter) sets
    /// the wire marker bit iff this returns `true`, once per packet.
    pub fn take_marker_pending(&mut self) -> bool {
        std::mem::take(&mut self.marker_pending)
    }

    /// Step 1-3 of spec §4.3's algorithm: called before producing each
    /// packet. Sleeps as needed so the caller emits at the configured
    /// rate; never advances the timestamp past what `update` reports.
    pub fn synchronize(&mut self) {
        loop {
            let now = Instant::now();

            if self.reactivated {
                match self.anchor {
                    None => {
                        self.anchor = Some(now);
                    }
                    Some(anchor) => {
                        if now < anchor {
                            // Paradoxical: wall-clock claims to be behind the anchor.
                            thread::sleep(anchor - now);
                            continue;
                        }
                        let delta = now - anchor;
                        let advance = (delta.as_micros() as u64 * self.rate_channels_per_sec)
                            / 1_000_000;
                        // Round down to a channel boundary (spec §4.3 step 2).
                        let advance = (advance / self.channels) * self.channels;
                        self.timestamp = self.timestamp.wrapping_add(advance);
                        self.anchor = Some(now);
                    }
                }
                self.reactivated = false;
                return;
            }

            let anchor = self.anchor.unwrap_or(now);
            if anchor > now {
                let ahead = anchor - now;
                if ahead > self.delay_threshold {
                    let sleep_for = ahead - self.delay_threshold / 2;
                    thread::sleep(sleep_for);
                    continue;
                }
            }
            return;
        }
    }

    /// Step after sending: advance the anchor by `samples_sent / (rate *
    /// channels)` seconds, and the timestamp by `samples_sent` (spec
    /// §4.3, §8's round-trip property).
    pub fn update(&mut self, samples_sent: u32) {
        let seconds = samples_sent as f64 / self.rate_channels_per_sec as f64;
        let anchor = self.anchor.unwrap_or_else(Instant::now);
        self.anchor = Some(anchor + Duration::from_secs_f64(seconds));
        self.timestamp = self.timestamp.wrapping_add(samples_sent as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_advances_anchor_by_exact_duration() {
        let format = SampleFormat::L16_STEREO_44100;
        let mut sched = PlaybackScheduler::new(format);
        sched.synchronize();
        let before = sched.anchor.unwrap();

        let samples = 4410u32; // 0.05s at 44100*2 samples/sec... see below
        sched.update(samples);
        let after = sched.anchor.unwrap();

        let expected_secs = samples as f64 / (44_100.0 * 2.0);
        let got_secs = (after - before).as_secs_f64();
        assert!((got_secs - expected_secs).abs() < 1e-9);
        assert_eq!(sched.timestamp(), samples as u64);
    }

    #[test]
    fn resume_after_long_pause_does_not_retreat_timestamp() {
        let format = SampleFormat::L16_STEREO_44100;
        let mut sched = PlaybackScheduler::new(format);
        sched.synchronize();
        sched.update(44_100 * 2); // 1 second of audio accounted for
        let ts_before = sched.timestamp();

        // Simulate a long pause: anchor drifts far behind "now".
        sched.anchor = Some(Instant::now() - Duration::from_secs(5));
        sched.mark_reactivated();
        sched.synchronize();

        assert!(sched.timestamp() >= ts_before);
    }

    #[test]
    fn marker_pending_is_consumed_once() {
        let format = SampleFormat::L16_MONO_44100;
        let mut sched = PlaybackScheduler::new(format);
        assert!(sched.take_marker_pending());
        assert!(!sched.take_marker_pending());
        sched.mark_resumed();
        assert!(sched.take_marker_pending());
        assert!(!sched.take_marker_pending());
    }
}
