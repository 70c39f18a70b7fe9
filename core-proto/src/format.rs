//! Process-global sample format descriptor (spec §4.4 / §6): "a
//! process-global triple `{rate, channels, bits}` plus signedness and
//! endianness".

use crate::error::ProtoError;

/// The single PCM format every backend in a given process must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleFormat {
    pub rate: u32,
    pub channels: u16,
    pub bits: u16,
    pub signed: bool,
    pub big_endian: bool,
}

impl SampleFormat {
    /// 44.1kHz 16-bit signed stereo, the format payload types 10/11 require.
    pub const L16_STEREO_44100: SampleFormat = SampleFormat {
        rate: 44_100,
        channels: 2,
        bits: 16,
        signed: true,
        big_endian: false,
    };

    pub const L16_MONO_44100: SampleFormat = SampleFormat {
        rate: 44_100,
        channels: 1,
        bits: 16,
        signed: true,
        big_endian: false,
    };

    /// Bytes per frame (one sample per channel).
    pub fn frame_bytes(&self) -> usize {
        (self.bits as usize / 8) * self.channels as usize
    }

    /// Bytes per millisecond of audio at this format.
    pub fn bytes_per_ms(&self) -> usize {
        self.frame_bytes() * self.rate as usize / 1000
    }

    /// Reject formats a backend cannot be asked to satisfy (spec §4.4: "a
    /// backend MAY fail activation if it cannot satisfy the format").
    pub fn validate(&self) -> Result<(), ProtoError> {
        if self.bits != 16 {
            return Err(ProtoError::UnsupportedFormat {
                reason: "only 16-bit samples are supported",
            });
        }
        if self.channels == 0 || self.channels > 2 {
            return Err(ProtoError::UnsupportedFormat {
                reason: "only mono or stereo are supported",
            });
        }
        if self.rate != 44_100 {
            return Err(ProtoError::UnsupportedFormat {
                reason: "only 44.1kHz is supported",
            });
        }
        Ok(())
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::L16_STEREO_44100
    }
}
