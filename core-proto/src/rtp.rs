//! RTP header parsing and building (RFC 3550), restricted to the payload
//! types this system carries: L16 stereo (10) and L16 mono (11) at
//! 44.1kHz, 16-bit signed big-endian samples (spec §6).

use crate::error::ProtoError;
use rand::Rng;

/// RTP payload type this stream carries. Anything else is a fatal decode
/// error at the receiver (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadType {
    L16Stereo44100,
    L16Mono44100,
}

impl PayloadType {
    pub const fn wire_value(self) -> u8 {
        match self {
            PayloadType::L16Stereo44100 => 10,
            PayloadType::L16Mono44100 => 11,
        }
    }

    pub const fn channels(self) -> u16 {
        match self {
            PayloadType::L16Stereo44100 => 2,
            PayloadType::L16Mono44100 => 1,
        }
    }

    pub fn from_wire(value: u8) -> Result<Self, ProtoError> {
        match value {
            10 => Ok(PayloadType::L16Stereo44100),
            11 => Ok(PayloadType::L16Mono44100),
            other => Err(ProtoError::UnsupportedPayloadType(other)),
        }
    }
}

/// Parsed or constructed RTP header (12 bytes, no CSRC list — `csrc_count`
/// is always 0 on this wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

pub const RTP_HEADER_LEN: usize = 12;

impl RtpHeader {
    pub fn parse(data: &[u8]) -> Result<Self, ProtoError> {
        if data.len() < RTP_HEADER_LEN {
            return Err(ProtoError::Truncated {
                need: RTP_HEADER_LEN,
                have: data.len(),
            });
        }

        let byte0 = data[0];
        let version = (byte0 >> 6) & 0x03;
        if version != 2 {
            return Err(ProtoError::UnsupportedVersion(version));
        }

        let padding = (byte0 & 0x20) != 0;
        let extension = (byte0 & 0x10) != 0;
        let csrc_count = byte0 & 0x0F;

        let byte1 = data[1];
        let marker = (byte1 & 0x80) != 0;
        let payload_type = byte1 & 0x7F;

        let sequence = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        Ok(RtpHeader {
            version,
            padding,
            extension,
            csrc_count,
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
        })
    }

    pub fn header_size(&self) -> usize {
        RTP_HEADER_LEN + self.csrc_count as usize * 4
    }

    pub fn encode(&self, buffer: &mut [u8]) -> usize {
        debug_assert!(buffer.len() >= RTP_HEADER_LEN);

        let byte0 = (self.version << 6)
            | if self.padding { 0x20 } else { 0 }
            | if self.extension { 0x10 } else { 0 }
            | (self.csrc_count & 0x0F);
        let byte1 = if self.marker { 0x80 } else { 0 } | (self.payload_type & 0x7F);

        buffer[0] = byte0;
        buffer[1] = byte1;
        buffer[2..4].copy_from_slice(&self.sequence.to_be_bytes());
        buffer[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buffer[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        RTP_HEADER_LEN
    }
}

/// A parsed packet: header plus a borrowed view of its payload.
#[derive(Debug)]
pub struct RtpPacket<'a> {
    pub header: RtpHeader,
    pub payload: &'a [u8],
}

impl<'a> RtpPacket<'a> {
    /// Parse a packet, rejecting the extension bit outright (spec §4.7:
    /// "Drop packets with the extension bit set").
    pub fn parse(data: &'a [u8]) -> Result<Self, ProtoError> {
        let header = RtpHeader::parse(data)?;
        if header.extension {
            return Err(ProtoError::ExtensionNotSupported);
        }

        let offset = header.header_size();
        if offset > data.len() {
            return Err(ProtoError::Truncated {
                need: offset,
                have: data.len(),
            });
        }

        let payload_end = if header.padding && !data.is_empty() {
            let padding_len = data[data.len() - 1] as usize;
            if padding_len > data.len() - offset {
                return Err(ProtoError::Truncated {
                    need: offset + padding_len,
                    have: data.len(),
                });
            }
            data.len() - padding_len
        } else {
            data.len()
        };

        Ok(RtpPacket {
            header,
            payload: &data[offset..payload_end],
        })
    }

    /// Number of samples (not frames) carried, given the wire's 16-bit
    /// big-endian encoding.
    pub fn sample_count(&self) -> usize {
        self.payload.len() / 2
    }
}

/// Stateful builder for the transmit side: owns sequence/timestamp/ssrc
/// and serializes one packet at a time into a reused buffer.
pub struct RtpPacketBuilder {
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
    payload_type: u8,
    buffer: Vec<u8>,
}

/// Conservative payload budget: MTU minus IPv4/UDP headers minus a safety
/// margin (spec §4.5: "MTU − UDP − IP − safety ... empirically ~1400
/// bytes").
pub const MAX_PACKET_BYTES: usize = 1500;

impl RtpPacketBuilder {
    /// Construct with a cryptographically-irrelevant but well-distributed
    /// random initial sequence/timestamp/ssrc (spec §4.5: "sequence number
    /// ... random initial value"; "timestamp ... random initial offset";
    /// "SSRC ... random per process").
    pub fn new(payload_type: PayloadType) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            ssrc: rng.gen(),
            sequence: rng.gen(),
            timestamp: rng.gen(),
            payload_type: payload_type.wire_value(),
            buffer: vec![0u8; MAX_PACKET_BYTES],
        }
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    /// Build one packet from a big-endian payload, advancing sequence by 1
    /// and timestamp by `samples_per_packet` (spec §3/§4.5/§8: "consecutive
    /// packets have seq_{k+1} = seq_k + 1 mod 2^16 and timestamp_{k+1} =
    /// timestamp_k + samples_k").
    pub fn build_packet(&mut self, payload: &[u8], samples_per_packet: u32, marker: bool) -> &[u8] {
        let header = RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker,
            payload_type: self.payload_type,
            sequence: self.sequence,
            timestamp: self.timestamp,
            ssrc: self.ssrc,
        };

        let header_len = header.encode(&mut self.buffer);
        let total_len = header_len + payload.len();
        if total_len > self.buffer.len() {
            self.buffer.resize(total_len, 0);
        }
        self.buffer[header_len..total_len].copy_from_slice(payload);

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(samples_per_packet);

        &self.buffer[..total_len]
    }
}

/// Swap a buffer of native-endian 16-bit samples into big-endian wire
/// order (spec §4.5: "On little-endian hosts, a byte-swap pass is
/// performed before transmission"), in place. A no-op on big-endian hosts.
pub fn host_to_wire_samples(samples: &mut [u8]) {
    if cfg!(target_endian = "little") {
        for pair in samples.chunks_exact_mut(2) {
            pair.swap(0, 1);
        }
    }
}

/// Inverse of [`host_to_wire_samples`] for the receive side.
pub fn wire_to_host_samples(samples: &mut [u8]) {
    host_to_wire_samples(samples);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = RtpHeader {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: true,
            payload_type: 10,
            sequence: 42,
            timestamp: 12345,
            ssrc: 0xCAFEBABE,
        };

        let mut buffer = [0u8; 12];
        header.encode(&mut buffer);
        let parsed = RtpHeader::parse(&buffer).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rejects_bad_version() {
        let mut data = [0u8; 12];
        data[0] = 0x00; // version 0
        assert!(matches!(
            RtpHeader::parse(&data),
            Err(ProtoError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn extension_bit_rejected_at_packet_level() {
        let mut data = [0u8; 12];
        data[0] = 0x90; // version 2, extension set
        data[1] = 10;
        assert!(matches!(
            RtpPacket::parse(&data),
            Err(ProtoError::ExtensionNotSupported)
        ));
    }

    #[test]
    fn builder_advances_sequence_and_timestamp() {
        let mut builder = RtpPacketBuilder::new(PayloadType::L16Stereo44100);
        let seq0 = builder.sequence();
        let ts0 = builder.timestamp();
        let payload = [0u8; 8];
        let packet = builder.build_packet(&payload, 4, false).to_vec();
        let parsed = RtpPacket::parse(&packet).unwrap();
        assert_eq!(parsed.header.sequence, seq0);
        assert_eq!(parsed.header.timestamp, ts0);
        assert_eq!(builder.sequence(), seq0.wrapping_add(1));
        assert_eq!(builder.timestamp(), ts0.wrapping_add(4));
    }

    #[test]
    fn marker_bit_set_on_resume() {
        let mut builder = RtpPacketBuilder::new(PayloadType::L16Mono44100);
        let packet = builder.build_packet(&[0u8; 4], 2, true).to_vec();
        let parsed = RtpPacket::parse(&packet).unwrap();
        assert!(parsed.header.marker);
    }

    #[test]
    fn byte_swap_is_involutive() {
        let mut samples = [0x12, 0x34, 0x56, 0x78];
        host_to_wire_samples(&mut samples);
        assert_eq!(samples, [0x34, 0x12, 0x78, 0x56]);
        wire_to_host_samples(&mut samples);
        assert_eq!(samples, [0x12, 0x34, 0x56, 0x78]);
    }
}
