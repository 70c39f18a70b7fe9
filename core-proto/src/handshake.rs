//! Decoder → speaker framing (spec §6): "32-bit native-endian length, UTF-8
//! track id of that length (no terminator), a single ack byte from the
//! speaker, then raw PCM samples ... until EOF."

use crate::error::ProtoError;
use crate::track_id::TrackId;
use std::io::{Read, Write};

/// The single byte the speaker writes back once it has associated the
/// connection with a track (spec §4.6: "writes a single acknowledgement
/// byte").
pub const ACK_BYTE: u8 = 0x06;

/// Decoder side: send the length-prefixed track id and wait for the ack.
pub fn send_handshake(mut stream: impl Read + Write, id: &TrackId) -> Result<(), ProtoError> {
    let bytes = id.as_str().as_bytes();
    stream.write_all(&(bytes.len() as u32).to_ne_bytes())?;
    stream.write_all(bytes)?;

    let mut ack = [0u8; 1];
    stream.read_exact(&mut ack)?;
    Ok(())
}

/// Speaker side: read the length-prefixed track id (not yet acking —
/// the caller acks once the track record is created/fetched).
pub fn read_track_id(mut stream: impl Read) -> Result<TrackId, ProtoError> {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_ne_bytes(len_buf) as usize;

    let mut id_buf = vec![0u8; len];
    stream.read_exact(&mut id_buf)?;
    let text = String::from_utf8(id_buf).map_err(|_| ProtoError::TrackIdNotUtf8)?;
    TrackId::new(text)
}

/// Speaker side: acknowledge a handshake once the track record exists.
pub fn send_ack(mut stream: impl Write) -> Result<(), ProtoError> {
    stream.write_all(&[ACK_BYTE])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn handshake_roundtrip() {
        let id = TrackId::new("track-one").unwrap();
        let mut wire = Vec::new();
        wire.extend_from_slice(&(id.as_str().len() as u32).to_ne_bytes());
        wire.extend_from_slice(id.as_str().as_bytes());

        let mut cursor = Cursor::new(wire);
        let parsed = read_track_id(&mut cursor).unwrap();
        assert_eq!(parsed, id);
    }
}
