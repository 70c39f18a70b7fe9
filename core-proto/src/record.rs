//! Speaker ↔ server framing (spec §4.6, §6): "a fixed-layout record
//! containing a message kind (small integer), a numeric payload (seconds
//! or status code), and a fixed-size track id field."
//!
//! A hand-rolled byte codec rather than `serde` — the wire format is
//! narrow and fixed by spec, matching the teacher's own preference for
//! explicit byte-level codecs (see `rtp.rs`'s `RtpHeader::encode`/`parse`).

use crate::error::ProtoError;
use crate::track_id::{TrackId, MAX_TRACK_ID_LEN};
use std::io::{Read, Write};

const TRACK_ID_FIELD_LEN: usize = MAX_TRACK_ID_LEN + 1; // +1 for the NUL pad byte
const RECORD_LEN: usize = 1 + 4 + TRACK_ID_FIELD_LEN;

/// Messages the controlling server sends to the speaker engine (spec §4.6
/// table "Control message taxonomy (to engine)").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Play(TrackId),
    Pause,
    Resume,
    Cancel(TrackId),
    Reload,
}

/// Messages the speaker engine sends to the controlling server (spec §4.6
/// table "Messages from engine").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    Ready,
    Arrived(TrackId),
    Playing { id: TrackId, elapsed_secs: u32 },
    Paused { id: TrackId, elapsed_secs: u32 },
    Finished(TrackId),
    Stillborn(TrackId),
    Unknown(TrackId),
}

mod kind {
    pub const PLAY: u8 = 1;
    pub const PAUSE: u8 = 2;
    pub const RESUME: u8 = 3;
    pub const CANCEL: u8 = 4;
    pub const RELOAD: u8 = 5;
    pub const READY: u8 = 16;
    pub const ARRIVED: u8 = 17;
    pub const PLAYING: u8 = 18;
    pub const PAUSED: u8 = 19;
    pub const FINISHED: u8 = 20;
    pub const STILLBORN: u8 = 21;
    pub const UNKNOWN: u8 = 22;
}

fn encode_id_field(id: Option<&TrackId>, out: &mut [u8; TRACK_ID_FIELD_LEN]) {
    out.fill(0);
    if let Some(id) = id {
        let bytes = id.as_str().as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
    }
}

fn decode_id_field(field: &[u8; TRACK_ID_FIELD_LEN]) -> Result<TrackId, ProtoError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let text = std::str::from_utf8(&field[..end]).map_err(|_| ProtoError::TrackIdNotUtf8)?;
    TrackId::new(text)
}

fn write_record(mut w: impl Write, tag: u8, payload: u32, id: Option<&TrackId>) -> Result<(), ProtoError> {
    let mut id_field = [0u8; TRACK_ID_FIELD_LEN];
    encode_id_field(id, &mut id_field);

    let mut record = [0u8; RECORD_LEN];
    record[0] = tag;
    record[1..5].copy_from_slice(&payload.to_be_bytes());
    record[5..].copy_from_slice(&id_field);

    w.write_all(&record)?;
    Ok(())
}

fn read_record(mut r: impl Read) -> Result<(u8, u32, [u8; TRACK_ID_FIELD_LEN]), ProtoError> {
    let mut record = [0u8; RECORD_LEN];
    r.read_exact(&mut record)?;

    let tag = record[0];
    let payload = u32::from_be_bytes([record[1], record[2], record[3], record[4]]);
    let mut id_field = [0u8; TRACK_ID_FIELD_LEN];
    id_field.copy_from_slice(&record[5..]);

    Ok((tag, payload, id_field))
}

impl ServerMessage {
    pub fn write(&self, w: impl Write) -> Result<(), ProtoError> {
        match self {
            ServerMessage::Play(id) => write_record(w, kind::PLAY, 0, Some(id)),
            ServerMessage::Pause => write_record(w, kind::PAUSE, 0, None),
            ServerMessage::Resume => write_record(w, kind::RESUME, 0, None),
            ServerMessage::Cancel(id) => write_record(w, kind::CANCEL, 0, Some(id)),
            ServerMessage::Reload => write_record(w, kind::RELOAD, 0, None),
        }
    }

    pub fn read(r: impl Read) -> Result<Self, ProtoError> {
        let (tag, _payload, id_field) = read_record(r)?;
        Ok(match tag {
            kind::PLAY => ServerMessage::Play(decode_id_field(&id_field)?),
            kind::PAUSE => ServerMessage::Pause,
            kind::RESUME => ServerMessage::Resume,
            kind::CANCEL => ServerMessage::Cancel(decode_id_field(&id_field)?),
            kind::RELOAD => ServerMessage::Reload,
            other => return Err(ProtoError::UnknownMessageKind(other)),
        })
    }
}

impl EngineMessage {
    pub fn write(&self, w: impl Write) -> Result<(), ProtoError> {
        match self {
            EngineMessage::Ready => write_record(w, kind::READY, 0, None),
            EngineMessage::Arrived(id) => write_record(w, kind::ARRIVED, 0, Some(id)),
            EngineMessage::Playing { id, elapsed_secs } => {
                write_record(w, kind::PLAYING, *elapsed_secs, Some(id))
            }
            EngineMessage::Paused { id, elapsed_secs } => {
                write_record(w, kind::PAUSED, *elapsed_secs, Some(id))
            }
            EngineMessage::Finished(id) => write_record(w, kind::FINISHED, 0, Some(id)),
            EngineMessage::Stillborn(id) => write_record(w, kind::STILLBORN, 0, Some(id)),
            EngineMessage::Unknown(id) => write_record(w, kind::UNKNOWN, 0, Some(id)),
        }
    }

    pub fn read(r: impl Read) -> Result<Self, ProtoError> {
        let (tag, payload, id_field) = read_record(r)?;
        Ok(match tag {
            kind::READY => EngineMessage::Ready,
            kind::ARRIVED => EngineMessage::Arrived(decode_id_field(&id_field)?),
            kind::PLAYING => EngineMessage::Playing {
                id: decode_id_field(&id_field)?,
                elapsed_secs: payload,
            },
            kind::PAUSED => EngineMessage::Paused {
                id: decode_id_field(&id_field)?,
                elapsed_secs: payload,
            },
            kind::FINISHED => EngineMessage::Finished(decode_id_field(&id_field)?),
            kind::STILLBORN => EngineMessage::Stillborn(decode_id_field(&id_field)?),
            kind::UNKNOWN => EngineMessage::Unknown(decode_id_field(&id_field)?),
            other => return Err(ProtoError::UnknownMessageKind(other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TrackId {
        TrackId::new(s).unwrap()
    }

    #[test]
    fn server_message_roundtrip() {
        for msg in [
            ServerMessage::Play(id("t1")),
            ServerMessage::Pause,
            ServerMessage::Resume,
            ServerMessage::Cancel(id("t2")),
            ServerMessage::Reload,
        ] {
            let mut buf = Vec::new();
            msg.write(&mut buf).unwrap();
            let parsed = ServerMessage::read(&buf[..]).unwrap();
            assert_eq!(parsed, msg);
        }
    }

    #[test]
    fn engine_message_roundtrip_with_payload() {
        let msg = EngineMessage::Playing {
            id: id("t1"),
            elapsed_secs: 42,
        };
        let mut buf = Vec::new();
        msg.write(&mut buf).unwrap();
        let parsed = EngineMessage::read(&buf[..]).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn unknown_kind_is_an_error() {
        let mut buf = vec![0xFFu8];
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; TRACK_ID_FIELD_LEN]);
        assert!(ServerMessage::read(&buf[..]).is_err());
    }
}
