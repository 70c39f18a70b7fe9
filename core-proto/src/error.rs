use std::io;

/// Errors arising from decoding or encoding one of the core wire formats.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("buffer too short: need at least {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("unsupported RTP version {0}")]
    UnsupportedVersion(u8),

    #[error("RTP extension bit set, packet rejected")]
    ExtensionNotSupported,

    #[error("unsupported payload type {0}, only L16 stereo/mono 44.1kHz are decoded")]
    UnsupportedPayloadType(u8),

    #[error("unsupported sample format: {reason}")]
    UnsupportedFormat { reason: &'static str },

    #[error("track id longer than {max} bytes")]
    TrackIdTooLong { max: usize },

    #[error("track id is not valid UTF-8")]
    TrackIdNotUtf8,

    #[error("unknown message kind byte {0}")]
    UnknownMessageKind(u8),

    #[error(transparent)]
    Io(#[from] io::Error),
}
