//! Track identifier: an opaque UTF-8 string capped at the spec's ~24-byte
//! budget (spec §3: "opaque identifier string (≤ ~24 bytes including
//! terminator)").

use crate::error::ProtoError;
use std::fmt;

/// Matches the original's `char id[24]` sizing (see
/// `examples/original_source/clients/playrtp.h`-style fixed buffers): 23
/// bytes of content plus an implicit terminator when framed on the wire.
pub const MAX_TRACK_ID_LEN: usize = 23;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(s: impl Into<String>) -> Result<Self, ProtoError> {
        let s = s.into();
        if s.len() > MAX_TRACK_ID_LEN {
            return Err(ProtoError::TrackIdTooLong {
                max: MAX_TRACK_ID_LEN,
            });
        }
        Ok(TrackId(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TrackId {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TrackId::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlong_ids() {
        let long = "x".repeat(MAX_TRACK_ID_LEN + 1);
        assert!(TrackId::new(long).is_err());
    }

    #[test]
    fn accepts_boundary_length() {
        let ok = "x".repeat(MAX_TRACK_ID_LEN);
        assert!(TrackId::new(ok).is_ok());
    }
}
