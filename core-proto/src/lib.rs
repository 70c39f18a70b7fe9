//! Wire formats shared by the speaker engine, the RTP transmitter and
//! receiver, and the control channel.
//!
//! Nothing in here touches sockets or threads — it is pure encode/decode
//! and the small numeric types (sequence-space comparisons, sample format)
//! that every other crate in the workspace builds on.

pub mod config;
pub mod control;
pub mod error;
pub mod format;
pub mod handshake;
pub mod record;
pub mod rtp;
pub mod seqspace;
pub mod track_id;

pub use error::ProtoError;
pub use format::SampleFormat;
pub use rtp::{PayloadType, RtpHeader, RtpPacket, RtpPacketBuilder};
pub use track_id::TrackId;
