//! RTP transmitter (spec §4.5, C6): packet construction, destination-mode
//! resolution (broadcast/multicast/unicast/request/auto), the request-mode
//! recipient registry, and interface enumeration for the `auto` cascade.

pub mod dest;
pub mod transmitter;

pub use dest::{
    resolve_auto, DestinationModeKind, MulticastOptions, RecipientSet, MIN_SEND_BUFFER,
};
pub use transmitter::{RtpTransmitter, TransmitConfig, TransmitError, PAYLOAD_BUDGET_BYTES};
