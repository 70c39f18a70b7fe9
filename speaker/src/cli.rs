//! Command-line surface (spec §4.6, §6): "--help, --version, --config
//! PATH, --debug/--no-debug, --syslog/--no-syslog, plus the handful of
//! transport options each binary needs."

use clap::{Parser, ValueEnum};
use core_proto::rtp::PayloadType;
use core_transmit::DestinationModeKind;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PayloadArg {
    Stereo,
    Mono,
}

impl From<PayloadArg> for PayloadType {
    fn from(value: PayloadArg) -> Self {
        match value {
            PayloadArg::Stereo => PayloadType::L16Stereo44100,
            PayloadArg::Mono => PayloadType::L16Mono44100,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Auto,
    Broadcast,
    Multicast,
    Unicast,
    Request,
}

impl From<ModeArg> for Option<DestinationModeKind> {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Auto => None,
            ModeArg::Broadcast => Some(DestinationModeKind::Broadcast),
            ModeArg::Multicast => Some(DestinationModeKind::Multicast),
            ModeArg::Unicast => Some(DestinationModeKind::Unicast),
            ModeArg::Request => Some(DestinationModeKind::Request),
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum BackendArg {
    Rtp,
    Native,
}

/// The speaker engine: accepts decoded PCM over a local socket, feeds a
/// ring buffer per track, and drives one configured output backend.
#[derive(Debug, Parser)]
#[command(name = "speaker", version, about)]
pub struct Cli {
    /// Path to a configuration file (parsing is out of this crate's
    /// scope; an absent or unparsed file just yields defaults).
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, overrides_with = "no_debug")]
    pub debug: bool,
    #[arg(long = "no-debug", overrides_with = "debug")]
    pub no_debug: bool,

    #[arg(long, overrides_with = "no_syslog")]
    pub syslog: bool,
    #[arg(long = "no-syslog", overrides_with = "syslog")]
    pub no_syslog: bool,

    /// Local stream socket path decoders connect to (spec §4.6
    /// handshake).
    #[arg(long, default_value = "/tmp/speaker.sock")]
    pub listen: PathBuf,

    /// Local stream socket for the stop/query control channel (C10).
    #[arg(long, default_value = "/tmp/speaker-control.sock")]
    pub control_socket: PathBuf,

    /// Output backend to drive.
    #[arg(long, value_enum, default_value_t = BackendArg::Rtp)]
    pub backend: BackendArg,

    /// RTP destination address (unicast/broadcast/multicast fixed
    /// modes; omit for request mode).
    #[arg(long)]
    pub destination: Option<SocketAddr>,

    /// Explicit destination-mode override; omit for the `auto` cascade
    /// (spec §4.5).
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// RTP payload type.
    #[arg(long, value_enum, default_value_t = PayloadArg::Stereo)]
    pub payload: PayloadArg,

    /// Multicast TTL (spec §4.5 default: 1).
    #[arg(long, default_value_t = 1)]
    pub multicast_ttl: u32,
}

impl Cli {
    pub fn effective_debug(&self) -> bool {
        !self.no_debug && (self.debug || core_proto::config::effective_debug_level(self.debug) > 0)
    }

    pub fn effective_syslog(&self) -> bool {
        self.syslog && !self.no_syslog
    }
}
