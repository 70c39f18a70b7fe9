//! Command-line surface (spec §4.7, §6): the speaker's ambient flags
//! plus the receive-side transport options (bind address, multicast
//! group, payload type) and the jitter-buffer/dump overrides.

use clap::Parser;
use core_proto::rtp::PayloadType;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
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

/// The RTP receiver/player: binds a socket, reassembles packets into a
/// jitter buffer, and drains it to an output backend on a watermark
/// schedule.
#[derive(Debug, Parser)]
#[command(name = "player", version, about)]
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

    /// Local stream socket for the stop/query control channel (C10).
    #[arg(long, default_value = "/tmp/player-control.sock")]
    pub control_socket: PathBuf,

    /// Address to bind the receive socket to. Use `0.0.0.0:PORT` (or
    /// `[::]:PORT`) for a wildcard unicast bind.
    #[arg(long, default_value = "0.0.0.0:5004")]
    pub bind: SocketAddr,

    /// Multicast group to join on the bound socket; omit for a plain
    /// unicast bind.
    #[arg(long)]
    pub multicast_group: Option<IpAddr>,

    /// RTP payload type this receiver accepts; any other payload type
    /// is treated as a fatal stream error (spec §4.7).
    #[arg(long, value_enum, default_value_t = PayloadArg::Stereo)]
    pub payload: PayloadArg,

    /// Target jitter-buffer depth before first activation, in
    /// milliseconds. Defaults to ~500ms.
    #[arg(long)]
    pub readahead_ms: Option<u64>,

    /// Depth below which playback drops back to Buffering, in
    /// milliseconds. Defaults to ~200ms.
    #[arg(long)]
    pub minbuffer_ms: Option<u64>,

    /// Backlog bound past which the queue thread blocks intake, in
    /// milliseconds. Defaults to 4x readahead.
    #[arg(long)]
    pub maxbuffer_ms: Option<u64>,

    /// Write a circular diagnostic dump of decoded PCM to this path.
    #[arg(long)]
    pub dump: Option<PathBuf>,

    /// Depth of the circular dump, in seconds of audio.
    #[arg(long, default_value_t = crate::dump::DEFAULT_DUMP_SECONDS)]
    pub dump_seconds: u64,
}

impl Cli {
    pub fn effective_debug(&self) -> bool {
        !self.no_debug && (self.debug || core_proto::config::effective_debug_level(self.debug) > 0)
    }

    pub fn effective_syslog(&self) -> bool {
        self.syslog && !self.no_syslog
    }
}
