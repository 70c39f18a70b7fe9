//! Speaker engine binary (spec §4.6, C7): accepts decoded PCM over a
//! local socket, maintains per-track buffers, and drives one configured
//! output backend (native sound API or RTP transmitter) under control
//! of a line-oriented record protocol on stdio.

mod cli;
mod engine;
mod logging;
mod track;

use clap::Parser;
use cli::{BackendArg, Cli};
use core_backend::cpal_backend::CpalBackend;
use core_backend::AudioBackend;
use core_control::ControlServer;
use core_proto::SampleFormat;
use core_transmit::{RtpTransmitter, TransmitConfig};
use std::sync::mpsc;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.effective_debug(), cli.effective_syslog());

    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "configuration file parsing is out of scope; using defaults");
    }

    let payload_type: core_proto::rtp::PayloadType = cli.payload.into();
    let format = match payload_type {
        core_proto::rtp::PayloadType::L16Stereo44100 => SampleFormat::L16_STEREO_44100,
        core_proto::rtp::PayloadType::L16Mono44100 => SampleFormat::L16_MONO_44100,
    };

    let backend: Box<dyn AudioBackend> = match cli.backend {
        BackendArg::Native => Box::new(CpalBackend::new()),
        BackendArg::Rtp => {
            let mode: Option<core_transmit::DestinationModeKind> =
                cli.mode.map(Into::into).unwrap_or(None);
            let config = TransmitConfig {
                destination: cli.destination,
                mode,
                multicast: core_transmit::MulticastOptions {
                    ttl: Some(cli.multicast_ttl),
                    loopback: None,
                },
            };
            Box::new(RtpTransmitter::new(payload_type, config)?)
        }
    };

    let control = ControlServer::bind(&cli.control_socket)?;
    let _control_thread = control.spawn(|| {
        tracing::info!("stop command received, exiting");
        std::process::exit(0);
    });

    let (events_tx, events_rx) = mpsc::channel();
    let ctx = engine::EngineContext::new(format, events_tx);

    engine::run(ctx, events_rx, &cli.listen, backend)
}
