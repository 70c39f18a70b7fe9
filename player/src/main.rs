//! RTP receiver/player binary (spec §4.7, C8/C9): binds a receive
//! socket, reassembles arriving packets into a jitter buffer on its own
//! queue thread, and drains that buffer to an output backend on a
//! watermark-governed schedule.

mod cli;
mod dump;
mod intake;
mod listen;
mod logging;
mod player;
mod queue;
mod socket;
mod state;

use clap::Parser;
use cli::Cli;
use core_backend::cpal_backend::CpalBackend;
use core_backend::AudioBackend;
use core_buffers::PacketAllocator;
use core_control::ControlServer;
use core_proto::SampleFormat;
use dump::CircularDump;
use intake::IntakeList;
use state::{PlaybackCursor, PlaybackShared, Watermarks};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

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

    let watermarks = Watermarks::new(format, cli.readahead_ms, cli.minbuffer_ms, cli.maxbuffer_ms);

    let allocator = Arc::new(PacketAllocator::new());
    let intake = Arc::new(IntakeList::new());
    let shared = Arc::new(PlaybackShared::new(watermarks));
    let cursor = Arc::new(PlaybackCursor::new());
    let running = Arc::new(AtomicBool::new(true));

    let dump = match &cli.dump {
        Some(path) => {
            let capacity = format.bytes_per_ms() as u64 * cli.dump_seconds * 1000;
            Some(Arc::new(CircularDump::create(path, capacity as usize)?))
        }
        None => None,
    };

    let socket = socket::bind_receive_socket(cli.bind, cli.multicast_group)?;

    let _listen_thread = listen::spawn(
        socket,
        payload_type,
        allocator.clone(),
        intake.clone(),
        cursor.clone(),
        running.clone(),
    );
    let _queue_thread = queue::spawn(intake, shared.clone(), allocator.clone(), running.clone());

    let mut backend: Box<dyn AudioBackend> = Box::new(CpalBackend::new());
    backend.configure(format)?;
    let callback = player::make_pull_callback(shared, allocator, cursor, dump);
    backend.start(callback)?;
    backend.activate()?;

    let control = ControlServer::bind(&cli.control_socket)?;
    let control_running = running.clone();
    let control_thread = control.spawn(move || {
        tracing::info!("stop command received, exiting");
        control_running.store(false, Ordering::SeqCst);
        std::process::exit(0);
    });

    control_thread.join().expect("control thread panicked");
    backend.deactivate();
    backend.stop();
    Ok(())
}
