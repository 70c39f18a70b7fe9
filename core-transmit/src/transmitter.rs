//! RTP transmitter (spec §4.5, C6): builds packets, paces them via the
//! playback scheduler, and dispatches to the resolved destination set.
//!
//! Implements [`AudioBackend`] so the speaker engine drives it exactly
//! like any other output, plus [`RtpDestinationControl`] for request
//! mode's mutable recipient set (spec §9 Design Notes).

use crate::dest::{
    build_fixed_socket, build_request_socket, resolve_auto, DestinationModeKind,
    MulticastOptions, RecipientSet,
};
use core_backend::silence::fill_silence_on_underrun;
use core_backend::{AudioBackend, BackendError, PullCallback, RtpDestinationControl};
use core_clock::PlaybackScheduler;
use core_proto::rtp::{host_to_wire_samples, PayloadType, RtpPacketBuilder};
use core_proto::SampleFormat;
use parking_lot::Mutex;
use socket2::Domain;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

/// "MTU − UDP − IP − safety" payload budget (spec §4.5: "empirically
/// ~1400 bytes").
pub const PAYLOAD_BUDGET_BYTES: usize = 1400;

/// Accumulated transmit errors within a short interval that are fatal
/// (spec §5, §7).
const FATAL_ERROR_THRESHOLD: u32 = 10;

/// How often the background thread re-checks activation while
/// deactivated (the RTP transmitter does not tear its thread down
/// across pause/resume — only the playback scheduler's `reactivated`
/// flag needs to fire on the next activation, see DESIGN.md).
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Progress log cadence (spec §4.5: "Per every ~8192 packets").
const PROGRESS_LOG_INTERVAL: u64 = 8192;

#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("destination address required for {0:?} mode")]
    DestinationRequired(DestinationModeKind),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

enum Sender {
    Fixed(UdpSocket),
    Request {
        v4: UdpSocket,
        v6: UdpSocket,
        recipients: Arc<RecipientSet>,
    },
}

/// Construction-time configuration: destination address, explicit mode
/// override (`None` triggers the `auto` cascade), and multicast knobs.
#[derive(Debug, Clone, Default)]
pub struct TransmitConfig {
    pub destination: Option<SocketAddr>,
    pub mode: Option<DestinationModeKind>,
    pub multicast: MulticastOptions,
}

pub struct RtpTransmitter {
    payload_type: PayloadType,
    scheduler: Arc<Mutex<Option<PlaybackScheduler>>>,
    builder: Arc<Mutex<Option<RtpPacketBuilder>>>,
    sender: Arc<Sender>,
    running: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
    error_count: Arc<AtomicU32>,
    packet_count: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl RtpTransmitter {
    pub fn new(payload_type: PayloadType, config: TransmitConfig) -> Result<Self, TransmitError> {
        let mode = config.mode.unwrap_or_else(|| resolve_auto(config.destination));

        let sender = match mode {
            DestinationModeKind::Request => Sender::Request {
                v4: build_request_socket(Domain::IPV4)?,
                v6: build_request_socket(Domain::IPV6)?,
                recipients: Arc::new(RecipientSet::new()),
            },
            other => {
                let dest = config
                    .destination
                    .ok_or(TransmitError::DestinationRequired(other))?;
                Sender::Fixed(build_fixed_socket(dest, other, config.multicast)?)
            }
        };

        Ok(RtpTransmitter {
            payload_type,
            scheduler: Arc::new(Mutex::new(None)),
            builder: Arc::new(Mutex::new(None)),
            sender: Arc::new(sender),
            running: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicBool::new(false)),
            error_count: Arc::new(AtomicU32::new(0)),
            packet_count: Arc::new(AtomicU64::new(0)),
            worker: None,
        })
    }

    fn dispatch(sender: &Sender, packet: &[u8]) -> std::io::Result<()> {
        match sender {
            Sender::Fixed(socket) => socket.send(packet).map(|_| ()),
            Sender::Request { v4, v6, recipients } => {
                let mut last_err = None;
                for addr in recipients.snapshot() {
                    let socket = if addr.is_ipv4() { v4 } else { v6 };
                    if let Err(e) = socket.send_to(packet, addr) {
                        last_err = Some(e);
                    }
                }
                match last_err {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            }
        }
    }
}

impl AudioBackend for RtpTransmitter {
    fn configure(&mut self, format: SampleFormat) -> Result<(), BackendError> {
        format
            .validate()
            .map_err(|_| BackendError::UnsupportedFormat(format))?;
        if format.channels != self.payload_type.channels() {
            return Err(BackendError::UnsupportedFormat(format));
        }
        *self.scheduler.lock() = Some(PlaybackScheduler::new(format));
        *self.builder.lock() = Some(RtpPacketBuilder::new(self.payload_type));
        Ok(())
    }

    fn start(&mut self, callback: PullCallback) -> Result<(), BackendError> {
        if self.scheduler.lock().is_none() {
            return Err(BackendError::ActivationFailed("configure() not called".into()));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let active = self.active.clone();
        let scheduler = self.scheduler.clone();
        let builder = self.builder.clone();
        let sender = self.sender.clone();
        let error_count = self.error_count.clone();
        let packet_count = self.packet_count.clone();
        let mut callback = fill_silence_on_underrun(callback);

        let handle = thread::Builder::new()
            .name("rtp-transmitter".into())
            .spawn(move || {
                let mut staging = vec![0u8; PAYLOAD_BUDGET_BYTES];
                while running.load(Ordering::SeqCst) {
                    if !active.load(Ordering::SeqCst) {
                        thread::sleep(IDLE_POLL_INTERVAL);
                        continue;
                    }

                    let marker;
                    {
                        let mut guard = scheduler.lock();
                        let sched = guard.as_mut().expect("configured before start");
                        sched.synchronize();
                        marker = sched.take_marker_pending();
                    }

                    let n = callback(&mut staging);
                    host_to_wire_samples(&mut staging[..n]);
                    let sample_count = (n / 2) as u32;

                    let packet = {
                        let mut guard = builder.lock();
                        let b = guard.as_mut().expect("configured before start");
                        b.build_packet(&staging[..n], sample_count, marker).to_vec()
                    };

                    match Self::dispatch(&sender, &packet) {
                        Ok(()) => {
                            let prev = error_count.load(Ordering::Relaxed);
                            if prev > 0 {
                                error_count.store(prev / 2, Ordering::Relaxed);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "RTP send error, packet dropped");
                            let errors = error_count.fetch_add(1, Ordering::Relaxed) + 1;
                            if errors > FATAL_ERROR_THRESHOLD {
                                tracing::error!(
                                    errors,
                                    "sustained RTP transmit error rate, terminating"
                                );
                                std::process::exit(1);
                            }
                        }
                    }

                    {
                        let mut guard = scheduler.lock();
                        let sched = guard.as_mut().expect("configured before start");
                        sched.update(sample_count);
                    }

                    let count = packet_count.fetch_add(1, Ordering::Relaxed) + 1;
                    if count % PROGRESS_LOG_INTERVAL == 0 {
                        let (seq, ts, elapsed) = {
                            let b = builder.lock();
                            let b = b.as_ref().expect("configured before start");
                            let s = scheduler.lock();
                            let s = s.as_ref().expect("configured before start");
                            (b.sequence(), b.timestamp(), s.timestamp())
                        };
                        tracing::info!(
                            sequence = seq,
                            base_timestamp = ts,
                            elapsed_samples = elapsed,
                            paused = !active.load(Ordering::SeqCst),
                            "RTP transmit progress"
                        );
                    }
                }
            })
            .expect("spawn rtp-transmitter thread");

        self.worker = Some(handle);
        Ok(())
    }

    fn activate(&mut self) -> Result<(), BackendError> {
        if let Some(sched) = self.scheduler.lock().as_mut() {
            sched.mark_reactivated();
            sched.mark_resumed();
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn deactivate(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl RtpDestinationControl for RtpTransmitter {
    fn add_recipient(&self, addr: SocketAddr) {
        match self.sender.as_ref() {
            Sender::Request { recipients, .. } => recipients.add(addr),
            Sender::Fixed(_) => {
                tracing::warn!(%addr, "add_recipient ignored: transmitter is not in request mode");
            }
        }
    }

    fn remove_recipient(&self, addr: SocketAddr) {
        match self.sender.as_ref() {
            Sender::Request { recipients, .. } => recipients.remove(addr),
            Sender::Fixed(_) => {
                tracing::warn!(%addr, "remove_recipient ignored: transmitter is not in request mode");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dest::DestinationModeKind;
    use std::net::UdpSocket as StdUdpSocket;
    use std::sync::mpsc;

    #[test]
    fn request_mode_with_no_recipients_sends_nothing_and_does_not_error() {
        let mut tx = RtpTransmitter::new(
            PayloadType::L16Stereo44100,
            TransmitConfig {
                destination: None,
                mode: Some(DestinationModeKind::Request),
                multicast: MulticastOptions::default(),
            },
        )
        .unwrap();
        tx.configure(SampleFormat::L16_STEREO_44100).unwrap();

        let (tx_done, rx_done) = mpsc::channel();
        tx.start(Box::new(move |buf: &mut [u8]| {
            let _ = tx_done.send(());
            buf.fill(0);
            buf.len()
        }))
        .unwrap();
        tx.activate().unwrap();

        rx_done.recv_timeout(Duration::from_secs(1)).unwrap();
        tx.stop();
    }

    #[test]
    fn unicast_mode_delivers_to_bound_listener() {
        let listener = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        listener
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();

        let mut tx = RtpTransmitter::new(
            PayloadType::L16Mono44100,
            TransmitConfig {
                destination: Some(addr),
                mode: Some(DestinationModeKind::Unicast),
                multicast: MulticastOptions::default(),
            },
        )
        .unwrap();
        tx.configure(SampleFormat::L16_MONO_44100).unwrap();
        tx.start(Box::new(|buf: &mut [u8]| {
            buf.fill(0);
            buf.len()
        }))
        .unwrap();
        tx.activate().unwrap();

        let mut buf = [0u8; 2048];
        let (n, _) = listener.recv_from(&mut buf).unwrap();
        assert!(n >= 12);
        assert_eq!(buf[0] >> 6, 2); // RTP version

        tx.stop();
    }
}
