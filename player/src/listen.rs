//! Listen thread (spec §4.7, C8): receive, validate, and append to the
//! intake list. Everything except the append itself is free of any lock
//! another thread could be waiting on.

use crate::intake::IntakeList;
use crate::state::PlaybackCursor;
use core_buffers::{PacketAllocator, FLAG_IDLE, MAX_PACKET_SAMPLES};
use core_proto::rtp::{wire_to_host_samples, PayloadType, RtpPacket, MAX_PACKET_BYTES};
use core_proto::seqspace::seq_lt_u32;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub fn spawn(
    socket: UdpSocket,
    payload_type: PayloadType,
    allocator: Arc<PacketAllocator>,
    intake: Arc<IntakeList>,
    cursor: Arc<PlaybackCursor>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("rtp-listen".into())
        .spawn(move || {
            let mut staging = [0u8; MAX_PACKET_BYTES];
            while running.load(Ordering::SeqCst) {
                let n = match socket.recv(&mut staging) {
                    Ok(n) => n,
                    Err(e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "receive socket error");
                        continue;
                    }
                };

                match RtpPacket::parse(&staging[..n]) {
                    Ok(packet) => {
                        handle_packet(packet, payload_type, &allocator, &intake, &cursor)
                    }
                    Err(e) => tracing::debug!(error = %e, "dropped malformed packet"),
                }
            }
        })
        .expect("spawn rtp-listen thread")
}

fn handle_packet(
    packet: RtpPacket,
    payload_type: PayloadType,
    allocator: &PacketAllocator,
    intake: &IntakeList,
    cursor: &PlaybackCursor,
) {
    // Unsupported payload type is fatal (spec §4.7): this process decodes
    // exactly one configured format, it does not renegotiate mid-stream.
    if packet.header.payload_type != payload_type.wire_value() {
        tracing::error!(
            got = packet.header.payload_type,
            want = payload_type.wire_value(),
            "unsupported RTP payload type, terminating"
        );
        std::process::exit(1);
    }

    if cursor.is_active() && seq_lt_u32(packet.header.timestamp, cursor.next_timestamp()) {
        tracing::debug!(timestamp = packet.header.timestamp, "stale packet dropped");
        return;
    }

    // A payload must be a whole number of 16-bit samples; an odd length
    // would leave `samples_mut()` one byte short of `packet.payload`,
    // which panics `copy_from_slice` below (and aborts the process under
    // `panic = "abort"`) on nothing more than a malformed UDP datagram.
    if packet.payload.len() % 2 != 0 {
        tracing::debug!(
            payload_len = packet.payload.len(),
            "odd-length payload, dropped"
        );
        return;
    }

    let sample_count = packet.sample_count();
    if sample_count == 0 || sample_count > MAX_PACKET_SAMPLES {
        tracing::debug!(sample_count, "packet sample count out of range, dropped");
        return;
    }

    let handle = allocator.alloc();
    allocator.with_mut(handle, |p| {
        p.timestamp = packet.header.timestamp;
        p.sample_count = sample_count as u16;
        p.flags = if packet.header.marker { FLAG_IDLE } else { 0 };
        let dst = p.samples_mut();
        dst.copy_from_slice(packet.payload);
        wire_to_host_samples(dst);
    });

    intake.push(packet.header.timestamp, handle);
}
