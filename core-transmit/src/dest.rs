//! Destination-mode resolution and the recipient registry (spec §4.5).
//!
//! Socket setup follows `bass-aes67/src/output/stream.rs`'s
//! `create_multicast_socket` (bind, TTL, non-blocking via `socket2`),
//! generalized from that file's fixed multicast-only socket to the
//! full broadcast/multicast/unicast/request cascade spec §4.5 describes.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};

/// Minimum send-buffer size raised on every transmit socket (spec §4.5).
pub const MIN_SEND_BUFFER: usize = 128 * 1024;

/// Resolved destination behavior (spec §4.5's four named modes, with
/// `auto` already resolved into one of them).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationModeKind {
    Broadcast,
    Multicast,
    Unicast,
    Request,
}

/// Explicit configuration knobs an operator may pass; `None` fields
/// fall back to the spec's stated defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct MulticastOptions {
    pub ttl: Option<u32>,
    pub loopback: Option<bool>,
}

const DEFAULT_MULTICAST_TTL: u32 = 1;

/// Implements spec §4.5's `auto` cascade: "if no destination configured,
/// becomes `request`; else if the destination is a multicast address,
/// `multicast`; else if it matches a local interface's broadcast
/// address ..., `broadcast`; else `unicast`."
pub fn resolve_auto(destination: Option<SocketAddr>) -> DestinationModeKind {
    let Some(addr) = destination else {
        return DestinationModeKind::Request;
    };

    if addr.ip().is_multicast() {
        return DestinationModeKind::Multicast;
    }

    if matches_local_broadcast_address(addr.ip()) {
        return DestinationModeKind::Broadcast;
    }

    DestinationModeKind::Unicast
}

/// Enumerate local interfaces and check whether `ip` equals any of
/// their IPv4 broadcast addresses.
fn matches_local_broadcast_address(ip: IpAddr) -> bool {
    let IpAddr::V4(target) = ip else {
        return false;
    };

    match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces.iter().any(|iface| match &iface.addr {
            if_addrs::IfAddr::V4(v4) => v4.broadcast == Some(target),
            _ => false,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "failed to enumerate interfaces for auto destination resolution");
            false
        }
    }
}

fn raise_send_buffer(socket: &Socket) {
    if let Err(e) = socket.set_send_buffer_size(MIN_SEND_BUFFER) {
        tracing::warn!(error = %e, "failed to raise transmit socket send buffer");
    }
}

/// Build the single fixed-destination socket used by the broadcast,
/// multicast, and unicast modes.
pub fn build_fixed_socket(
    dest: SocketAddr,
    mode: DestinationModeKind,
    multicast: MulticastOptions,
) -> io::Result<UdpSocket> {
    let domain = if dest.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    let bind_addr: SocketAddr = if dest.is_ipv4() {
        (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    socket.bind(&SockAddr::from(bind_addr))?;

    match mode {
        DestinationModeKind::Broadcast => {
            socket.set_broadcast(true)?;
        }
        DestinationModeKind::Multicast => {
            let ttl = multicast.ttl.unwrap_or(DEFAULT_MULTICAST_TTL);
            let loopback = multicast.loopback.unwrap_or(false);
            if let SocketAddr::V4(_) = dest {
                socket.set_multicast_ttl_v4(ttl)?;
                socket.set_multicast_loop_v4(loopback)?;
            } else {
                socket.set_multicast_hops_v6(ttl)?;
                socket.set_multicast_loop_v6(loopback)?;
            }
        }
        DestinationModeKind::Unicast | DestinationModeKind::Request => {}
    }

    socket.connect(&SockAddr::from(dest))?;
    raise_send_buffer(&socket);
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Per-family socket used in request mode (spec §4.5: "each packet is
/// sent once per recipient via a per-family socket (v4/v6)").
pub fn build_request_socket(domain: Domain) -> io::Result<UdpSocket> {
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    let bind_addr: SocketAddr = if domain == Domain::IPV4 {
        (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };
    socket.bind(&SockAddr::from(bind_addr))?;
    raise_send_buffer(&socket);
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// The mutable set of recipients in request mode (spec §4.3's fourth
/// mutex, §4.5's "Identity is address+port equality").
#[derive(Default)]
pub struct RecipientSet {
    inner: parking_lot::Mutex<Vec<SocketAddr>>,
}

impl RecipientSet {
    pub fn new() -> Self {
        RecipientSet::default()
    }

    pub fn add(&self, addr: SocketAddr) {
        let mut recipients = self.inner.lock();
        if !recipients.contains(&addr) {
            recipients.push(addr);
        }
    }

    pub fn remove(&self, addr: SocketAddr) {
        self.inner.lock().retain(|existing| *existing != addr);
    }

    pub fn snapshot(&self) -> Vec<SocketAddr> {
        self.inner.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_destination_resolves_to_request() {
        assert_eq!(resolve_auto(None), DestinationModeKind::Request);
    }

    #[test]
    fn multicast_address_resolves_to_multicast() {
        let addr: SocketAddr = "239.192.1.1:5004".parse().unwrap();
        assert_eq!(resolve_auto(Some(addr)), DestinationModeKind::Multicast);
    }

    #[test]
    fn arbitrary_unicast_address_resolves_to_unicast() {
        // Loopback is never a local interface's broadcast address.
        let addr: SocketAddr = "127.0.0.1:5004".parse().unwrap();
        assert_eq!(resolve_auto(Some(addr)), DestinationModeKind::Unicast);
    }

    #[test]
    fn recipient_set_dedupes_by_address_and_port() {
        let set = RecipientSet::new();
        let a: SocketAddr = "127.0.0.1:5004".parse().unwrap();
        set.add(a);
        set.add(a);
        assert_eq!(set.len(), 1);

        set.remove(a);
        assert!(set.is_empty());
    }
}
