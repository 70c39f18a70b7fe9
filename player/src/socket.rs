//! Receive socket setup (spec §4.7, C8).
//!
//! Mirrors `core-transmit`'s `dest.rs` (itself grounded on
//! `bass-aes67/src/output/stream.rs`'s `create_multicast_socket`), run in
//! reverse: bind instead of connect, join instead of set-TTL.

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

/// Minimum receive-buffer size raised on the listen socket (spec §4.7).
pub const MIN_RECV_BUFFER: usize = 128 * 1024;

/// How long `recv` blocks before the listen thread re-checks its running
/// flag; keeps shutdown responsive without busy-polling.
const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Bind the socket the listen thread reads from: a wildcard unicast bind
/// when `multicast_group` is `None`, or a bind-then-join when it names a
/// multicast address (spec §4.7: "multicast bind+join (IP_ADD_MEMBERSHIP/
/// IPV6_JOIN_GROUP) or wildcard unicast bind").
pub fn bind_receive_socket(
    bind_addr: SocketAddr,
    multicast_group: Option<IpAddr>,
) -> io::Result<UdpSocket> {
    let domain = if bind_addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&SockAddr::from(bind_addr))?;

    if let Some(group) = multicast_group {
        match group {
            IpAddr::V4(v4) => socket.join_multicast_v4(&v4, &Ipv4Addr::UNSPECIFIED)?,
            IpAddr::V6(v6) => socket.join_multicast_v6(&v6, 0)?,
        }
    }

    if let Err(e) = socket.set_recv_buffer_size(MIN_RECV_BUFFER) {
        tracing::warn!(error = %e, "failed to raise receive socket buffer");
    }
    socket.set_read_timeout(Some(RECV_POLL_TIMEOUT))?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_unicast_bind_succeeds() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_receive_socket(addr, None).unwrap();
        assert!(socket.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn multicast_bind_and_join_succeeds() {
        let addr: SocketAddr = "0.0.0.0:0".parse().unwrap();
        let group: IpAddr = "239.192.1.5".parse().unwrap();
        let result = bind_receive_socket(addr, Some(group));
        assert!(result.is_ok());
    }
}
