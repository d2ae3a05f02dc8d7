//! Bound, non-blocking, multicast-joined UDP sockets (`spec.md` §4.8/§6
//! "pre-bound non-blocking datagram sockets"). Grounded in the teacher's
//! `hr-ipv6::ra` and `hr-dhcp::server` socket2 setup, generalized from a
//! single raw/broadcast socket to per-interface multicast membership on both
//! address families.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::os::unix::io::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::interface::Family;
use crate::wire::{MDNS_GROUP_V4, MDNS_GROUP_V6, MDNS_PORT};

/// The narrow send/receive/register surface the bridge loop needs from a
/// bound socket; `spec.md` §6 treats construction as an external
/// collaborator, so the core only ever talks to this trait.
pub trait BridgeSocket: Send + Sync {
    fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)>;
    fn send_to(&self, buf: &[u8], dest: &SocketAddr) -> std::io::Result<usize>;
    fn raw_fd(&self) -> RawFd;
}

pub struct UdpBridgeSocket {
    inner: std::net::UdpSocket,
}

impl BridgeSocket for UdpBridgeSocket {
    fn recv_from(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.inner.recv_from(buf)
    }

    fn send_to(&self, buf: &[u8], dest: &SocketAddr) -> std::io::Result<usize> {
        self.inner.send_to(buf, dest)
    }

    fn raw_fd(&self) -> RawFd {
        self.inner.as_raw_fd()
    }
}

/// Builds one non-blocking UDP socket bound to port 5353, joined to the mDNS
/// multicast group for `family` on the interface named by `iface_name`
/// (index `iface_index`), with loopback disabled and TTL/hop-limit 255.
pub fn bind_multicast(
    iface_name: &str,
    iface_index: u32,
    family: Family,
) -> std::io::Result<UdpBridgeSocket> {
    match family {
        Family::V4 => bind_multicast_v4(iface_name),
        Family::V6 => bind_multicast_v6(iface_index),
    }
}

fn bind_multicast_v4(iface_name: &str) -> std::io::Result<UdpBridgeSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(target_os = "linux")]
    socket.set_reuse_port(true)?;
    #[cfg(target_os = "linux")]
    if !iface_name.is_empty() {
        socket.bind_device(Some(iface_name.as_bytes()))?;
    }

    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, MDNS_PORT);
    socket.bind(&SockAddr::from(bind_addr))?;

    let group: Ipv4Addr = MDNS_GROUP_V4.parse().expect("valid literal");
    socket.join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)?;
    socket.set_multicast_loop_v4(false)?;
    socket.set_multicast_ttl_v4(255)?;
    socket.set_nonblocking(true)?;

    Ok(UdpBridgeSocket {
        inner: socket.into(),
    })
}

fn bind_multicast_v6(iface_index: u32) -> std::io::Result<UdpBridgeSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    #[cfg(target_os = "linux")]
    socket.set_reuse_port(true)?;
    socket.set_only_v6(true)?;

    let bind_addr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, MDNS_PORT, 0, 0);
    socket.bind(&SockAddr::from(bind_addr))?;

    let group: Ipv6Addr = MDNS_GROUP_V6.parse().expect("valid literal");
    socket.join_multicast_v6(&group, iface_index)?;
    socket.set_multicast_loop_v6(false)?;
    socket.set_multicast_hops_v6(255)?;
    socket.set_nonblocking(true)?;

    Ok(UdpBridgeSocket {
        inner: socket.into(),
    })
}

/// The multicast destination sockaddr for a worker's family. For IPv6 the
/// scope id must be set to the egress interface index before every send
/// (`spec.md` §4.5).
pub fn group_addr(family: Family, scope_id: u32) -> SocketAddr {
    match family {
        Family::V4 => SocketAddr::V4(SocketAddrV4::new(
            MDNS_GROUP_V4.parse().expect("valid literal"),
            MDNS_PORT,
        )),
        Family::V6 => SocketAddr::V6(SocketAddrV6::new(
            MDNS_GROUP_V6.parse().expect("valid literal"),
            MDNS_PORT,
            0,
            scope_id,
        )),
    }
}
