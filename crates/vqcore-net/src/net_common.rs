// net_common.rs -- shared types between the UDP and loopback drivers, plus
// the `NetLink` trait both implement. Converted from:
// myq2-original/win32/net_common.rs.

use std::net::SocketAddr;
use vqcore_common::qcommon::{NetAdr, NetAdrType};

/// Port 0 means "let the OS pick", mirroring `PORT_ANY`.
pub const PORT_ANY: i32 = vqcore_common::qcommon::PORT_ANY;

/// Result of a non-blocking read: number of bytes received (0 = nothing
/// pending) plus the sender, or a negative value on hard error.
pub type ReadResult = Result<Option<(usize, NetAdr)>, i32>;

/// Uniform socket surface across transports (real UDP, or the in-process
/// loopback). One listening handle per driver instance.
pub trait NetLink {
    /// Open a control socket for this family.
    fn init(&mut self) -> Result<(), i32>;

    /// Open (or close) the accept socket bound to the configured port.
    fn listen(&mut self, enable: bool) -> Result<(), i32>;

    /// Non-blocking receive. `Ok(None)` means nothing was pending.
    fn read(&mut self, buf: &mut [u8]) -> ReadResult;

    /// Non-blocking send. UDP gives no partial writes.
    fn write(&mut self, buf: &[u8], peer: &NetAdr) -> Result<(), i32>;

    /// Send to the family's broadcast address. A driver with no broadcast
    /// concept (e.g. loopback) treats this as a no-op success.
    fn broadcast(&mut self, buf: &[u8]) -> Result<(), i32>;

    fn shutdown(&mut self);
}

/// Convert a `NetAdr` (IPv4 or IPv6) to a `std::net::SocketAddr`.
pub fn netadr_to_socket_addr(a: &NetAdr) -> SocketAddr {
    let port = u16::from_be(a.port);
    match a.adr_type {
        NetAdrType::Ip6 | NetAdrType::Broadcast6 => {
            let ip = std::net::Ipv6Addr::from(a.ip6);
            SocketAddr::new(std::net::IpAddr::V6(ip), port)
        }
        _ => {
            let ip = std::net::Ipv4Addr::new(a.ip[0], a.ip[1], a.ip[2], a.ip[3]);
            SocketAddr::from((ip, port))
        }
    }
}

/// Convert a `std::net::SocketAddr` back to a `NetAdr`.
pub fn socket_addr_to_netadr(addr: &SocketAddr) -> NetAdr {
    match addr {
        SocketAddr::V4(v4) => NetAdr {
            adr_type: NetAdrType::Ip,
            ip: v4.ip().octets(),
            ip6: [0; 16],
            scope_id: 0,
            port: v4.port().to_be(),
        },
        SocketAddr::V6(v6) => NetAdr {
            adr_type: NetAdrType::Ip6,
            ip: [0; 4],
            ip6: v6.ip().octets(),
            scope_id: v6.scope_id(),
            port: v6.port().to_be(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[test]
    fn roundtrip_v4() {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(10, 20, 30, 40), 26000));
        let netadr = socket_addr_to_netadr(&addr);
        assert_eq!(netadr.adr_type, NetAdrType::Ip);
        assert_eq!(netadr.ip, [10, 20, 30, 40]);
        let back = netadr_to_socket_addr(&netadr);
        assert_eq!(back, addr);
    }

    #[test]
    fn port_is_network_byte_order() {
        let netadr = NetAdr {
            adr_type: NetAdrType::Ip,
            ip: [127, 0, 0, 1],
            ip6: [0; 16],
            scope_id: 0,
            port: 26000u16.to_be(),
        };
        let sock = netadr_to_socket_addr(&netadr);
        assert_eq!(sock.port(), 26000);
    }
}
