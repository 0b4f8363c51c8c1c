// net_udp.rs -- the real UDP transport. Converted from:
// myq2-original/win32/net_udp.rs (itself converted from net_udp.c), pared
// down to a single-socket `NetLink` implementation: one `UdpLink` per open
// port, fed by a dedicated I/O thread into a bounded packet queue so reads
// never block the caller.

use std::net::UdpSocket;
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use vqcore_common::common::com_printf;
use vqcore_common::net::net_string_to_adr;
use vqcore_common::net_queue::{PacketQueue, DEFAULT_QUEUE_CAPACITY};
use vqcore_common::qcommon::{NetAdr, NetAdrType, PORT_ANY};

use crate::net_common::{netadr_to_socket_addr, socket_addr_to_netadr, NetLink, ReadResult};
use crate::net_io_thread::NetIoThreadManager;
use vqcore_common::qcommon::NetSrc;

/// IP_TOS value for low-delay traffic, matching the teacher's socket setup.
const IPTOS_LOWDELAY: u32 = 0x10;

/// A single bound UDP socket, drained asynchronously by an I/O thread into
/// `queue`. `write`/`broadcast` are synchronous since sends rarely block and
/// callers want immediate error feedback.
pub struct UdpLink {
    sock: NetSrc,
    interface: String,
    port: i32,
    socket: Option<Arc<UdpSocket>>,
    queue: PacketQueue,
    io_manager: NetIoThreadManager,
}

impl UdpLink {
    pub fn new(sock: NetSrc, interface: &str, port: i32) -> Self {
        Self {
            sock,
            interface: interface.to_string(),
            port,
            socket: None,
            queue: PacketQueue::new(DEFAULT_QUEUE_CAPACITY),
            io_manager: NetIoThreadManager::new(),
        }
    }

    fn open_udp_socket(interface: &str, port: i32) -> Option<UdpSocket> {
        let bind_addr = if interface.is_empty() || interface.eq_ignore_ascii_case("localhost") {
            "0.0.0.0"
        } else {
            interface
        };
        let port_actual = if port == PORT_ANY { 0u16 } else { port as u16 };

        let socket = match Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)) {
            Ok(s) => s,
            Err(e) => {
                com_printf(&format!("WARNING: UDP_OpenSocket: socket: {}\n", e));
                return None;
            }
        };

        if let Err(e) = socket.set_tos(IPTOS_LOWDELAY) {
            com_printf(&format!("WARNING: UDP_OpenSocket: set_tos: {}\n", e));
        }

        let addr: std::net::SocketAddrV4 = format!("{}:{}", bind_addr, port_actual).parse().ok()?;
        if let Err(e) = socket.bind(&socket2::SockAddr::from(addr)) {
            com_printf(&format!("WARNING: UDP_OpenSocket: bind: {}\n", e));
            return None;
        }
        if let Err(e) = socket.set_nonblocking(true) {
            com_printf(&format!("WARNING: UDP_OpenSocket: set_nonblocking: {}\n", e));
            return None;
        }
        if let Err(e) = socket.set_broadcast(true) {
            com_printf(&format!("WARNING: UDP_OpenSocket: set_broadcast: {}\n", e));
            return None;
        }

        Some(socket.into())
    }

    /// Local port actually bound, useful when `PORT_ANY` was requested.
    pub fn local_port(&self) -> Option<u16> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok()).map(|a| a.port())
    }
}

impl NetLink for UdpLink {
    fn init(&mut self) -> Result<(), i32> {
        Ok(())
    }

    fn listen(&mut self, enable: bool) -> Result<(), i32> {
        if !enable {
            self.io_manager.shutdown();
            self.socket = None;
            return Ok(());
        }

        if self.socket.is_some() {
            return Ok(());
        }

        let socket = Self::open_udp_socket(&self.interface, self.port).ok_or(-1)?;
        let socket = Arc::new(socket);
        self.socket = Some(Arc::clone(&socket));
        self.io_manager.spawn_udp(self.sock, socket, self.queue.sender());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> ReadResult {
        match self.queue.try_recv() {
            Some(packet) => {
                if packet.data.len() > buf.len() {
                    com_printf(&format!(
                        "Oversize packet from {}\n",
                        vqcore_common::net::net_adr_to_string(&packet.from)
                    ));
                    return Ok(None);
                }
                buf[..packet.data.len()].copy_from_slice(&packet.data);
                Ok(Some((packet.data.len(), packet.from)))
            }
            None => Ok(None),
        }
    }

    fn write(&mut self, buf: &[u8], peer: &NetAdr) -> Result<(), i32> {
        let socket = self.socket.as_ref().ok_or(-1)?;
        let addr = netadr_to_socket_addr(peer);
        socket.send_to(buf, addr).map_err(|_| -1)?;
        Ok(())
    }

    fn broadcast(&mut self, buf: &[u8]) -> Result<(), i32> {
        let socket = self.socket.as_ref().ok_or(-1)?;
        // LAN server discovery always targets the well-known server port,
        // not whatever ephemeral port this socket itself is bound to.
        let addr = std::net::SocketAddr::from((
            std::net::Ipv4Addr::BROADCAST,
            vqcore_common::qcommon::PORT_SERVER as u16,
        ));
        socket.send_to(buf, addr).map_err(|_| -1)?;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.io_manager.shutdown();
        self.socket = None;
    }
}

/// Resolve a hostname or `host:port` string to a `NetAdr`, for connect-by-name.
pub fn get_addr_from_name(name: &str) -> Option<NetAdr> {
    net_string_to_adr(name)
}

/// Format an address, optionally hiding the low bits of the *host* portion
/// (not the port) for privacy — e.g. `192.168.1.xxx:27910`. The corresponding
/// IPv6 case masks the low 64 bits of the address.
pub fn addr_to_string(addr: &NetAdr, masked: bool) -> String {
    if !masked {
        return vqcore_common::net::net_adr_to_string(addr);
    }
    let port = u16::from_be(addr.port);
    match addr.adr_type {
        NetAdrType::Ip | NetAdrType::Broadcast => {
            format!("{}.{}.{}.xxx:{}", addr.ip[0], addr.ip[1], addr.ip[2], port)
        }
        NetAdrType::Ip6 | NetAdrType::Broadcast6 => {
            let high_groups: Vec<String> = (0..4)
                .map(|i| format!("{:x}", u16::from_be_bytes([addr.ip6[i * 2], addr.ip6[i * 2 + 1]])))
                .collect();
            let prefix = high_groups.join(":");
            if addr.scope_id != 0 {
                format!("[{}:x:x:x:x%{}]:{}", prefix, addr.scope_id, port)
            } else {
                format!("[{}:x:x:x:x]:{}", prefix, port)
            }
        }
        NetAdrType::Loopback => "loopback".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_and_closing_releases_the_socket() {
        let mut link = UdpLink::new(NetSrc::Server, "127.0.0.1", PORT_ANY);
        assert!(link.listen(true).is_ok());
        assert!(link.local_port().unwrap() > 0);
        link.listen(false).unwrap();
        assert!(link.socket.is_none());
    }

    #[test]
    fn masked_address_hides_host_not_port() {
        let addr = NetAdr {
            adr_type: NetAdrType::Ip,
            ip: [192, 168, 1, 100],
            ip6: [0; 16],
            scope_id: 0,
            port: 27910u16.to_be(),
        };
        assert_eq!(addr_to_string(&addr, false), "192.168.1.100:27910");
        assert_eq!(addr_to_string(&addr, true), "192.168.1.xxx:27910");
    }

    #[test]
    fn masked_ipv6_hides_low_bits_of_host() {
        let addr = NetAdr {
            adr_type: NetAdrType::Ip6,
            ip: [0; 4],
            ip6: [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
            scope_id: 0,
            port: 27910u16.to_be(),
        };
        assert_eq!(addr_to_string(&addr, true), "[fe80:0:0:0:x:x:x:x]:27910");
    }

    #[test]
    fn loopback_roundtrip_over_real_sockets() {
        let mut a = UdpLink::new(NetSrc::Server, "127.0.0.1", PORT_ANY);
        let mut b = UdpLink::new(NetSrc::Client, "127.0.0.1", PORT_ANY);
        a.listen(true).unwrap();
        b.listen(true).unwrap();

        let a_port = a.local_port().unwrap();
        let peer = NetAdr {
            adr_type: NetAdrType::Ip,
            ip: [127, 0, 0, 1],
            ip6: [0; 16],
            scope_id: 0,
            port: a_port.to_be(),
        };

        b.write(b"hello", &peer).unwrap();

        let mut buf = [0u8; 64];
        let mut got = None;
        for _ in 0..200 {
            if let Some((n, from)) = a.read(&mut buf).unwrap() {
                got = Some((n, from));
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        let (n, _from) = got.expect("packet should have arrived within timeout");
        assert_eq!(&buf[..n], b"hello");
    }
}
