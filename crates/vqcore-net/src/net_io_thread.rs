// net_io_thread.rs -- dedicated background thread that drains a UDP socket
// and feeds received packets into a `PacketQueue`, decoupling socket I/O from
// NetChan's poll-driven processing. Converted from:
// myq2-original/win32/net_io_thread.rs, UDP half only -- the spec has no TCP
// transport, so the teacher's parallel TCP I/O thread was not ported.

use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use vqcore_common::common::{com_printf, sys_milliseconds};
use vqcore_common::net_queue::{PacketQueueSender, QueuedPacket};
use vqcore_common::qcommon::{NetSrc, MAX_NET_MESSAGE};

use crate::net_common::socket_addr_to_netadr;

/// Poll timeout for non-blocking socket operations.
const IO_POLL_TIMEOUT_MS: u64 = 10;

/// Maximum packets drained per loop iteration, to keep one busy socket from
/// starving others sharing the thread pool.
const MAX_PACKETS_PER_ITERATION: usize = 32;

pub struct UdpIoConfig {
    pub sock: NetSrc,
    pub socket: Arc<UdpSocket>,
    pub sender: PacketQueueSender,
    pub shutdown: Arc<AtomicBool>,
}

pub fn spawn_udp_io_thread(config: UdpIoConfig) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("udp-io-{:?}", config.sock))
        .spawn(move || {
            udp_io_loop(config);
        })
        .expect("failed to spawn UDP I/O thread")
}

fn udp_io_loop(config: UdpIoConfig) {
    let socket = &config.socket;
    let sender = &config.sender;
    let shutdown = &config.shutdown;
    let sock = config.sock;

    if let Err(e) = socket.set_read_timeout(Some(Duration::from_millis(IO_POLL_TIMEOUT_MS))) {
        com_printf(&format!("UDP I/O thread: failed to set timeout: {}\n", e));
        return;
    }

    let mut buf = [0u8; MAX_NET_MESSAGE];

    while !shutdown.load(Ordering::Relaxed) {
        if sender.is_disconnected() {
            break;
        }

        let mut packets_this_iteration = 0;

        loop {
            match socket.recv_from(&mut buf) {
                Ok((size, from_addr)) => {
                    if size > 0 && size < MAX_NET_MESSAGE {
                        let from = socket_addr_to_netadr(&from_addr);
                        let packet =
                            QueuedPacket::new(sock, from, buf[..size].to_vec(), sys_milliseconds());
                        let _ = sender.try_send(packet);

                        packets_this_iteration += 1;
                        if packets_this_iteration >= MAX_PACKETS_PER_ITERATION {
                            break;
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) => {
                    if !shutdown.load(Ordering::Relaxed) {
                        com_printf(&format!("UDP I/O error: {}\n", e));
                    }
                    break;
                }
            }
        }
    }
}

/// Owns the lifetime of the UDP I/O threads: one per open socket (client,
/// server), joined on shutdown.
pub struct NetIoThreadManager {
    shutdown: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl NetIoThreadManager {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.threads.is_empty()
    }

    pub fn spawn_udp(&mut self, sock: NetSrc, socket: Arc<UdpSocket>, sender: PacketQueueSender) {
        let config = UdpIoConfig {
            sock,
            socket,
            sender,
            shutdown: Arc::clone(&self.shutdown),
        };
        self.threads.push(spawn_udp_io_thread(config));
    }

    pub fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn shutdown(&mut self) {
        self.signal_shutdown();
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Default for NetIoThreadManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NetIoThreadManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_lifecycle_with_no_threads() {
        let mut manager = NetIoThreadManager::new();
        assert!(!manager.is_enabled());
        manager.shutdown();
        assert!(!manager.is_enabled());
    }
}
