// net_loop.rs -- in-process loopback transport for a singleplayer or listen
// server talking to its own local client. Converted from the `Loopback`/
// `LoopMsg` ring buffer in myq2-original/win32/net_common.rs, lifted out of
// `NetState` into its own `NetLink` so NetChan can drive it exactly like a
// real socket. Two rings, one per direction; no sequencing or ACKs here,
// since a same-process hand-off never drops or reorders.

use parking_lot::Mutex;
use std::sync::Arc;
use vqcore_common::qcommon::{NetAdr, NetAdrType, MAX_NET_MESSAGE};

use crate::net_common::{NetLink, ReadResult};
use crate::MAX_LOOPBACK;

#[derive(Clone)]
struct LoopMsg {
    data: Vec<u8>,
}

struct LoopRing {
    msgs: [Option<LoopMsg>; MAX_LOOPBACK],
    get: u64,
    send: u64,
}

impl Default for LoopRing {
    fn default() -> Self {
        Self {
            msgs: std::array::from_fn(|_| None),
            get: 0,
            send: 0,
        }
    }
}

impl LoopRing {
    fn push(&mut self, data: &[u8]) {
        let len = data.len().min(MAX_NET_MESSAGE);
        let i = (self.send % MAX_LOOPBACK as u64) as usize;
        self.msgs[i] = Some(LoopMsg { data: data[..len].to_vec() });
        self.send += 1;
    }

    fn pop(&mut self) -> Option<Vec<u8>> {
        // A producer that outruns the consumer by a full ring just loses the
        // oldest unread entries, matching the teacher's "get = send - MAX_LOOPBACK"
        // catch-up behavior.
        if self.send - self.get > MAX_LOOPBACK as u64 {
            self.get = self.send - MAX_LOOPBACK as u64;
        }
        if self.get >= self.send {
            return None;
        }
        let i = (self.get % MAX_LOOPBACK as u64) as usize;
        self.get += 1;
        self.msgs[i].take().map(|m| m.data)
    }
}

/// One endpoint of a loopback pair. `write` enqueues onto the peer's inbound
/// ring; `read` drains this endpoint's own inbound ring.
pub struct LoopLink {
    inbound: Arc<Mutex<LoopRing>>,
    outbound: Arc<Mutex<LoopRing>>,
    local_addr: NetAdr,
}

impl LoopLink {
    /// Build a connected pair: whatever side 0 writes, side 1 reads, and
    /// vice versa.
    pub fn pair() -> (LoopLink, LoopLink) {
        let ring_a = Arc::new(Mutex::new(LoopRing::default()));
        let ring_b = Arc::new(Mutex::new(LoopRing::default()));

        let side_a = LoopLink {
            inbound: Arc::clone(&ring_a),
            outbound: Arc::clone(&ring_b),
            local_addr: loopback_addr(),
        };
        let side_b = LoopLink {
            inbound: ring_b,
            outbound: ring_a,
            local_addr: loopback_addr(),
        };
        (side_a, side_b)
    }

    pub fn local_addr(&self) -> NetAdr {
        self.local_addr
    }
}

fn loopback_addr() -> NetAdr {
    NetAdr {
        adr_type: NetAdrType::Loopback,
        ..Default::default()
    }
}

impl NetLink for LoopLink {
    fn init(&mut self) -> Result<(), i32> {
        Ok(())
    }

    fn listen(&mut self, _enable: bool) -> Result<(), i32> {
        // A loopback pair exists for its whole lifetime; there is no socket
        // to open or close.
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> ReadResult {
        let mut ring = self.inbound.lock();
        match ring.pop() {
            Some(data) => {
                if data.len() > buf.len() {
                    return Ok(None);
                }
                buf[..data.len()].copy_from_slice(&data);
                Ok(Some((data.len(), self.local_addr)))
            }
            None => Ok(None),
        }
    }

    fn write(&mut self, buf: &[u8], _peer: &NetAdr) -> Result<(), i32> {
        self.outbound.lock().push(buf);
        Ok(())
    }

    fn broadcast(&mut self, buf: &[u8]) -> Result<(), i32> {
        self.outbound.lock().push(buf);
        Ok(())
    }

    fn shutdown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_delivers_in_both_directions() {
        let (mut a, mut b) = LoopLink::pair();
        let addr = a.local_addr();

        a.write(b"ping", &addr).unwrap();
        let mut buf = [0u8; 16];
        let (n, _) = b.read(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..n], b"ping");

        b.write(b"pong", &addr).unwrap();
        let (n, _) = a.read(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..n], b"pong");
    }

    #[test]
    fn empty_ring_reads_as_none() {
        let (mut a, _b) = LoopLink::pair();
        let mut buf = [0u8; 16];
        assert!(a.read(&mut buf).unwrap().is_none());
    }

    #[test]
    fn overrun_ring_drops_oldest_entries() {
        let (mut a, mut b) = LoopLink::pair();
        let addr = a.local_addr();
        for i in 0..(MAX_LOOPBACK as u8 * 2) {
            a.write(&[i], &addr).unwrap();
        }
        let mut buf = [0u8; 16];
        let (_, _) = b.read(&mut buf).unwrap().unwrap();
        // First readable entry should be from the second lap, not byte 0.
        assert_eq!(buf[0], MAX_LOOPBACK as u8);
    }
}
