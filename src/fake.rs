use std::collections::VecDeque;

use crate::address::Endpoint;
use crate::transport::Transport;

/// Deterministic in-memory transport for tests: an inbound queue the test
/// pushes datagrams onto (standing in for the network), and an outbound
/// queue recording every `send` so the test can assert on exactly what
/// the relay shim would have put on the wire.
#[derive(Debug, Default)]
pub struct FakeTransport {
    inbox: VecDeque<(Endpoint, Vec<u8>)>,
    outbox: VecDeque<(Endpoint, Vec<u8>)>,
    closed: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a datagram as if it arrived from `from`, for the next
    /// `recv` call to surface.
    pub fn push_inbound(&mut self, from: Endpoint, bytes: &[u8]) {
        self.inbox.push_back((from, bytes.to_vec()));
    }

    /// Pops the oldest datagram this transport was asked to send, for
    /// test assertions on outbound framing.
    pub fn pop_outbound(&mut self) -> Option<(Endpoint, Vec<u8>)> {
        self.outbox.pop_front()
    }

    pub fn outbound_len(&self) -> usize {
        self.outbox.len()
    }
}

impl Transport for FakeTransport {
    fn send(&mut self, to: &Endpoint, buf: &[u8]) -> bool {
        if self.closed {
            return false;
        }
        self.outbox.push_back((*to, buf.to_vec()));
        true
    }

    fn recv(&mut self, from: &mut Endpoint, buf: &mut [u8]) -> isize {
        if self.closed {
            return -1;
        }
        match self.inbox.pop_front() {
            Some((origin, bytes)) => {
                from.set_from_sockaddr(origin.copy_to_sockaddr());
                let n = buf.len().min(bytes.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                n as isize
            }
            None => 0,
        }
    }

    fn close(&mut self) {
        self.closed = true;
        self.inbox.clear();
        self.outbox.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recv_drains_pushed_datagram_in_order() {
        let mut t = FakeTransport::new();
        let origin = Endpoint::new("192.168.0.1:9".parse().unwrap());
        t.push_inbound(origin, b"\x80lalala");

        let mut from = Endpoint::new("0.0.0.0:0".parse().unwrap());
        let mut buf = [0u8; 1024];
        let n = t.recv(&mut from, &mut buf);
        assert_eq!(n, 7);
        assert_eq!(&buf[..7], b"\x80lalala");
        assert!(from.equal(&origin));
    }

    #[test]
    fn send_is_recorded_for_inspection() {
        let mut t = FakeTransport::new();
        let server = Endpoint::new("10.0.0.1:3478".parse().unwrap());
        t.send(&server, b"hi");
        let (to, bytes) = t.pop_outbound().unwrap();
        assert!(to.equal(&server));
        assert_eq!(bytes, b"hi");
    }

    #[test]
    fn closed_transport_fails_both_directions() {
        let mut t = FakeTransport::new();
        t.close();
        let server = Endpoint::new("10.0.0.1:3478".parse().unwrap());
        assert!(!t.send(&server, b"x"));
        let mut from = Endpoint::new("0.0.0.0:0".parse().unwrap());
        let mut buf = [0u8; 16];
        assert_eq!(t.recv(&mut from, &mut buf), -1);
    }
}
