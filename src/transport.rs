use crate::address::Endpoint;

/// The transport seam component D is built against. `send`/`recv` mirror a
/// raw non-blocking socket's contract rather than a `Result`-returning one:
/// a relay that can't reach its peer right now fires-and-forgets, it
/// doesn't retry or queue (see the design notes on retransmission).
pub trait Transport {
    /// Send `buf` to `to`. Returns `false` on a hard failure (closed
    /// transport, destination unreachable); a transient short send still
    /// reports `true` once the implementation's own retry policy, if any,
    /// is exhausted or resolved.
    fn send(&mut self, to: &Endpoint, buf: &[u8]) -> bool;

    /// Receive one datagram into `buf`, writing its origin into `from`.
    /// Returns the number of bytes written, `0` if nothing is pending
    /// right now, or `-1` on a hard transport failure.
    fn recv(&mut self, from: &mut Endpoint, buf: &mut [u8]) -> isize;

    /// Release any resources the transport holds. Idempotent.
    fn close(&mut self);
}
