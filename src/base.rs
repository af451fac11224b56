use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;

use log::{trace, warn};

use crate::address::Endpoint;
use crate::transport::Transport;

/// Adapts a plain UDP socket to the [`Transport`] contract: non-blocking,
/// close-on-exec, with error-queue draining on receive failure so a
/// pending ICMP-originated error doesn't starve every future `recv`.
///
/// The error-queue drain is the one place in this crate that reaches past
/// `std::net` to a raw `recvmsg` call; everywhere else the adapter rides
/// on `UdpSocket::send_to`/`recv_from`.
pub struct BaseTransport {
    socket: UdpSocket,
}

impl BaseTransport {
    /// Opens a UDP socket bound to `local`, or to any address/port if
    /// `local` is `None`.
    pub fn bind(local: Option<Endpoint>) -> std::io::Result<Self> {
        let addr = local
            .map(|e| e.copy_to_sockaddr())
            .unwrap_or_else(|| "0.0.0.0:0".parse().unwrap());
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        set_cloexec(&socket);
        set_recverr(&socket);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }

    /// Silently dequeues one pending error-queue notification, if any.
    /// Mirrors the reference adapter's `sock_recv_err`: best-effort, never
    /// propagates a failure of its own.
    fn drain_one_error(&self) -> bool {
        let fd = self.socket.as_raw_fd();
        let mut hdr: libc::msghdr = unsafe { std::mem::zeroed() };
        let ret = unsafe { libc::recvmsg(fd, &mut hdr, libc::MSG_ERRQUEUE) };
        ret == 0
    }
}

impl Transport for BaseTransport {
    fn send(&mut self, to: &Endpoint, buf: &[u8]) -> bool {
        let addr = to.copy_to_sockaddr();
        let mut attempt = self.socket.send_to(buf, addr);

        while attempt.is_err() && self.drain_one_error() {
            attempt = self.socket.send_to(buf, addr);
        }

        match attempt {
            Ok(sent) => sent == buf.len(),
            Err(e) => {
                warn!("base transport send failed: {e}");
                false
            }
        }
    }

    fn recv(&mut self, from: &mut Endpoint, buf: &mut [u8]) -> isize {
        match self.socket.recv_from(buf) {
            Ok((n, addr)) => {
                from.set_from_sockaddr(addr);
                n as isize
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => 0,
            Err(e) => {
                trace!("base transport recv failed: {e}");
                self.drain_one_error();
                -1
            }
        }
    }

    fn close(&mut self) {
        // `UdpSocket`'s `Drop` impl closes the descriptor; nothing else to
        // release here.
    }
}

fn set_cloexec(socket: &UdpSocket) {
    let fd = socket.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags >= 0 {
            libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC);
        }
    }
}

fn set_recverr(socket: &UdpSocket) {
    let fd = socket.as_raw_fd();
    let enable: libc::c_int = 1;
    unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IP,
            libc::IP_RECVERR,
            &enable as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_send_recv_roundtrips() {
        let mut a = BaseTransport::bind(None).unwrap();
        let mut b = BaseTransport::bind(None).unwrap();

        let b_addr = Endpoint::new(b.local_addr().unwrap());
        assert!(a.send(&b_addr, b"hello"));

        std::thread::sleep(std::time::Duration::from_millis(20));

        let mut from = Endpoint::new(b_addr.copy_to_sockaddr());
        let mut buf = [0u8; 16];
        let n = b.recv(&mut from, &mut buf);
        assert_eq!(n, 5);
        assert_eq!(&buf[..5], b"hello");
    }

    #[test]
    fn recv_on_idle_socket_is_zero() {
        let mut a = BaseTransport::bind(None).unwrap();
        let mut from = Endpoint::new(a.local_addr().unwrap());
        let mut buf = [0u8; 16];
        assert_eq!(a.recv(&mut from, &mut buf), 0);
    }
}
