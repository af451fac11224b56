use std::net::SocketAddr;

/// Protocol-neutral endpoint: an IP+port pair, family-tagged by virtue of
/// wrapping [`SocketAddr`] directly rather than a raw byte buffer.
/// Equality compares family, address bytes and port all at once, which
/// `SocketAddr`'s own `PartialEq` already does correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint(SocketAddr);

impl Endpoint {
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Install this endpoint's value from an OS-form socket address, as
    /// produced by a `recv_from`/`accept`-style call.
    pub fn set_from_sockaddr(&mut self, addr: SocketAddr) {
        self.0 = addr;
    }

    /// Translate to the OS wire form expected by `send_to`/`connect`.
    pub fn copy_to_sockaddr(&self) -> SocketAddr {
        self.0
    }

    pub fn equal(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl From<Endpoint> for SocketAddr {
    fn from(ep: Endpoint) -> Self {
        ep.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_construction_path() {
        let a = Endpoint::new("192.168.0.1:1234".parse().unwrap());
        let mut b = Endpoint::new("0.0.0.0:0".parse().unwrap());
        b.set_from_sockaddr("192.168.0.1:1234".parse().unwrap());
        assert!(a.equal(&b));
        assert_eq!(a.copy_to_sockaddr(), b.copy_to_sockaddr());
    }

    #[test]
    fn port_mismatch_is_unequal() {
        let a = Endpoint::new("192.168.0.1:1234".parse().unwrap());
        let b = Endpoint::new("192.168.0.1:1235".parse().unwrap());
        assert!(!a.equal(&b));
    }
}
