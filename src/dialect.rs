/// Wire compatibility mode: selects framing, attribute variants, and
/// credential policy (§6 "Dialect selectors").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// 3489bis compatibility, long-term credentials, channel binding.
    Draft9,
    /// RFC3489 compatibility, short-term credentials, no-indication-auth.
    Msn,
    /// RFC3489 compatibility, credentials ignored entirely.
    Google,
}

impl Dialect {
    /// Whether inbound control traffic from the server must carry the
    /// fixed TURN `MAGIC_COOKIE` attribute to be accepted as STUN at all.
    /// DRAFT9 never validates this; MSN/GOOGLE always require it.
    pub fn requires_magic_cookie(self) -> bool {
        !matches!(self, Dialect::Draft9)
    }

    /// Whether addresses in PEER_ADDRESS/REMOTE_ADDRESS attributes are
    /// XOR-mapped (DRAFT9) or plain-mapped (MSN/GOOGLE).
    pub fn xor_mapped_addresses(self) -> bool {
        matches!(self, Dialect::Draft9)
    }
}
