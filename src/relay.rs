use bytes::BytesMut;
use log::{debug, trace, warn};
use rand::Rng;

use stun::attribute::*;
use stun::{ChannelData, Decoder, Kind, MessageWriter, Method, Payload};

use crate::address::Endpoint;
use crate::dialect::Dialect;
use crate::error::Error;
use crate::transport::Transport;

/// STUN messages above this size are sent passthrough instead of framed;
/// chosen to stay under a single unfragmented UDP datagram over typical
/// tunneled paths (RFC5389's own recommended ceiling).
const STUN_MAX_MESSAGE_SIZE: usize = 1260;

/// Fixed magic value MSN/GOOGLE control messages carry in a MAGIC_COOKIE
/// attribute, standing in for the STUN header's own cookie field which
/// those dialects' servers don't check.
const TURN_MAGIC_COOKIE: u32 = 0x7247_4355;

const CHANNEL_LOW: u16 = 0x4000;
const CHANNEL_HIGH: u16 = 0xFFFE;

/// A recv-side scratch buffer large enough for any message this crate
/// builds or accepts.
const SCRATCH_LEN: usize = 2048;

/// `(peer, channel)`. `channel` is meaningful only under [`Dialect::Draft9`];
/// elsewhere it is always `0` and the pair means "peer is authorized".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelBinding {
    pub peer: Endpoint,
    pub channel: u16,
}

/// `(username, password)`. MSN's are base64-decoded from caller input by
/// the factory; GOOGLE never has a password.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: Vec<u8>,
    pub password: Option<Vec<u8>>,
}

impl Credentials {
    fn username_str(&self) -> &str {
        std::str::from_utf8(&self.username).unwrap_or("")
    }

    fn password_str(&self) -> &str {
        self.password
            .as_deref()
            .and_then(|p| std::str::from_utf8(p).ok())
            .unwrap_or("")
    }

    /// Zero the backing buffers in place, so a dropped `Credentials` does
    /// not leave the digest material sitting in freed memory.
    fn clear(&mut self) {
        for b in self.username.iter_mut() {
            *b = 0;
        }
        if let Some(p) = self.password.as_mut() {
            for b in p.iter_mut() {
                *b = 0;
            }
        }
    }
}

/// Per-peer channel/destination binding state machine and framer for one
/// TURN relay connection. Polymorphic over the transport (`T`) it drives;
/// see [`crate::base::BaseTransport`] for the live BSD-socket adapter and
/// [`crate::fake::FakeTransport`] for the deterministic test double.
pub struct RelayState<T: Transport> {
    server: Endpoint,
    base: T,
    dialect: Dialect,
    credentials: Credentials,
    realm: String,
    nonce: String,
    bindings: Vec<ChannelBinding>,
    pending: Option<ChannelBinding>,
    send_buf: BytesMut,
    recv_buf: Vec<u8>,
    decoder: Decoder,
}

/// Outcome of classifying one datagram that arrived from the TURN server,
/// computed while the STUN reader is still borrowed and applied to
/// `RelayState` afterwards so the two borrows never overlap.
enum ControlAction {
    /// Control traffic consumed with no further effect.
    Consumed,
    Lock,
    Retry { realm: String, nonce: String },
    Commit,
    Data {
        addr: std::net::SocketAddr,
        data: Vec<u8>,
    },
}

impl<T: Transport> RelayState<T> {
    pub fn new(base: T, server: Endpoint, credentials: Credentials, dialect: Dialect) -> Self {
        Self {
            server,
            base,
            dialect,
            credentials,
            realm: String::new(),
            nonce: String::new(),
            bindings: Vec::new(),
            pending: None,
            send_buf: BytesMut::with_capacity(SCRATCH_LEN),
            recv_buf: vec![0u8; SCRATCH_LEN],
            decoder: Decoder::new(),
        }
    }

    pub fn bindings(&self) -> &[ChannelBinding] {
        &self.bindings
    }

    pub fn pending(&self) -> Option<ChannelBinding> {
        self.pending
    }

    /// Direct access to the owned transport, mainly useful in tests that
    /// drive a [`crate::fake::FakeTransport`] by hand.
    pub fn base_mut(&mut self) -> &mut T {
        &mut self.base
    }

    fn binding_for(&self, peer: &Endpoint) -> Option<ChannelBinding> {
        self.bindings.iter().copied().find(|b| b.peer.equal(peer))
    }

    /// Lowest channel in `[0x4000, 0xFFFE]` not already used by a
    /// committed or pending binding. Fixes the upstream allocator's bug
    /// of resetting on the first collision instead of continuing past it
    /// (see design notes).
    fn lowest_free_channel(&self) -> Option<u16> {
        let mut used: Vec<u16> = self.bindings.iter().map(|b| b.channel).collect();
        if let Some(p) = self.pending {
            used.push(p.channel);
        }
        used.sort_unstable();

        let mut candidate = CHANNEL_LOW;
        for c in used {
            if c == candidate {
                candidate = candidate.checked_add(1)?;
            } else if c > candidate {
                break;
            }
        }
        (candidate <= CHANNEL_HIGH).then_some(candidate)
    }

    fn long_term_key(&self) -> [u8; 16] {
        stun::util::long_key(
            self.credentials.username_str(),
            self.credentials.password_str(),
            &self.realm,
        )
    }

    /// Short-term credential key: RFC5389-style keys off the password
    /// alone, falling back to the username when no password is set
    /// (GOOGLE, which never has one).
    fn short_term_key(&self) -> [u8; 16] {
        let raw = self
            .credentials
            .password
            .as_deref()
            .unwrap_or(&self.credentials.username);
        let mut out = [0u8; 16];
        let n = raw.len().min(16);
        out[..n].copy_from_slice(&raw[..n]);
        out
    }

    fn fresh_token(&self) -> [u8; 12] {
        let mut token = [0u8; 12];
        rand::thread_rng().fill(&mut token);
        token
    }

    /// Register intent to relay to `peer`. See module docs for the
    /// per-dialect handshake this kicks off.
    pub fn set_peer(&mut self, peer: Endpoint) -> bool {
        if self.pending.is_some() {
            debug!("set_peer rejected: a binding is already pending");
            return false;
        }

        match self.dialect {
            Dialect::Draft9 => {
                let channel = match self.lowest_free_channel() {
                    Some(c) => c,
                    None => {
                        warn!("set_peer rejected: no free DRAFT9 channel");
                        return false;
                    }
                };

                if self.build_channel_bind(peer, channel, "", "").is_err() {
                    warn!("failed to build CHANNELBIND request");
                    return false;
                }

                trace!("set_peer: CHANNELBIND request for channel {channel:#06x}");
                self.base.send(&self.server, &self.send_buf);
                self.pending = Some(ChannelBinding { peer, channel });
                true
            }
            Dialect::Msn => {
                if self.build_set_active_destination(peer).is_err() {
                    warn!("failed to build OLD_SET_ACTIVE_DESTINATION request");
                    return false;
                }

                self.base.send(&self.server, &self.send_buf);
                self.pending = Some(ChannelBinding { peer, channel: 0 });
                true
            }
            Dialect::Google => {
                self.pending = Some(ChannelBinding { peer, channel: 0 });
                true
            }
        }
    }

    fn build_channel_bind(
        &mut self,
        peer: Endpoint,
        channel: u16,
        realm: &str,
        nonce: &str,
    ) -> Result<(), Error> {
        let token = self.fresh_token();
        let username = self.credentials.username.clone();
        let key = if realm.is_empty() {
            self.long_term_key()
        } else {
            stun::util::long_key(self.credentials.username_str(), self.credentials.password_str(), realm)
        };

        let mut msg =
            MessageWriter::new(Method::ChannelBind(Kind::Request), &token, &mut self.send_buf);
        msg.append::<ChannelNumber>(channel);
        msg.append::<PeerAddress>(peer.copy_to_sockaddr());
        if !username.is_empty() {
            msg.append::<UserName>(std::str::from_utf8(&username).unwrap_or(""));
        }
        if !realm.is_empty() {
            msg.append::<Realm>(realm);
            msg.append::<Nonce>(nonce);
        }
        msg.flush(Some(&key))?;
        Ok(())
    }

    fn build_set_active_destination(&mut self, peer: Endpoint) -> Result<(), Error> {
        let token = self.fresh_token();
        let key = self.short_term_key();

        let mut msg = MessageWriter::new(
            Method::SetActiveDestination(Kind::Request),
            &token,
            &mut self.send_buf,
        );
        msg.append::<MagicCookie>(TURN_MAGIC_COOKIE);
        msg.append::<UserName>(self.credentials.username_str());
        msg.append::<DestinationAddress>(peer.copy_to_sockaddr());
        msg.flush(Some(&key))?;
        Ok(())
    }

    /// Frame `bytes` for `to` per the dialect's outbound table and hand
    /// it to the base transport. Fire-and-forget: the transport's own
    /// success/failure is never surfaced (see design notes).
    pub fn send(&mut self, to: &Endpoint, bytes: &[u8]) -> bool {
        match self.dialect {
            Dialect::Draft9 => self.send_draft9(to, bytes),
            Dialect::Msn => self.send_msn_google(to, bytes, false),
            Dialect::Google => self.send_msn_google(to, bytes, true),
        }
    }

    fn send_draft9(&mut self, to: &Endpoint, bytes: &[u8]) -> bool {
        if let Some(binding) = self.binding_for(to) {
            if bytes.len() + 4 <= STUN_MAX_MESSAGE_SIZE {
                self.send_buf.clear();
                self.send_buf
                    .extend_from_slice(&binding.channel.to_be_bytes());
                self.send_buf
                    .extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                self.send_buf.extend_from_slice(bytes);
                self.base.send(&self.server, &self.send_buf);
                return true;
            }
            // oversize: fall through to passthrough below.
        } else {
            let token = self.fresh_token();
            let built: Result<(), Error> = (|| {
                let mut msg =
                    MessageWriter::new(Method::SendIndication, &token, &mut self.send_buf);
                msg.append::<PeerAddress>(to.copy_to_sockaddr());
                msg.append::<Data>(bytes);
                msg.flush(None)?;
                Ok(())
            })();

            if built.is_ok() {
                self.base.send(&self.server, &self.send_buf);
                return true;
            }
            // construction failure: fall through to passthrough below.
        }

        self.base.send(to, bytes);
        true
    }

    fn send_msn_google(&mut self, to: &Endpoint, bytes: &[u8], google: bool) -> bool {
        if self.binding_for(to).is_some() {
            // Already locked onto this peer: relay raw, no STUN framing.
            self.base.send(to, bytes);
            return true;
        }

        let lock = google
            && self
                .pending
                .map(|p| p.peer.equal(to))
                .unwrap_or(false);

        let token = self.fresh_token();
        let username = self.credentials.username.clone();
        let key = self.short_term_key();
        let built: Result<(), Error> = (|| {
            let mut msg =
                MessageWriter::new(Method::Send(Kind::Request), &token, &mut self.send_buf);
            msg.append::<MagicCookie>(TURN_MAGIC_COOKIE);
            msg.append::<UserName>(std::str::from_utf8(&username).unwrap_or(""));
            msg.append::<DestinationAddress>(to.copy_to_sockaddr());
            msg.append::<Data>(bytes);
            if lock {
                msg.append::<Options>(1);
            }

            if google {
                // credentials-ignored policy: no MESSAGE-INTEGRITY/FINGERPRINT.
                msg.flush(None)?;
            } else {
                msg.flush(Some(&key))?;
            }
            Ok(())
        })();

        if built.is_ok() {
            self.base.send(&self.server, &self.send_buf);
        } else {
            self.base.send(to, bytes);
        }
        true
    }

    /// Drain one datagram, classify it, and either consume it internally
    /// (returning `0`) or deliver user data (returning its length with
    /// `out_from` filled in).
    pub fn recv(&mut self, out_from: &mut Endpoint, out_buf: &mut [u8]) -> isize {
        let mut from = Endpoint::new(self.server.copy_to_sockaddr());
        let n = {
            let scratch = &mut self.recv_buf;
            self.base.recv(&mut from, scratch)
        };

        if n < 0 {
            return -1;
        }
        if n == 0 {
            return 0;
        }
        let n = n as usize;

        if from.equal(&self.server) {
            if let Some(result) = self.try_classify_control(n, out_from, out_buf) {
                return result;
            }
        }

        self.classify_channel_data(&from, n, out_from, out_buf)
    }

    /// Attempts the STUN control-message classification path (§4.D.3 step
    /// 1). Returns `None` to signal "fall through to ChannelData
    /// classification", `Some(n)` when the datagram was consumed or
    /// yielded user data.
    fn try_classify_control(
        &mut self,
        n: usize,
        out_from: &mut Endpoint,
        out_buf: &mut [u8],
    ) -> Option<isize> {
        let buf = self.recv_buf[..n].to_vec();

        let action = {
            let payload = self.decoder.decode(&buf).ok()?;
            let reader = match payload {
                Payload::Message(r) => r,
                Payload::ChannelData(_) => return None,
            };

            if self.dialect.requires_magic_cookie() {
                match reader.get::<MagicCookie>() {
                    Some(c) if c == TURN_MAGIC_COOKIE => {}
                    _ => return None,
                }
            }

            match reader.method {
                Method::Send(Kind::Response) => {
                    if matches!(self.dialect, Dialect::Google)
                        && reader.get::<Options>().map(|o| o & 1 != 0).unwrap_or(false)
                    {
                        ControlAction::Lock
                    } else {
                        ControlAction::Consumed
                    }
                }
                Method::SetActiveDestination(Kind::Response) => {
                    if matches!(self.dialect, Dialect::Msn) {
                        ControlAction::Lock
                    } else {
                        ControlAction::Consumed
                    }
                }
                Method::ChannelBind(Kind::Error) => {
                    if self.pending.is_some() {
                        let realm = reader.get::<Realm>().unwrap_or("").to_string();
                        let nonce = reader.get::<Nonce>().unwrap_or("").to_string();
                        ControlAction::Retry { realm, nonce }
                    } else {
                        ControlAction::Consumed
                    }
                }
                Method::ChannelBind(Kind::Response) => {
                    if self.pending.is_some() {
                        ControlAction::Commit
                    } else {
                        ControlAction::Consumed
                    }
                }
                Method::DataIndication => {
                    let addr = if self.dialect.xor_mapped_addresses() {
                        reader.get::<RemoteAddress>()
                    } else {
                        reader.get::<RemoteAddressPlain>()
                    };
                    let data = reader.get::<Data>();
                    match (addr, data) {
                        (Some(addr), Some(data)) => ControlAction::Data {
                            addr,
                            data: data.to_vec(),
                        },
                        _ => return None,
                    }
                }
                _ => return None,
            }
        };

        Some(match action {
            ControlAction::Consumed => 0,
            ControlAction::Lock => {
                self.lock();
                0
            }
            ControlAction::Retry { realm, nonce } => {
                self.retry_channel_bind(&realm, &nonce);
                0
            }
            ControlAction::Commit => {
                if let Some(p) = self.pending.take() {
                    debug!("CHANNELBIND confirmed for channel {:#06x}", p.channel);
                    self.bindings.push(p);
                }
                0
            }
            ControlAction::Data { addr, data } => {
                out_from.set_from_sockaddr(addr);
                let copy_len = out_buf.len().min(data.len());
                out_buf[..copy_len].copy_from_slice(&data[..copy_len]);
                copy_len as isize
            }
        })
    }

    fn retry_channel_bind(&mut self, realm: &str, nonce: &str) {
        let Some(pending) = self.pending else {
            return;
        };

        self.realm = realm.to_string();
        self.nonce = nonce.to_string();

        if self
            .build_channel_bind(pending.peer, pending.channel, realm, nonce)
            .is_ok()
        {
            trace!("resending CHANNELBIND with authentication attributes");
            self.base.send(&self.server, &self.send_buf);
        } else {
            warn!("failed to build CHANNELBIND auth retry");
        }
    }

    /// Replaces `bindings` with the single `pending` entry, MSN/GOOGLE's
    /// one-peer-at-a-time model (§4.D.4).
    fn lock(&mut self) {
        if let Some(p) = self.pending.take() {
            debug!("locking relay destination to channel {:#06x}", p.channel);
            self.bindings.clear();
            self.bindings.push(p);
        }
    }

    fn classify_channel_data(
        &mut self,
        from: &Endpoint,
        n: usize,
        out_from: &mut Endpoint,
        out_buf: &mut [u8],
    ) -> isize {
        let buf = &self.recv_buf[..n];

        if matches!(self.dialect, Dialect::Draft9) {
            if let Ok(frame) = ChannelData::try_from(buf) {
                if let Some(binding) = self.bindings.iter().find(|b| b.channel == frame.number) {
                    out_from.set_from_sockaddr(binding.peer.copy_to_sockaddr());
                    let payload = frame.payload();
                    let copy_len = out_buf.len().min(payload.len());
                    out_buf[..copy_len].copy_from_slice(&payload[..copy_len]);
                    return copy_len as isize;
                }
            }
        } else if let Some(binding) = self.bindings.first() {
            out_from.set_from_sockaddr(binding.peer.copy_to_sockaddr());
            let copy_len = out_buf.len().min(buf.len());
            out_buf[..copy_len].copy_from_slice(&buf[..copy_len]);
            return copy_len as isize;
        }

        out_from.set_from_sockaddr(from.copy_to_sockaddr());
        let copy_len = out_buf.len().min(buf.len());
        out_buf[..copy_len].copy_from_slice(&buf[..copy_len]);
        copy_len as isize
    }

    /// Drops all bindings and credentials, and closes the owned base
    /// transport.
    pub fn close(&mut self) {
        self.bindings.clear();
        self.pending = None;
        self.credentials.clear();
        self.base.close();
    }
}
