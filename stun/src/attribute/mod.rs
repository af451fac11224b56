mod address;

pub use address::Addr;

use crate::util;
use bytes::{BufMut, BytesMut};
use num_enum::TryFromPrimitive;
use std::net::SocketAddr;

/// attribute type registry.
///
/// Numbering follows the classic (pre-RFC5766) TURN relay draft that the
/// MSN and GOOGLE dialects still speak; `PeerAddress`/`RemoteAddress` line
/// up with the later RFC5766 XOR-PEER-ADDRESS codepoint since DRAFT9 is the
/// one dialect that actually validates them.
#[repr(u16)]
#[derive(TryFromPrimitive, PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum AttrKind {
    UserName = 0x0006,
    MessageIntegrity = 0x0008,
    ChannelNumber = 0x000C,
    Lifetime = 0x000D,
    MagicCookie = 0x000F,
    DestinationAddress = 0x0011,
    PeerAddress = 0x0012,
    RemoteAddress = 0x0013,
    Data = 0x0017,
    Realm = 0x0018,
    Nonce = 0x0019,
    Options = 0x8001,
    Fingerprint = 0x8028,
}

/// dyn stun/turn message attribute.
pub trait Property<'a> {
    type Error;
    type Inner;
    fn kind() -> AttrKind;
    fn into(value: Self::Inner, buf: &mut BytesMut, t: &'a [u8]);
    fn try_from(buf: &'a [u8], t: &'a [u8]) -> Result<Self::Inner, Self::Error>;
}

/// Identifies the username/password combination used in the
/// message-integrity check. A UTF-8 string, taken verbatim for every
/// dialect (MSN's base64-encoded credentials are decoded by the caller
/// before reaching the codec).
pub struct UserName;
impl<'a> Property<'a> for UserName {
    type Inner = &'a str;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::UserName
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put(value.as_bytes());
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(std::str::from_utf8(buf)?)
    }
}

/// The application payload carried by SEND/DATA requests and indications.
pub struct Data;
impl<'a> Property<'a> for Data {
    type Inner = &'a [u8];
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::Data
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put(value);
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(buf)
    }
}

/// Long-term credential realm, echoed by the server on a CHANNELBIND
/// error and re-sent verbatim on the authentication retry.
pub struct Realm;
impl<'a> Property<'a> for Realm {
    type Inner = &'a str;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::Realm
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put(value.as_bytes());
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(std::str::from_utf8(buf)?)
    }
}

/// Long-term credential nonce, companion to [`Realm`].
pub struct Nonce;
impl<'a> Property<'a> for Nonce {
    type Inner = &'a str;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::Nonce
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put(value.as_bytes());
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(std::str::from_utf8(buf)?)
    }
}

/// 20-byte HMAC-SHA1 over the message, computed and verified by
/// [`crate::message::MessageWriter::flush`]/[`crate::message::MessageReader::integrity`].
pub struct MessageIntegrity;
impl<'a> Property<'a> for MessageIntegrity {
    type Inner = &'a [u8];
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::MessageIntegrity
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put(value);
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(buf)
    }
}

/// CRC-32 trailer, present only after MESSAGE-INTEGRITY when one is set.
pub struct Fingerprint;
impl<'a> Property<'a> for Fingerprint {
    type Inner = u32;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::Fingerprint
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put_u32(value);
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(util::as_u32(buf))
    }
}

/// The channel number being bound. The value is written as a bare u16;
/// the codec's attribute padding contributes the two reserved bytes that
/// round the CHANNEL-NUMBER attribute out to 4 bytes (`channel << 16`).
pub struct ChannelNumber;
impl<'a> Property<'a> for ChannelNumber {
    type Inner = u16;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::ChannelNumber
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put_u16(value);
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(util::as_u16(buf))
    }
}

/// DRAFT9's relay-facing peer address, always XOR-mapped per RFC5766.
pub struct PeerAddress;
impl<'a> Property<'a> for PeerAddress {
    type Inner = SocketAddr;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::PeerAddress
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, token: &[u8]) {
        Addr::into(&value, token, buf, true)
    }

    fn try_from(buf: &'a [u8], token: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Addr::try_from(buf, token, true)
    }
}

/// The source address carried in an IND_DATA indication, XOR-mapped for
/// DRAFT9. Use [`RemoteAddressPlain`] for MSN/GOOGLE, which send it in
/// the clear; both share the same wire attribute number.
pub struct RemoteAddress;
impl<'a> Property<'a> for RemoteAddress {
    type Inner = SocketAddr;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::RemoteAddress
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, token: &[u8]) {
        Addr::into(&value, token, buf, true)
    }

    fn try_from(buf: &'a [u8], token: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Addr::try_from(buf, token, true)
    }
}

/// Plain-mapped variant of [`RemoteAddress`] for the MSN/GOOGLE dialects.
pub struct RemoteAddressPlain;
impl<'a> Property<'a> for RemoteAddressPlain {
    type Inner = SocketAddr;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::RemoteAddress
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, token: &[u8]) {
        Addr::into(&value, token, buf, false)
    }

    fn try_from(buf: &'a [u8], token: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Addr::try_from(buf, token, false)
    }
}

/// MSN/GOOGLE's plain-mapped "who to relay to" attribute, carried on
/// OLD_SET_ACTIVE_DESTINATION and SEND requests.
pub struct DestinationAddress;
impl<'a> Property<'a> for DestinationAddress {
    type Inner = SocketAddr;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::DestinationAddress
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, token: &[u8]) {
        Addr::into(&value, token, buf, false)
    }

    fn try_from(buf: &'a [u8], token: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Addr::try_from(buf, token, false)
    }
}

/// Fixed TURN magic carried by MSN/GOOGLE control messages in lieu of
/// the STUN header's own magic cookie field.
pub struct MagicCookie;
impl<'a> Property<'a> for MagicCookie {
    type Inner = u32;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::MagicCookie
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put_u32(value);
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(util::as_u32(buf))
    }
}

/// GOOGLE's one-bit "lock this destination in" flag on a SEND request.
pub struct Options;
impl<'a> Property<'a> for Options {
    type Inner = u32;
    type Error = anyhow::Error;
    fn kind() -> AttrKind {
        AttrKind::Options
    }

    fn into(value: Self::Inner, buf: &mut BytesMut, _: &[u8]) {
        buf.put_u32(value);
    }

    fn try_from(buf: &'a [u8], _: &'a [u8]) -> Result<Self::Inner, Self::Error> {
        Ok(util::as_u32(buf))
    }
}
