//! ## Session Traversal Utilities for NAT (STUN), TURN relay dialect
//!
//! ```text
//! 0                   1                   2                   3
//! 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |0 0|     STUN Message Type     |         Message Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Magic Cookie                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                     Transaction ID (96 bits)                  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! This codec only speaks the method/attribute subset a TURN relay client
//! needs: channel binding, the legacy SEND request/indication pair, the
//! MSN-era OLD_SET_ACTIVE_DESTINATION method, and DATA indications.

pub mod attribute;
pub mod channel;
pub mod message;
pub mod util;

use anyhow::{anyhow, Result};
use attribute::*;

pub use channel::ChannelData;
pub use message::*;

/// STUN message class.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Kind {
    Request,
    Response,
    Error,
}

/// The methods this relay dialect set uses. `ChannelBind` keeps its real
/// RFC5766 codepoint (0x0009); `Send` and `SetActiveDestination` are given
/// request/response/error triples of their own because the MSN/GOOGLE
/// dialects use them as ordinary transactions rather than as bare
/// indications.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Method {
    ChannelBind(Kind),
    Send(Kind),
    SetActiveDestination(Kind),
    SendIndication,
    DataIndication,
}

impl TryFrom<u16> for Method {
    type Error = anyhow::Error;

    /// ```
    /// use turn_client_stun::*;
    ///
    /// assert_eq!(
    ///     Method::try_from(0x0009).unwrap(),
    ///     Method::ChannelBind(Kind::Request)
    /// );
    /// assert_eq!(Method::try_from(0x0016).unwrap(), Method::SendIndication);
    /// assert_eq!(Method::try_from(0x0017).unwrap(), Method::DataIndication);
    /// ```
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Ok(match value {
            0x0009 => Self::ChannelBind(Kind::Request),
            0x0109 => Self::ChannelBind(Kind::Response),
            0x0119 => Self::ChannelBind(Kind::Error),
            0x0006 => Self::Send(Kind::Request),
            0x0106 => Self::Send(Kind::Response),
            0x0116 => Self::Send(Kind::Error),
            0x0010 => Self::SetActiveDestination(Kind::Request),
            0x0110 => Self::SetActiveDestination(Kind::Response),
            0x0120 => Self::SetActiveDestination(Kind::Error),
            0x0016 => Self::SendIndication,
            0x0017 => Self::DataIndication,
            _ => return Err(anyhow!("unknown method!")),
        })
    }
}

impl From<Method> for u16 {
    /// ```
    /// use turn_client_stun::*;
    ///
    /// assert_eq!(0x0009u16, Method::ChannelBind(Kind::Request).into());
    /// assert_eq!(0x0016u16, Method::SendIndication.into());
    /// ```
    fn from(val: Method) -> Self {
        match val {
            Method::ChannelBind(Kind::Request) => 0x0009,
            Method::ChannelBind(Kind::Response) => 0x0109,
            Method::ChannelBind(Kind::Error) => 0x0119,
            Method::Send(Kind::Request) => 0x0006,
            Method::Send(Kind::Response) => 0x0106,
            Method::Send(Kind::Error) => 0x0116,
            Method::SetActiveDestination(Kind::Request) => 0x0010,
            Method::SetActiveDestination(Kind::Response) => 0x0110,
            Method::SetActiveDestination(Kind::Error) => 0x0120,
            Method::SendIndication => 0x0016,
            Method::DataIndication => 0x0017,
        }
    }
}

#[derive(Debug)]
pub enum Payload<'a, 'b> {
    Message(MessageReader<'a, 'b>),
    ChannelData(ChannelData<'a>),
}

/// Dispatches a datagram to the message or channel-data decoder based on
/// its leading two bits, same framing test the wire format itself uses.
pub struct Decoder {
    attrs: Vec<(AttrKind, &'static [u8])>,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            attrs: Vec::with_capacity(10),
        }
    }

    pub fn decode<'a>(&mut self, buf: &'a [u8]) -> Result<Payload<'a, '_>> {
        anyhow::ensure!(buf.len() >= 4, "datagram too short to be stun/channeldata");
        if !self.attrs.is_empty() {
            self.attrs.clear();
        }

        let flag = buf[0] >> 6;
        if flag > 3 {
            return Err(anyhow!("invalid buf"));
        }

        Ok(if flag == 0 {
            // `attrs` is rebuilt every decode call, so the cross-call
            // reference is sound; the unsafe transmute only erases the
            // borrow's lifetime parameter.
            Payload::Message(MessageReader::decode(
                unsafe { std::mem::transmute(buf) },
                &mut self.attrs,
            )?)
        } else {
            Payload::ChannelData(ChannelData::try_from(buf)?)
        })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips_through_u16() {
        for m in [
            Method::ChannelBind(Kind::Request),
            Method::ChannelBind(Kind::Response),
            Method::ChannelBind(Kind::Error),
            Method::Send(Kind::Request),
            Method::SetActiveDestination(Kind::Response),
            Method::SendIndication,
            Method::DataIndication,
        ] {
            let code: u16 = m.into();
            assert_eq!(Method::try_from(code).unwrap(), m);
        }
    }
}
