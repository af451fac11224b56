use anyhow::{anyhow, ensure, Result};
use bytes::{BufMut, BytesMut};

use std::convert::TryFrom;

use super::attribute::{AttrKind, MessageIntegrity, Property};
use super::{util, Method};

const ZERO_BUF: [u8; 10] = [0u8; 10];
const COOKIE: [u8; 4] = 0x2112A442u32.to_be_bytes();

/// (username, realm, password) digest, or the short-term equivalent.
type Auth = [u8; 16];

pub struct MessageWriter<'a> {
    token: &'a [u8],
    raw: &'a mut BytesMut,
}

impl<'a> MessageWriter<'a> {
    pub fn new(method: Method, token: &'a [u8; 12], buf: &'a mut BytesMut) -> Self {
        unsafe { buf.set_len(0) }
        buf.put_u16(method.into());
        buf.put_u16(0);
        buf.put(&COOKIE[..]);
        buf.put(token.as_slice());
        Self { raw: buf, token }
    }

    /// append an attribute, reserving its length prefix and padding the
    /// value out to a 4-byte boundary.
    ///
    /// ```
    /// use turn_client_stun::*;
    /// use turn_client_stun::attribute::UserName;
    /// use bytes::BytesMut;
    ///
    /// let mut buf = BytesMut::new();
    /// let token = [0u8; 12];
    /// let mut message = MessageWriter::new(Method::ChannelBind(Kind::Request), &token, &mut buf);
    /// message.append::<UserName>("panda");
    /// message.flush(None).unwrap();
    /// assert_eq!(&buf[20..26], &[0x00, 0x06, 0x00, 0x05]);
    /// ```
    pub fn append<T: Property<'a>>(&mut self, value: T::Inner) {
        self.raw.put_u16(T::kind() as u16);

        let os = self.raw.len();
        unsafe { self.raw.advance_mut(2) }
        T::into(value, self.raw, self.token);

        let size = self.raw.len() - os - 2;
        let size_buf = (size as u16).to_be_bytes();
        self.raw[os] = size_buf[0];
        self.raw[os + 1] = size_buf[1];

        let psize = util::pad_size(size);
        if psize > 0 {
            self.raw.put(&ZERO_BUF[0..psize]);
        }
    }

    /// finalize the message: write the attribute-block length, and when
    /// `auth` is given, append MESSAGE-INTEGRITY and FINGERPRINT.
    pub fn flush(&mut self, auth: Option<&Auth>) -> Result<()> {
        let size = (self.raw.len() - 20) as u16;
        let size_buf = size.to_be_bytes();
        self.raw[2] = size_buf[0];
        self.raw[3] = size_buf[1];

        if let Some(a) = auth {
            self.integrity(a)?;
        }

        Ok(())
    }

    fn integrity(&mut self, auth: &Auth) -> Result<()> {
        assert!(self.raw.len() >= 20);

        let mut buf_size = (self.raw.len() + 4) as u16;
        let size_buf = buf_size.to_be_bytes();
        self.raw[2] = size_buf[0];
        self.raw[3] = size_buf[1];

        let hmac_output = util::hmac_sha1(auth, vec![self.raw])?.into_bytes();
        let property_buf = hmac_output.as_slice();

        self.raw.put_u16(AttrKind::MessageIntegrity as u16);
        self.raw.put_u16(20);
        self.raw.put(property_buf);

        buf_size += 8;
        let size_buf = buf_size.to_be_bytes();
        self.raw[2] = size_buf[0];
        self.raw[3] = size_buf[1];

        self.raw.put_u16(AttrKind::Fingerprint as u16);
        self.raw.put_u16(4);
        self.raw.put_u32(util::fingerprint(self.raw));

        Ok(())
    }
}

#[derive(Debug)]
pub struct MessageReader<'a, 'b> {
    pub method: Method,
    pub token: &'a [u8],
    buf: &'a [u8],
    valid_offset: u16,
    attributes: &'b Vec<(AttrKind, &'a [u8])>,
}

impl<'a, 'b> MessageReader<'a, 'b> {
    /// fetch an attribute by type, decoding it through [`Property::try_from`].
    pub fn get<T: Property<'a>>(&self) -> Option<T::Inner> {
        let kind = T::kind();
        self.attributes
            .iter()
            .find(|(k, _)| k == &kind)
            .and_then(|(_, v)| T::try_from(v, self.token).ok())
    }

    /// verify MESSAGE-INTEGRITY against `auth`.
    pub fn integrity(&self, auth: &Auth) -> Result<()> {
        ensure!(!self.buf.is_empty(), "buf is empty");
        ensure!(self.valid_offset >= 20, "buf is empty");

        let integrity = self
            .get::<MessageIntegrity>()
            .ok_or_else(|| anyhow!("not found MessageIntegrity"))?;

        let size_buf = (self.valid_offset + 4).to_be_bytes();
        let body = vec![
            &self.buf[0..2],
            &size_buf[..],
            &self.buf[4..self.valid_offset as usize],
        ];

        let hmac_output = util::hmac_sha1(auth, body)?.into_bytes();
        let property_buf = hmac_output.as_slice();

        if integrity != property_buf {
            return Err(anyhow!("message integrity mismatch"));
        }

        Ok(())
    }

    /// decode a STUN message, collecting its attribute index into `attributes`.
    ///
    /// ```
    /// use turn_client_stun::*;
    ///
    /// let buffer: [u8; 20] = [
    ///     0x00, 0x09, 0x00, 0x00, 0x21, 0x12, 0xa4, 0x42, 0x72, 0x6d, 0x49, 0x42, 0x72, 0x52, 0x64,
    ///     0x48, 0x57, 0x62, 0x4b, 0x2b,
    /// ];
    ///
    /// let mut attributes = Vec::new();
    /// let message = MessageReader::decode(&buffer[..], &mut attributes).unwrap();
    /// assert_eq!(message.method, Method::ChannelBind(Kind::Request));
    /// ```
    #[rustfmt::skip]
    pub fn decode(
        buf: &'a [u8],
        attributes: &'b mut Vec<(AttrKind, &'a [u8])>,
    ) -> Result<MessageReader<'a, 'b>> {
        ensure!(buf.len() >= 20, "message len < 20");
        let mut find_integrity = false;
        let mut valid_offset = 0;
        let count_size = buf.len();

        let method = Method::try_from(util::as_u16(&buf[..2]))?;
        let size = util::as_u16(&buf[2..4]) as usize + 20;
        ensure!(buf[4..8] == COOKIE[..], "missing cookie");
        ensure!(count_size >= size, "missing len");

        let token = &buf[8..20];
        let mut offset = 20;

        loop {
            if count_size - offset < 4 {
                break;
            }

            let key = u16::from_be_bytes([buf[offset], buf[offset + 1]]);

            if !find_integrity {
                valid_offset = offset as u16;
            }

            if key == AttrKind::MessageIntegrity as u16 {
                find_integrity = true;
            }

            let size = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;

            offset += 4;
            if count_size - offset < size {
                break;
            }

            let range = offset..(offset + size);

            if size > 0 {
                offset += size;
                offset += util::pad_size(size);
            }

            let attrkind = match AttrKind::try_from(key) {
                Err(_) => continue,
                Ok(a) => a,
            };

            attributes.push((attrkind, &buf[range]));
        }

        Ok(Self {
            buf,
            token,
            method,
            attributes,
            valid_offset,
        })
    }

    pub fn message_size(buf: &[u8]) -> Result<usize> {
        ensure!(buf[0] >> 6 == 0, "not a stun message");
        ensure!(buf.len() >= 20, "message len < 20");
        Ok((util::as_u16(&buf[2..4]) + 20) as usize)
    }
}

impl<'a> AsRef<[u8]> for MessageReader<'a, '_> {
    fn as_ref(&self) -> &'a [u8] {
        self.buf
    }
}

impl<'a> std::ops::Deref for MessageReader<'a, '_> {
    type Target = [u8];

    fn deref(&self) -> &'a Self::Target {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Kind;

    #[test]
    fn append_then_decode_roundtrips_username() -> Result<()> {
        use crate::attribute::UserName;

        let token = [7u8; 12];
        let mut buf = BytesMut::new();
        let mut message = MessageWriter::new(Method::ChannelBind(Kind::Request), &token, &mut buf);
        message.append::<UserName>("alice");
        message.flush(None)?;

        let mut attrs = Vec::new();
        let reader = MessageReader::decode(&buf, &mut attrs)?;
        assert_eq!(reader.method, Method::ChannelBind(Kind::Request));
        assert_eq!(reader.get::<UserName>(), Some("alice"));
        Ok(())
    }
}
