use anyhow::{anyhow, Result};
use crc::{Crc, CRC_32_ISO_HDLC};
use hmac::{digest::CtOutput, Hmac, Mac};
use md5::{Digest, Md5};

/// compute padding size.
///
/// STUN/TURN attribute values must be padded to a multiple of 4 bytes.
///
/// ```
/// assert_eq!(turn_client_stun::util::pad_size(4), 0);
/// assert_eq!(turn_client_stun::util::pad_size(0), 0);
/// assert_eq!(turn_client_stun::util::pad_size(5), 3);
/// ```
#[inline(always)]
pub fn pad_size(size: usize) -> usize {
    let range = size % 4;
    if size == 0 || range == 0 {
        return 0;
    }

    4 - range
}

/// long-term credential key.
///
/// > key = MD5(username ":" realm ":" password)
///
/// ```
/// let buffer = [
///     0x3eu8, 0x2f, 0x79, 0x1e, 0x1f, 0x14, 0xd1, 0x73, 0xfc, 0x91, 0xff, 0x2f, 0x59, 0xb5, 0x0f,
///     0xd1,
/// ];
///
/// let key = turn_client_stun::util::long_key("panda", "panda", "raspberry");
/// assert_eq!(key, buffer);
/// ```
pub fn long_key(username: &str, key: &str, realm: &str) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update([username, realm, key].join(":"));
    hasher.finalize().into()
}

/// HMAC SHA1 digest.
pub fn hmac_sha1(key: &[u8], source: Vec<&[u8]>) -> Result<CtOutput<Hmac<sha1::Sha1>>> {
    match Hmac::<sha1::Sha1>::new_from_slice(key) {
        Err(_) => Err(anyhow!("hmac key setup failed")),
        Ok(mut mac) => {
            for buf in source {
                mac.update(buf);
            }

            Ok(mac.finalize())
        }
    }
}

/// CRC32 fingerprint, XOR'd with the STUN fingerprint constant.
///
/// ```
/// assert_eq!(turn_client_stun::util::fingerprint(b"1"), 3498621689);
/// ```
pub fn fingerprint(buffer: &[u8]) -> u32 {
    Crc::<u32>::new(&CRC_32_ISO_HDLC).checksum(buffer) ^ 0x5354_554e
}

/// slice as u16.
///
/// ```
/// let int = turn_client_stun::util::as_u16(&[0x00, 0x04]);
/// assert_eq!(int, 4);
/// ```
#[rustfmt::skip]
#[inline(always)]
pub fn as_u16(buf: &[u8]) -> u16 {
    assert!(buf.len() >= 2);
    u16::from_be_bytes([
        buf[0],
        buf[1]
    ])
}

/// slice as u32.
///
/// ```
/// let int = turn_client_stun::util::as_u32(&[0x00, 0x00, 0x00, 0x04]);
/// assert_eq!(int, 4);
/// ```
#[rustfmt::skip]
#[inline(always)]
pub fn as_u32(buf: &[u8]) -> u32 {
    assert!(buf.len() >= 4);
    u32::from_be_bytes([
        buf[0],
        buf[1],
        buf[2],
        buf[3]
    ])
}
