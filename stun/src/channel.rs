use anyhow::{ensure, Result};
use std::convert::TryFrom;

/// The ChannelData message carries application data between client and
/// server once a channel is bound:
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Channel Number        |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       Application Data                        |
/// ```
#[derive(Debug)]
pub struct ChannelData<'a> {
    pub bytes: &'a [u8],
    pub number: u16,
    /// The frame's declared Length field, i.e. the payload size. May be
    /// smaller than `bytes.len() - 4` if the datagram carries trailing
    /// padding past the declared length.
    pub len: usize,
}

impl<'a> ChannelData<'a> {
    pub fn message_size(bytes: &[u8]) -> Result<usize> {
        ensure!(bytes.len() >= 4, "channel data header truncated");
        Ok(u16::from_be_bytes([bytes[2], bytes[3]]) as usize + 4)
    }

    /// The application payload, truncated to the declared Length field.
    pub fn payload(&self) -> &'a [u8] {
        &self.bytes[4..4 + self.len]
    }
}

impl<'a> TryFrom<&'a [u8]> for ChannelData<'a> {
    type Error = anyhow::Error;

    /// ```
    /// use std::convert::TryFrom;
    /// use turn_client_stun::ChannelData;
    ///
    /// let buffer: [u8; 4] = [0x40, 0x00, 0x00, 0x00];
    /// let data = ChannelData::try_from(&buffer[..]).unwrap();
    /// assert_eq!(data.number, 0x4000);
    /// ```
    fn try_from(bytes: &'a [u8]) -> Result<Self> {
        ensure!(bytes.len() >= 4, "channel data header truncated");

        let number = u16::from_be_bytes([bytes[0], bytes[1]]);
        ensure!(
            (0x4000..0xFFFF).contains(&number),
            "channel number out of range"
        );

        let len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        ensure!(len <= bytes.len() - 4, "channel data length overflow");

        Ok(Self { bytes, number, len })
    }
}

impl AsRef<[u8]> for ChannelData<'_> {
    fn as_ref(&self) -> &[u8] {
        self.bytes
    }
}

impl std::ops::Deref for ChannelData<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.bytes
    }
}
