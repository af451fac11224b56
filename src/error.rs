use std::fmt;

/// Internal fallible outcomes. Library-public operations fold these down
/// to the boolean/`isize` contract described in the module docs; this
/// type exists so the folding happens in one place instead of threading
/// ad-hoc `Option`s through every match arm.
#[derive(Debug)]
pub enum Error {
    /// `set_peer` collided with an existing `pending` binding, or DRAFT9
    /// ran out of channel numbers in `[0x4000, 0xFFFE]`.
    BindingUnavailable,
    /// The STUN codec failed to build or finish a message.
    Codec(anyhow::Error),
    /// An inbound datagram failed STUN validation or was missing a
    /// required attribute.
    Validation,
    /// The base transport reported a send/receive failure.
    Transport(std::io::Error),
    /// MSN credentials were not valid base64.
    CredentialDecode(base64::DecodeError),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BindingUnavailable => write!(f, "binding unavailable"),
            Self::Codec(e) => write!(f, "stun codec error: {e}"),
            Self::Validation => write!(f, "stun validation failed"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::CredentialDecode(e) => write!(f, "credential decode error: {e}"),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Self::Codec(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Transport(value)
    }
}

impl From<base64::DecodeError> for Error {
    fn from(value: base64::DecodeError) -> Self {
        Self::CredentialDecode(value)
    }
}

/// Failure returned by the factory (§6) when credential intake fails.
/// Distinct from [`Error`] because it is the one failure a caller can
/// observe before a `RelayState` exists at all.
#[derive(Debug)]
pub struct CreateError(pub(crate) Error);

impl std::error::Error for CreateError {}

impl fmt::Display for CreateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to create relay state: {}", self.0)
    }
}

impl From<base64::DecodeError> for CreateError {
    fn from(value: base64::DecodeError) -> Self {
        Self(Error::from(value))
    }
}
