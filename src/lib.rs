//! TURN relay shim for a client-side ICE socket.
//!
//! [`RelayState`] looks and behaves like an unreliable datagram socket to
//! its caller (`set_peer`/`send`/`recv`/`close`) but relays every payload
//! through a TURN server, framing it according to one of three wire
//! dialects ([`Dialect::Draft9`], [`Dialect::Msn`], [`Dialect::Google`]).
//! It is generic over [`Transport`], so the same state machine drives
//! either a live [`BaseTransport`] or, in tests, a [`FakeTransport`].

pub mod address;
pub mod base;
pub mod dialect;
pub mod error;
pub mod fake;
pub mod relay;
pub mod transport;

pub use address::Endpoint;
pub use base::BaseTransport;
pub use dialect::Dialect;
pub use error::{CreateError, Error};
pub use fake::FakeTransport;
pub use relay::{ChannelBinding, Credentials, RelayState};
pub use transport::Transport;

use base64::Engine;

/// Builds a [`RelayState`] over an already-configured base transport.
///
/// For [`Dialect::Msn`], `username`/`password` are base64 strings decoded
/// here; for the other dialects they are taken verbatim as UTF-8.
/// `password` is ignored entirely for [`Dialect::Google`].
pub fn create<T: Transport>(
    base: T,
    server: Endpoint,
    username: &str,
    password: &str,
    dialect: Dialect,
) -> Result<RelayState<T>, CreateError> {
    let credentials = match dialect {
        Dialect::Msn => {
            let engine = base64::engine::general_purpose::STANDARD;
            let username = engine
                .decode(username)
                .map_err(|e| CreateError::from(e))?;
            let password = engine
                .decode(password)
                .map_err(|e| CreateError::from(e))?;
            Credentials {
                username,
                password: Some(password),
            }
        }
        Dialect::Draft9 => Credentials {
            username: username.as_bytes().to_vec(),
            password: Some(password.as_bytes().to_vec()),
        },
        Dialect::Google => Credentials {
            username: username.as_bytes().to_vec(),
            password: None,
        },
    };

    Ok(RelayState::new(base, server, credentials, dialect))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msn_credentials_are_base64_decoded() {
        let base = FakeTransport::new();
        let server = Endpoint::new("10.0.0.1:3478".parse().unwrap());
        let state = create(base, server, "cGFuZGE=", "cmFzcGJlcnJ5", Dialect::Msn).unwrap();
        assert!(state.bindings().is_empty());
    }

    #[test]
    fn msn_invalid_base64_is_rejected() {
        let base = FakeTransport::new();
        let server = Endpoint::new("10.0.0.1:3478".parse().unwrap());
        let err = create(base, server, "not base64!!", "cmFzcGJlcnJ5", Dialect::Msn).unwrap_err();
        assert!(err.to_string().contains("credential decode"));
    }

    #[test]
    fn google_ignores_password() {
        let base = FakeTransport::new();
        let server = Endpoint::new("10.0.0.1:3478".parse().unwrap());
        let state = create(base, server, "alice", "ignored", Dialect::Google).unwrap();
        assert!(state.bindings().is_empty());
    }
}
