//! Unified error type for the Keyrace server.

use keyrace_lobby::LobbyError;
use keyrace_protocol::ProtocolError;
use keyrace_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum KeyraceError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame that could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The hub or a lobby has stopped.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The config file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The connection did not open with a valid `Register`.
    #[error("handshake failed: {0}")]
    Handshake(String),
}
