//! Wire protocol for Keyrace.
//!
//! This crate defines the "language" that typing clients and the server
//! speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`PowerupKind`], ...)
//!   the messages that travel on the wire.
//! - **Codec** ([`WireFormat`]) how those messages are converted to and
//!   from binary frames.
//! - **Errors** ([`ProtocolError`]) what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw frames) and the
//! lobby (game state). It knows nothing about connections or races.
//!
//! ```text
//! Transport (frames) → Protocol (messages) → Lobby / Client actor
//! ```

mod codec;
mod error;
mod types;

pub use codec::WireFormat;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, LobbyId, Player, PlayerId, PowerupKind, ServerMessage,
};
