//! # Keyrace
//!
//! Server for a multiplayer typing race with power-ups.
//!
//! Players connect over WebSocket and register with a name. The hub seats
//! them in lobbies of up to four. Once the countdown ends (or everyone votes
//! to skip it) they race to type the lobby's words, buying power-ups that
//! hinder each other along the way.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keyrace::prelude::*;
//!
//! # async fn run() -> Result<(), KeyraceError> {
//! let server = KeyraceServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
pub mod logger;
mod server;

pub use config::{ConfigError, ServerConfig, DEFAULT_BIND};
pub use error::KeyraceError;
pub use handler::{REGISTER_TIMEOUT, UPGRADE_TIMEOUT};
pub use server::{KeyraceServer, KeyraceServerBuilder};

/// Everything needed to run a server or talk to one.
pub mod prelude {
    pub use crate::{
        ConfigError, KeyraceError, KeyraceServer, KeyraceServerBuilder, ServerConfig,
        REGISTER_TIMEOUT, UPGRADE_TIMEOUT,
    };
    pub use keyrace_lobby::{LobbyConfig, LobbyError, SkipWaitPolicy};
    pub use keyrace_powerup::{CorpusWords, WordSource};
    pub use keyrace_protocol::{
        ClientMessage, LobbyId, Player, PlayerId, PowerupKind, ProtocolError, ServerMessage,
        WireFormat,
    };
    pub use keyrace_transport::TransportError;
}
