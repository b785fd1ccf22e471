//! Hub, lobby and client actors for Keyrace.
//!
//! Every lobby and every connected client runs as its own set of Tokio
//! tasks (actor model). State is never shared: the hub, lobbies and client
//! actors only talk through channels.
//!
//! # Key types
//!
//! - [`HubHandle`]: entry point; seats registered clients in lobbies
//! - [`LobbyHandle`]: commands to one running lobby
//! - [`PendingClient`]: a registered connection waiting for a seat
//! - [`LobbyState`]: lobby lifecycle state machine
//! - [`LobbyConfig`]: capacity, countdown and power-up settings

mod client;
mod config;
mod error;
mod event;
mod hub;
mod lobby;

pub use client::PendingClient;
pub use config::{LobbyConfig, LobbyState, SkipWaitPolicy};
pub use error::LobbyError;
pub use hub::{spawn_hub, HubHandle, LobbyIdGenerator, WeakHub};
pub use lobby::{spawn_lobby, LobbyHandle, LobbyInfo};
