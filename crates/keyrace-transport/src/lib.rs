//! Transport abstraction layer for Keyrace.
//!
//! A [`Transport`] accepts raw sockets as [`Incoming`] values; upgrading one
//! yields a [`Connection`], which is split into a [`FrameReader`] and a
//! [`FrameWriter`] so the inbound and outbound halves can be driven by
//! independent tasks.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//!
//! The in-memory transport ([`MemoryConnection`]) is always available and is
//! what the actor tests run against.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryPeer, MemoryReader, MemoryWriter, PeerFrame};
#[cfg(feature = "websocket")]
pub use websocket::{
    WebSocketConnection, WebSocketReader, WebSocketTransport, WebSocketUpgrade, WebSocketWriter,
};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_connection_id() -> ConnectionId {
    ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// An accepted socket, before its protocol handshake.
    type Incoming: Incoming;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next socket. The protocol handshake is left to
    /// [`Incoming::upgrade`].
    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error>;
}

/// An accepted socket whose protocol handshake has not run yet.
pub trait Incoming: Send + 'static {
    /// The connection produced by a successful handshake.
    type Connection: Connection;

    /// Runs the protocol handshake.
    fn upgrade(self) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single bidirectional connection, consumed by splitting it.
pub trait Connection: Send + 'static {
    /// The inbound half.
    type Reader: FrameReader;
    /// The outbound half.
    type Writer: FrameWriter;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Splits the connection into independently owned halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// The inbound half of a connection.
///
/// Futures are `Send` so readers can be driven from spawned tasks in
/// generic code.
pub trait FrameReader: Send + 'static {
    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
}

/// The outbound half of a connection.
pub trait FrameWriter: Send + 'static {
    /// Sends one frame to the remote peer.
    fn send(
        &mut self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a close frame and shuts the outbound half down.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
