//! In-process transport backed by channels.
//!
//! [`MemoryConnection::pair`] returns the server-side connection together
//! with a [`MemoryPeer`] that plays the remote client. Dropping the peer (or
//! calling [`MemoryPeer::close`]) looks like a clean close to the reader.

use tokio::sync::mpsc;

use crate::{next_connection_id, Connection, ConnectionId, FrameReader, FrameWriter, TransportError};

/// What the server side wrote, as observed by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerFrame {
    Data(Vec<u8>),
    Close,
}

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound: mpsc::UnboundedSender<PeerFrame>,
}

impl MemoryConnection {
    /// Creates a connected (server, peer) pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let (to_server, inbound) = mpsc::unbounded_channel();
        let (outbound, from_server) = mpsc::unbounded_channel();
        let conn = MemoryConnection {
            id: next_connection_id(),
            inbound,
            outbound,
        };
        let peer = MemoryPeer {
            sender: Some(to_server),
            receiver: from_server,
        };
        (conn, peer)
    }
}

impl Connection for MemoryConnection {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (
            MemoryReader {
                inbound: self.inbound,
            },
            MemoryWriter {
                outbound: self.outbound,
                closed: false,
            },
        )
    }
}

/// Inbound half of a [`MemoryConnection`].
pub struct MemoryReader {
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl FrameReader for MemoryReader {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.recv().await)
    }
}

/// Outbound half of a [`MemoryConnection`].
pub struct MemoryWriter {
    outbound: mpsc::UnboundedSender<PeerFrame>,
    closed: bool,
}

impl FrameWriter for MemoryWriter {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::ConnectionClosed("writer closed".into()));
        }
        self.outbound
            .send(PeerFrame::Data(data.to_vec()))
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if std::mem::replace(&mut self.closed, true) {
            return Err(TransportError::ConnectionClosed("writer closed".into()));
        }
        self.outbound
            .send(PeerFrame::Close)
            .map_err(|_| TransportError::ConnectionClosed("peer dropped".into()))
    }
}

/// The remote end of an in-memory connection.
pub struct MemoryPeer {
    sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    receiver: mpsc::UnboundedReceiver<PeerFrame>,
}

impl MemoryPeer {
    /// Sends a frame to the server. Returns `false` once the server side
    /// is gone or the peer has closed.
    pub fn send(&self, data: impl Into<Vec<u8>>) -> bool {
        match &self.sender {
            Some(tx) => tx.send(data.into()).is_ok(),
            None => false,
        }
    }

    /// Closes the peer's outbound direction.
    pub fn close(&mut self) {
        self.sender = None;
    }

    /// Waits for the next frame written by the server. `None` means the
    /// server writer was dropped.
    pub async fn recv(&mut self) -> Option<PeerFrame> {
        self.receiver.recv().await
    }

    /// Returns the next frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<PeerFrame> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (conn, mut peer) = MemoryConnection::pair();
        let (mut reader, mut writer) = conn.split();

        assert!(peer.send(vec![1, 2, 3]));
        assert_eq!(reader.recv().await.unwrap(), Some(vec![1, 2, 3]));

        writer.send(&[9]).await.unwrap();
        assert_eq!(peer.recv().await, Some(PeerFrame::Data(vec![9])));
    }

    #[tokio::test]
    async fn test_peer_close_is_clean_eof() {
        let (conn, mut peer) = MemoryConnection::pair();
        let (mut reader, _writer) = conn.split();
        peer.close();
        assert_eq!(reader.recv().await.unwrap(), None);
        assert!(!peer.send(vec![1]));
    }

    #[tokio::test]
    async fn test_writer_close_sends_one_close_frame() {
        let (conn, mut peer) = MemoryConnection::pair();
        let (_reader, mut writer) = conn.split();
        writer.close().await.unwrap();
        assert!(writer.close().await.is_err());
        assert!(writer.send(&[1]).await.is_err());
        assert_eq!(peer.recv().await, Some(PeerFrame::Close));
        drop(writer);
        assert_eq!(peer.recv().await, None);
    }

    #[test]
    fn test_pairs_get_distinct_ids() {
        let (a, _pa) = MemoryConnection::pair();
        let (b, _pb) = MemoryConnection::pair();
        assert_ne!(a.id(), b.id());
    }
}
