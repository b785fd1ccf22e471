/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was already closed (by either side) or reset by the
    /// peer without a closing handshake.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The peer closed with a code other than normal or going-away.
    #[error("connection closed abnormally with code {0}")]
    AbnormalClose(u16),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl TransportError {
    /// Returns `true` for closures that are part of a normal connection
    /// lifecycle and need no more than a debug log.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_) | Self::Shutdown)
    }
}
