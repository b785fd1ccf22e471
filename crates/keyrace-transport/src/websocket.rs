//! WebSocket transport implementation using `tokio-tungstenite`.

use std::io;
use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::{
    self, protocol::frame::coding::CloseCode, protocol::CloseFrame, Message,
};

use crate::{
    next_connection_id, Connection, ConnectionId, FrameReader, FrameWriter, Incoming,
    Transport, TransportError,
};

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Incoming = WebSocketUpgrade;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Incoming, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "accepted TCP connection");
        Ok(WebSocketUpgrade { stream, addr })
    }
}

/// A TCP connection that has not completed the WebSocket upgrade.
pub struct WebSocketUpgrade {
    stream: TcpStream,
    addr: SocketAddr,
}

impl WebSocketUpgrade {
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Incoming for WebSocketUpgrade {
    type Connection = WebSocketConnection;

    async fn upgrade(self) -> Result<WebSocketConnection, TransportError> {
        let ws = tokio_tungstenite::accept_async(self.stream)
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(io::Error::new(io::ErrorKind::ConnectionRefused, e))
            })?;

        let id = next_connection_id();
        tracing::debug!(%id, addr = %self.addr, "accepted WebSocket connection");

        Ok(WebSocketConnection { id, ws })
    }
}

/// A single WebSocket connection, not yet split.
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: WsStream,
}

impl Connection for WebSocketConnection {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn split(self) -> (WebSocketReader, WebSocketWriter) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketReader { id: self.id, stream },
            WebSocketWriter { id: self.id, sink },
        )
    }
}

/// Inbound half of a [`WebSocketConnection`].
pub struct WebSocketReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl FrameReader for WebSocketReader {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data.to_vec())),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::trace!(id = %self.id, ?frame, "close frame received");
                    return close_result(frame);
                }
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => return Err(classify(e, TransportError::ReceiveFailed)),
                None => return Ok(None),
            }
        }
    }
}

/// Outbound half of a [`WebSocketConnection`].
pub struct WebSocketWriter {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl FrameWriter for WebSocketWriter {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.sink
            .send(Message::Binary(data.to_vec().into()))
            .await
            .map_err(|e| classify(e, TransportError::SendFailed))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        tracing::trace!(id = %self.id, "sending close frame");
        self.sink
            .close()
            .await
            .map_err(|e| classify(e, TransportError::SendFailed))
    }
}

fn close_result(
    frame: Option<CloseFrame>,
) -> Result<Option<Vec<u8>>, TransportError> {
    match frame.map(|f| f.code) {
        None | Some(CloseCode::Normal | CloseCode::Away | CloseCode::Abnormal) => {
            Ok(None)
        }
        Some(code) => Err(TransportError::AbnormalClose(code.into())),
    }
}

/// Maps a tungstenite error onto the graceful/abnormal split. `other`
/// builds the abnormal variant for the direction being classified.
fn classify(
    e: tungstenite::Error,
    other: fn(io::Error) -> TransportError,
) -> TransportError {
    match e {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed
        | tungstenite::Error::Protocol(
            tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
        ) => TransportError::ConnectionClosed(e.to_string()),
        tungstenite::Error::Io(io_err)
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ) =>
        {
            TransportError::ConnectionClosed(io_err.to_string())
        }
        e => other(io::Error::other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_result_normal_codes_are_clean() {
        assert!(matches!(close_result(None), Ok(None)));
        let normal = CloseFrame {
            code: CloseCode::Normal,
            reason: "".into(),
        };
        assert!(matches!(close_result(Some(normal)), Ok(None)));
        let away = CloseFrame {
            code: CloseCode::Away,
            reason: "".into(),
        };
        assert!(matches!(close_result(Some(away)), Ok(None)));
    }

    #[test]
    fn test_close_result_error_code_is_abnormal() {
        let frame = CloseFrame {
            code: CloseCode::Error,
            reason: "oops".into(),
        };
        assert!(matches!(
            close_result(Some(frame)),
            Err(TransportError::AbnormalClose(1011))
        ));
    }

    #[test]
    fn test_classify_already_closed_is_graceful() {
        let err = classify(
            tungstenite::Error::AlreadyClosed,
            TransportError::SendFailed,
        );
        assert!(err.is_graceful());
    }

    #[test]
    fn test_classify_broken_pipe_is_graceful() {
        let err = classify(
            tungstenite::Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)),
            TransportError::ReceiveFailed,
        );
        assert!(err.is_graceful());
    }

    #[test]
    fn test_classify_other_io_is_abnormal() {
        let err = classify(
            tungstenite::Error::Io(io::Error::from(io::ErrorKind::InvalidData)),
            TransportError::ReceiveFailed,
        );
        assert!(matches!(err, TransportError::ReceiveFailed(_)));
    }
}
