//! The reader and writer tasks of a client actor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keyrace_protocol::{ClientMessage, LobbyId, PlayerId, ServerMessage, WireFormat};
use keyrace_transport::{ConnectionId, FrameReader, FrameWriter};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Drains the outbound queue onto the connection.
///
/// Runs from the Register handshake until every outbound sender is gone,
/// then sends a close frame unless the reader already saw the connection
/// close.
pub(crate) async fn run_writer<W: FrameWriter>(
    conn_id: ConnectionId,
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
    race_start: watch::Sender<Option<Instant>>,
    closed: Arc<AtomicBool>,
) {
    while let Some(msg) = outbound.recv().await {
        if matches!(msg, ServerMessage::RaceStarted) {
            race_start.send_replace(Some(Instant::now()));
        }

        let bytes = match msg.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(%conn_id, kind = msg.kind(), error = %e, "encode failed, message dropped");
                continue;
            }
        };

        if let Err(e) = writer.send(&bytes).await {
            closed.store(true, Ordering::Release);
            if e.is_graceful() {
                debug!(%conn_id, error = %e, "connection closed while writing");
                break;
            }
            warn!(%conn_id, error = %e, "write failed, aborting writer");
            return;
        }
        trace!(%conn_id, kind = msg.kind(), "sent");
    }

    if !closed.load(Ordering::Acquire) {
        if let Err(e) = writer.close().await {
            debug!(%conn_id, error = %e, "close frame not sent");
        }
    }
    debug!(%conn_id, "writer stopped");
}

/// Everything the reader needs besides the connection itself.
pub(crate) struct ReaderLinks {
    pub lobby_id: LobbyId,
    pub player_id: PlayerId,
    pub conn_id: ConnectionId,
    pub inbound: mpsc::UnboundedSender<ClientMessage>,
    pub kill: oneshot::Receiver<()>,
    pub done: oneshot::Sender<()>,
    pub leaves: mpsc::UnboundedSender<PlayerId>,
    pub closed: Arc<AtomicBool>,
}

/// Decodes inbound frames until the connection closes or the lobby kills
/// the client.
///
/// On exit the done signal fires (by drop) and the lobby is told the
/// player left.
pub(crate) async fn run_reader<R: FrameReader>(mut reader: R, links: ReaderLinks) {
    let ReaderLinks {
        lobby_id,
        player_id,
        conn_id,
        inbound,
        mut kill,
        done,
        leaves,
        closed,
    } = links;

    loop {
        tokio::select! {
            _ = &mut kill => {
                debug!(%lobby_id, %player_id, "reader stopped by lobby");
                break;
            }
            frame = reader.recv() => match frame {
                Ok(Some(bytes)) => match ClientMessage::decode(&bytes) {
                    Ok(msg) => {
                        trace!(%lobby_id, %player_id, kind = msg.kind(), "received");
                        if inbound.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(%lobby_id, %player_id, error = %e, "undecodable frame skipped");
                    }
                },
                Ok(None) => {
                    closed.store(true, Ordering::Release);
                    debug!(%lobby_id, %player_id, %conn_id, "connection closed");
                    break;
                }
                Err(e) => {
                    closed.store(true, Ordering::Release);
                    if e.is_graceful() {
                        debug!(%lobby_id, %player_id, %conn_id, error = %e, "connection closed");
                    } else {
                        warn!(%lobby_id, %player_id, %conn_id, error = %e, "connection lost");
                    }
                    break;
                }
            },
        }
    }

    drop(done);
    let _ = leaves.send(player_id);
}
