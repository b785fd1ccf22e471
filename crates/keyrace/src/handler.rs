//! Per-connection handshake.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Finish the transport upgrade (WebSocket handshake)
//!   2. Wait for the first frame, which must be `Register`
//!   3. Start the writer and send `HubGreeting`
//!   4. Hand the client to the hub
//!
//! From then on the client actor owns the connection.

use std::time::Duration;

use keyrace_lobby::{HubHandle, PendingClient};
use keyrace_protocol::{ClientMessage, ServerMessage, WireFormat};
use keyrace_transport::{Connection, FrameReader, FrameWriter, Incoming};

use crate::KeyraceError;

/// How long a new connection may stay silent before it is dropped.
pub const REGISTER_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a peer may take to finish the transport upgrade.
pub const UPGRADE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgrades an accepted socket, then runs [`handle_connection`].
pub(crate) async fn handle_incoming<I: Incoming>(
    incoming: I,
    hub: HubHandle<<I::Connection as Connection>::Reader>,
) -> Result<(), KeyraceError> {
    let conn = tokio::time::timeout(UPGRADE_TIMEOUT, incoming.upgrade())
        .await
        .map_err(|_| {
            KeyraceError::Handshake(format!(
                "upgrade not finished within {}s",
                UPGRADE_TIMEOUT.as_secs()
            ))
        })??;
    handle_connection(conn, hub).await
}

/// Runs the Register handshake for `conn` and passes it to `hub`.
pub(crate) async fn handle_connection<C: Connection>(
    conn: C,
    hub: HubHandle<C::Reader>,
) -> Result<(), KeyraceError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (mut reader, mut writer) = conn.split();

    let name = match tokio::time::timeout(REGISTER_TIMEOUT, await_register(&mut reader)).await {
        Ok(Ok(name)) => name,
        Ok(Err(e)) => {
            let _ = writer.close().await;
            return Err(e);
        }
        Err(_) => {
            let _ = writer.close().await;
            return Err(KeyraceError::Handshake(format!(
                "no Register within {}s",
                REGISTER_TIMEOUT.as_secs()
            )));
        }
    };

    tracing::info!(%conn_id, %name, "player registered");

    let client = PendingClient::new(conn_id, name, reader, writer);
    client.send(ServerMessage::HubGreeting);
    hub.register(client)?;
    Ok(())
}

async fn await_register<R: FrameReader>(reader: &mut R) -> Result<String, KeyraceError> {
    let Some(frame) = reader.recv().await? else {
        return Err(KeyraceError::Handshake(
            "connection closed before Register".into(),
        ));
    };

    match ClientMessage::decode(&frame)? {
        ClientMessage::Register { name } => Ok(name),
        other => Err(KeyraceError::Handshake(format!(
            "expected Register, got {}",
            other.kind()
        ))),
    }
}
