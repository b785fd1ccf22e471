//! The hub: hands every registered client to the lobby that is currently
//! seating players, opening a new lobby whenever that one stops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use keyrace_powerup::WordSource;
use keyrace_protocol::LobbyId;
use keyrace_transport::FrameReader;
use tokio::sync::mpsc;

use crate::client::PendingClient;
use crate::lobby::{spawn_lobby, LobbyHandle};
use crate::{LobbyConfig, LobbyError};

/// Hands out lobby ids, starting at 1. Each hub owns one.
#[derive(Debug)]
pub struct LobbyIdGenerator {
    next: AtomicU64,
}

impl LobbyIdGenerator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> LobbyId {
        LobbyId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for LobbyIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) enum HubCommand<R> {
    /// A client that just completed the Register handshake.
    Register(PendingClient<R>),

    /// A client lobby `from` could not seat.
    Redirect {
        from: LobbyId,
        client: PendingClient<R>,
    },
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle to the running hub task. The hub stops once every handle is gone.
pub struct HubHandle<R> {
    commands: mpsc::UnboundedSender<HubCommand<R>>,
}

impl<R> Clone for HubHandle<R> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<R: FrameReader> HubHandle<R> {
    /// Queues a freshly registered client for seating.
    pub fn register(&self, client: PendingClient<R>) -> Result<(), LobbyError> {
        self.commands
            .send(HubCommand::Register(client))
            .map_err(|_| LobbyError::HubUnavailable)
    }

    /// A handle that does not keep the hub alive.
    pub fn downgrade(&self) -> WeakHub<R> {
        WeakHub {
            commands: self.commands.downgrade(),
        }
    }
}

/// What a lobby holds to send unseated clients back to the hub.
pub struct WeakHub<R> {
    commands: mpsc::WeakUnboundedSender<HubCommand<R>>,
}

impl<R> Clone for WeakHub<R> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

impl<R: FrameReader> WeakHub<R> {
    /// Sends `client` back to the hub. Returns `false` if the hub has
    /// stopped, in which case the client is dropped.
    pub(crate) fn redirect(&self, from: LobbyId, client: PendingClient<R>) -> bool {
        match self.commands.upgrade() {
            Some(commands) => commands
                .send(HubCommand::Redirect { from, client })
                .is_ok(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Hub task
// ---------------------------------------------------------------------------

struct Hub<R> {
    ids: LobbyIdGenerator,
    config: LobbyConfig,
    word_source: Arc<dyn WordSource>,
    current: Option<LobbyHandle<R>>,
    weak: WeakHub<R>,
}

impl<R: FrameReader> Hub<R> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<HubCommand<R>>) {
        tracing::info!(capacity = self.config.capacity, "hub started");

        while let Some(cmd) = commands.recv().await {
            match cmd {
                HubCommand::Register(client) => {
                    tracing::debug!(conn_id = %client.conn_id(), name = %client.name(), "seating client");
                    self.seat(client).await;
                }
                HubCommand::Redirect { from, client } => {
                    if self.current.as_ref().is_some_and(|l| l.id() == from) {
                        self.current = None;
                    }
                    tracing::debug!(%from, conn_id = %client.conn_id(), "re-seating redirected client");
                    self.seat(client).await;
                }
            }
        }

        tracing::info!("hub stopped");
    }

    /// Gives `client` to the current lobby, opening a new one when the
    /// current lobby is no longer seating.
    async fn seat(&mut self, mut client: PendingClient<R>) {
        loop {
            if client.is_closed() {
                tracing::debug!(conn_id = %client.conn_id(), "client gone before seating");
                return;
            }

            let current = self.current.as_ref().filter(|l| l.is_open()).cloned();
            let lobby = match current {
                Some(lobby) => lobby,
                None => self.open_lobby(),
            };

            match lobby.register(client).await {
                Ok(()) => return,
                Err(back) => {
                    self.current = None;
                    client = back;
                }
            }
        }
    }

    fn open_lobby(&mut self) -> LobbyHandle<R> {
        let id = self.ids.next();
        let lobby = spawn_lobby(
            id,
            self.config.clone(),
            Arc::clone(&self.word_source),
            self.weak.clone(),
        );
        tracing::info!(lobby_id = %id, "new lobby");
        self.current = Some(lobby.clone());
        lobby
    }
}

/// Spawns the hub task.
///
/// `config` is validated once here and shared by every lobby the hub
/// opens.
pub fn spawn_hub<R: FrameReader>(
    config: LobbyConfig,
    word_source: Arc<dyn WordSource>,
) -> HubHandle<R> {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let handle = HubHandle {
        commands: commands_tx,
    };

    let hub = Hub {
        ids: LobbyIdGenerator::new(),
        config: config.validated(),
        word_source,
        current: None,
        weak: handle.downgrade(),
    };
    tokio::spawn(hub.run(commands_rx));

    handle
}
