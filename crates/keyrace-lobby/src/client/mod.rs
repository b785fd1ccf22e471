//! Client actor: three tasks per connection.
//!
//! ```text
//!             inbound              events
//!  reader ───────────▶ state ───────────────▶ lobby
//!    │  ▲              handler ◀───────────── lobby (effects)
//!    │  └─ kill ◀──── lobby        │
//!    └─ leaves ─────▶ lobby        ▼ outbound
//!                     lobby ─────▶ writer ──▶ connection
//! ```
//!
//! The writer starts at the Register handshake (see [`PendingClient::new`])
//! so the hub greeting can be sent before the player has a seat. The reader
//! and state handler start when a lobby seats the player.

mod io;
mod racer;
mod task;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keyrace_powerup::{PowerupKind, WordSource};
use keyrace_protocol::{LobbyId, Player, PlayerId, ServerMessage};
use keyrace_transport::{ConnectionId, FrameReader, FrameWriter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

use crate::event::{ClientEvent, IncomingEffect};
use io::ReaderLinks;
use racer::Racer;
use task::StateLinks;

// ---------------------------------------------------------------------------
// PendingClient
// ---------------------------------------------------------------------------

/// A registered connection that has not been seated in a lobby yet.
///
/// Owns the inbound half of the connection; the outbound half is already
/// being driven by the writer task.
pub struct PendingClient<R> {
    conn_id: ConnectionId,
    name: String,
    reader: R,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    race_start: watch::Receiver<Option<Instant>>,
    closed: Arc<AtomicBool>,
}

impl<R: FrameReader> PendingClient<R> {
    /// Starts the writer task for `writer` and wraps the rest.
    pub fn new<W: FrameWriter>(
        conn_id: ConnectionId,
        name: impl Into<String>,
        reader: R,
        writer: W,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (race_start_tx, race_start) = watch::channel(None);
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(io::run_writer(
            conn_id,
            writer,
            outbound_rx,
            race_start_tx,
            Arc::clone(&closed),
        ));

        Self {
            conn_id,
            name: name.into(),
            reader,
            outbound,
            race_start,
            closed,
        }
    }

    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a message for the writer. Returns `false` if the writer has
    /// stopped.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.outbound.send(msg).is_ok()
    }

    /// `true` once the reader has seen the connection close.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// ClientHandle
// ---------------------------------------------------------------------------

/// The lobby's side of a seated client.
///
/// Dropping the handle fires the kill switch (by drop), which stops the
/// reader and, through it, the state handler and writer.
pub(crate) struct ClientHandle {
    pub player: Player,
    pub finished: bool,
    outbound: mpsc::UnboundedSender<ServerMessage>,
    effects: mpsc::UnboundedSender<IncomingEffect>,
    kill: Option<oneshot::Sender<()>>,
}

impl ClientHandle {
    /// Queues a wire message for this client. Never blocks; a client whose
    /// writer has stopped silently drops it.
    pub fn send(&self, msg: ServerMessage) {
        let _ = self.outbound.send(msg);
    }

    /// Routes a power-up to this client's state handler.
    pub fn deliver(&self, effect: IncomingEffect) {
        let _ = self.effects.send(effect);
    }

    /// Stops the client's reader, which cascades to its other tasks.
    pub fn force_close(mut self) {
        if let Some(kill) = self.kill.take() {
            let _ = kill.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// spawn
// ---------------------------------------------------------------------------

/// What a lobby hands every client it seats.
#[derive(Clone)]
pub(crate) struct LobbyLinks {
    pub lobby_id: LobbyId,
    pub events: mpsc::Sender<ClientEvent>,
    pub leaves: mpsc::UnboundedSender<PlayerId>,
    pub word_source: Arc<dyn WordSource>,
    pub selectable: usize,
}

/// Seats `pending` as `player`: spawns its reader and state handler and
/// returns the lobby's handle.
pub(crate) fn spawn<R: FrameReader>(
    pending: PendingClient<R>,
    player: Player,
    words: Vec<String>,
    displayed: Vec<PowerupKind>,
    links: &LobbyLinks,
) -> ClientHandle {
    let PendingClient {
        conn_id,
        reader,
        outbound,
        race_start,
        closed,
        ..
    } = pending;

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (effects_tx, effects_rx) = mpsc::unbounded_channel();
    let (kill_tx, kill_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();

    let racer = Racer::new(
        player.id,
        words,
        displayed,
        links.selectable,
        Arc::clone(&links.word_source),
        StdRng::from_os_rng(),
    );

    tokio::spawn(io::run_reader(
        reader,
        ReaderLinks {
            lobby_id: links.lobby_id,
            player_id: player.id,
            conn_id,
            inbound: inbound_tx,
            kill: kill_rx,
            done: done_tx,
            leaves: links.leaves.clone(),
            closed,
        },
    ));

    tokio::spawn(task::run_state_handler(
        racer,
        StateLinks {
            lobby_id: links.lobby_id,
            inbound: inbound_rx,
            effects: effects_rx,
            done: done_rx,
            race_start,
            outbound: outbound.clone(),
            events: links.events.clone(),
        },
    ));

    ClientHandle {
        player,
        finished: false,
        outbound,
        effects: effects_tx,
        kill: Some(kill_tx),
    }
}
