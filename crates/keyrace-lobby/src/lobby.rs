//! Lobby actor: an isolated Tokio task that owns one race.
//!
//! The lobby seats players while Waiting, starts the race, relays progress
//! and routes power-ups while Racing, and tears everything down once every
//! player has finished or left. Nothing outside the task touches its state;
//! the hub and the client actors talk to it through channels.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use keyrace_powerup::{random_display, WordSource};
use keyrace_protocol::{LobbyId, Player, PlayerId, ServerMessage};
use keyrace_transport::FrameReader;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};

use crate::client::{self, ClientHandle, LobbyLinks, PendingClient};
use crate::event::{ClientEvent, IncomingEffect};
use crate::hub::WeakHub;
use crate::{LobbyConfig, LobbyError, LobbyState, SkipWaitPolicy};

/// Capacity of the hub → lobby command channel.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Capacity of the client → lobby event channel.
const EVENT_CHANNEL_SIZE: usize = 64;

/// Commands sent to a lobby actor through its channel.
pub(crate) enum LobbyCommand<R> {
    /// Seat a player, or send them back to the hub.
    Register(PendingClient<R>),

    /// Request a snapshot of the lobby.
    Info { reply: oneshot::Sender<LobbyInfo> },

    /// Close the lobby now.
    Shutdown,
}

/// A snapshot of lobby metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyInfo {
    pub id: LobbyId,
    pub state: LobbyState,
    /// Players currently seated.
    pub player_count: usize,
    pub capacity: usize,
    /// Players still racing (0 before the race).
    pub active: usize,
    /// Whether the lobby still seats new players.
    pub open: bool,
}

// ---------------------------------------------------------------------------
// LobbyHandle
// ---------------------------------------------------------------------------

/// Handle to a running lobby actor.
///
/// Cheap to clone: a command sender plus a view of the lobby's `open` flag.
pub struct LobbyHandle<R> {
    id: LobbyId,
    commands: mpsc::Sender<LobbyCommand<R>>,
    open: watch::Receiver<bool>,
}

impl<R> Clone for LobbyHandle<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            commands: self.commands.clone(),
            open: self.open.clone(),
        }
    }
}

impl<R: FrameReader> LobbyHandle<R> {
    pub fn id(&self) -> LobbyId {
        self.id
    }

    /// Whether the lobby still seats new players. Only the lobby writes
    /// this flag.
    pub fn is_open(&self) -> bool {
        *self.open.borrow() && !self.commands.is_closed()
    }

    /// Hands a client to the lobby. If the lobby has stopped, the client is
    /// given back.
    pub async fn register(&self, client: PendingClient<R>) -> Result<(), PendingClient<R>> {
        match self.commands.send(LobbyCommand::Register(client)).await {
            Err(mpsc::error::SendError(LobbyCommand::Register(client))) => Err(client),
            // A failed send hands back the command that was sent.
            Ok(()) | Err(_) => Ok(()),
        }
    }

    /// Requests the current lobby info.
    pub async fn info(&self) -> Result<LobbyInfo, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(LobbyCommand::Info { reply: reply_tx })
            .await
            .map_err(|_| LobbyError::Unavailable(self.id))?;
        reply_rx.await.map_err(|_| LobbyError::Unavailable(self.id))
    }

    /// Tells the lobby to close, disconnecting everyone still seated.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.commands
            .send(LobbyCommand::Shutdown)
            .await
            .map_err(|_| LobbyError::Unavailable(self.id))
    }
}

// ---------------------------------------------------------------------------
// LobbyActor
// ---------------------------------------------------------------------------

/// The internal lobby state. Runs inside a Tokio task.
struct LobbyActor<R> {
    id: LobbyId,
    state: LobbyState,
    config: LobbyConfig,
    open: watch::Sender<bool>,
    roster: BTreeMap<PlayerId, ClientHandle>,
    /// Next id to hand out, `None` once every `u8` id has been used.
    next_player: Option<u8>,
    base_words: Vec<String>,
    active: usize,
    votes: HashSet<PlayerId>,
    countdown: Instant,
    open_until: Instant,
    links: LobbyLinks,
    commands: mpsc::Receiver<LobbyCommand<R>>,
    events: mpsc::Receiver<ClientEvent>,
    leaves: mpsc::UnboundedReceiver<PlayerId>,
    hub: WeakHub<R>,
}

impl<R: FrameReader> LobbyActor<R> {
    /// Runs the actor loop until the lobby is closed.
    async fn run(mut self) {
        tracing::info!(
            lobby_id = %self.id,
            words = self.base_words.len(),
            countdown_secs = self.config.countdown_secs,
            "lobby opened"
        );

        loop {
            match self.state {
                LobbyState::Waiting => {
                    let open = *self.open.borrow();
                    tokio::select! {
                        Some(cmd) = self.commands.recv() => self.handle_command(cmd),
                        Some(event) = self.events.recv() => self.handle_event(event),
                        Some(id) = self.leaves.recv() => self.handle_leave(id),
                        _ = time::sleep_until(self.open_until), if open => {
                            self.close_to_joins("open window elapsed");
                        }
                        _ = time::sleep_until(self.countdown) => self.start_race("countdown elapsed"),
                    }
                }
                LobbyState::Racing => {
                    tokio::select! {
                        Some(cmd) = self.commands.recv() => self.handle_command(cmd),
                        Some(event) = self.events.recv() => self.handle_event(event),
                        Some(id) = self.leaves.recv() => self.handle_leave(id),
                    }
                }
                LobbyState::Closing => self.close(),
                LobbyState::Closed => break,
            }
        }

        tracing::info!(lobby_id = %self.id, "lobby closed");
    }

    fn transition(&mut self, to: LobbyState) {
        debug_assert!(
            self.state.can_transition_to(to),
            "invalid lobby transition {} -> {}",
            self.state,
            to
        );
        tracing::debug!(lobby_id = %self.id, from = %self.state, %to, "lobby state change");
        self.state = to;
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn handle_command(&mut self, cmd: LobbyCommand<R>) {
        match cmd {
            LobbyCommand::Register(client) => self.handle_register(client),
            LobbyCommand::Info { reply } => {
                let _ = reply.send(self.info());
            }
            LobbyCommand::Shutdown => {
                tracing::info!(lobby_id = %self.id, state = %self.state, "lobby shutting down");
                self.transition(LobbyState::Closing);
            }
        }
    }

    fn handle_register(&mut self, client: PendingClient<R>) {
        if client.is_closed() {
            tracing::debug!(lobby_id = %self.id, conn_id = %client.conn_id(), "closed client dropped");
            return;
        }
        if !self.state.is_joinable()
            || !*self.open.borrow()
            || self.roster.len() >= self.config.capacity
        {
            tracing::debug!(
                lobby_id = %self.id,
                conn_id = %client.conn_id(),
                state = %self.state,
                players = self.roster.len(),
                "lobby not seating, redirecting to hub"
            );
            self.redirect(client);
            return;
        }

        let Some(next) = self.next_player else {
            tracing::warn!(lobby_id = %self.id, conn_id = %client.conn_id(), "player ids exhausted");
            self.close_to_joins("player ids exhausted");
            self.redirect(client);
            return;
        };
        let id = PlayerId(next);
        self.next_player = next.checked_add(1);
        if self.next_player.is_none() {
            self.close_to_joins("player ids exhausted");
        }
        let player = Player {
            id,
            name: client.name().to_owned(),
        };

        self.broadcast(ServerMessage::NewRegisteredPlayer(player.clone()));

        let displayed = random_display(self.config.displayed_powerups, &mut rand::rng());
        let handle = client::spawn(
            client,
            player.clone(),
            self.base_words.clone(),
            displayed.clone(),
            &self.links,
        );
        self.roster.insert(id, handle);

        let players = self.roster.values().map(|c| c.player.clone()).collect();
        if let Some(handle) = self.roster.get(&id) {
            handle.send(ServerMessage::LobbyGreeting {
                player_id: id,
                seconds_remaining: self.seconds_remaining(),
                players,
                words: self.base_words.clone(),
                powerups: displayed,
            });
        }

        tracing::info!(
            lobby_id = %self.id,
            player_id = %id,
            name = %player.name,
            players = self.roster.len(),
            "player joined"
        );

        if self.roster.len() >= self.config.capacity {
            self.close_to_joins("lobby full");
            if self.config.start_when_full {
                self.start_race("lobby full");
            }
        }
    }

    fn redirect(&self, client: PendingClient<R>) {
        if !self.hub.redirect(self.id, client) {
            tracing::debug!(lobby_id = %self.id, "hub gone, client dropped");
        }
    }

    // -----------------------------------------------------------------------
    // Client events
    // -----------------------------------------------------------------------

    fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::SkipWait { id } => {
                if self.state.is_joinable() && self.roster.contains_key(&id) {
                    self.votes.insert(id);
                    tracing::debug!(lobby_id = %self.id, player_id = %id, votes = self.votes.len(), "skip vote");
                    self.check_skip_quorum();
                }
            }
            ClientEvent::ProgressUpdate { id, progress, wpm } => {
                if self.state.is_racing() && self.roster.contains_key(&id) {
                    self.broadcast(ServerMessage::ProgressUpdate {
                        player_id: id,
                        progress,
                        wpm,
                    });
                }
            }
            ClientEvent::Finished { id } => self.handle_finished(id),
            ClientEvent::ApplyStatusEffect {
                from,
                affected,
                powerup,
            } => {
                if !self.state.is_racing() {
                    return;
                }
                match self.roster.get(&affected) {
                    Some(target) => {
                        tracing::debug!(lobby_id = %self.id, %from, %affected, %powerup, "routing power-up");
                        target.deliver(IncomingEffect { from, powerup });
                    }
                    None => {
                        tracing::debug!(lobby_id = %self.id, %from, %affected, %powerup, "power-up target not seated, dropped");
                    }
                }
            }
            ClientEvent::StatusChanged { id, powerups } => {
                if self.state.is_racing() && self.roster.contains_key(&id) {
                    self.broadcast(ServerMessage::StatusChanged {
                        player_id: id,
                        powerups,
                    });
                }
            }
        }
    }

    fn handle_finished(&mut self, id: PlayerId) {
        if !self.state.is_racing() {
            return;
        }
        let Some(client) = self.roster.get_mut(&id) else {
            return;
        };
        if client.finished {
            return;
        }
        client.finished = true;

        let placement = u8::try_from(self.active).unwrap_or(u8::MAX);
        self.broadcast(ServerMessage::PlayerFinished {
            player_id: id,
            placement,
        });
        self.active = self.active.saturating_sub(1);
        tracing::info!(lobby_id = %self.id, player_id = %id, placement, active = self.active, "player finished");

        if self.active == 0 {
            self.transition(LobbyState::Closing);
        }
    }

    fn handle_leave(&mut self, id: PlayerId) {
        let Some(client) = self.roster.remove(&id) else {
            return;
        };
        tracing::info!(
            lobby_id = %self.id,
            player_id = %id,
            players = self.roster.len(),
            "player left"
        );

        match self.state {
            LobbyState::Waiting => {
                self.votes.remove(&id);
                self.check_skip_quorum();
            }
            LobbyState::Racing => {
                if !client.finished {
                    self.active = self.active.saturating_sub(1);
                    if self.active == 0 {
                        self.transition(LobbyState::Closing);
                    }
                }
            }
            LobbyState::Closing | LobbyState::Closed => {}
        }
    }

    fn check_skip_quorum(&mut self) {
        if !self.state.is_joinable() || self.votes.is_empty() {
            return;
        }
        let reached = match self.config.skip_wait {
            SkipWaitPolicy::FirstVote => true,
            SkipWaitPolicy::Unanimous => self.roster.keys().all(|id| self.votes.contains(id)),
        };
        if reached {
            self.start_race("skip-wait quorum");
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn close_to_joins(&mut self, reason: &str) {
        if self.open.send_replace(false) {
            tracing::debug!(lobby_id = %self.id, reason, "lobby closed to joins");
        }
    }

    fn start_race(&mut self, reason: &str) {
        if !self.state.is_joinable() {
            return;
        }
        self.close_to_joins(reason);
        self.transition(LobbyState::Racing);
        self.active = self.roster.len();
        tracing::info!(lobby_id = %self.id, players = self.active, reason, "race started");

        if self.active == 0 {
            self.transition(LobbyState::Closing);
            return;
        }
        self.broadcast(ServerMessage::RaceStarted);
    }

    /// Closing: stop intake, send queued registrations back to the hub,
    /// force-close every remaining client.
    fn close(&mut self) {
        self.open.send_replace(false);
        self.commands.close();
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                LobbyCommand::Register(client) => self.redirect(client),
                LobbyCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                LobbyCommand::Shutdown => {}
            }
        }

        let remaining = self.roster.len();
        for (_, client) in std::mem::take(&mut self.roster) {
            client.force_close();
        }
        tracing::debug!(lobby_id = %self.id, remaining, "remaining clients disconnected");
        self.transition(LobbyState::Closed);
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Queues `msg` for every seated client. Never blocks.
    fn broadcast(&self, msg: ServerMessage) {
        for client in self.roster.values() {
            client.send(msg.clone());
        }
    }

    fn seconds_remaining(&self) -> u16 {
        let left = self.countdown.saturating_duration_since(Instant::now());
        let secs = left.as_millis().div_ceil(1000);
        u16::try_from(secs).unwrap_or(u16::MAX)
    }

    fn info(&self) -> LobbyInfo {
        LobbyInfo {
            id: self.id,
            state: self.state,
            player_count: self.roster.len(),
            capacity: self.config.capacity,
            active: self.active,
            open: *self.open.borrow(),
        }
    }
}

/// Spawns a new lobby actor task and returns a handle to communicate with it.
///
/// The lobby draws its words from `word_source` and sends players it
/// cannot seat back to `hub`. `config` is used as given; the hub validates
/// it once for all of its lobbies.
pub fn spawn_lobby<R: FrameReader>(
    id: LobbyId,
    config: LobbyConfig,
    word_source: Arc<dyn WordSource>,
    hub: WeakHub<R>,
) -> LobbyHandle<R> {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    let (leaves_tx, leaves_rx) = mpsc::unbounded_channel();
    let (open_tx, open_rx) = watch::channel(true);

    let now = Instant::now();
    let actor = LobbyActor {
        id,
        state: LobbyState::Waiting,
        base_words: word_source.random_words(config.word_count),
        countdown: now + config.countdown(),
        open_until: now + config.open_window(),
        open: open_tx,
        roster: BTreeMap::new(),
        next_player: Some(0),
        active: 0,
        votes: HashSet::new(),
        links: LobbyLinks {
            lobby_id: id,
            events: events_tx,
            leaves: leaves_tx,
            word_source,
            selectable: config.selectable_powerups,
        },
        config,
        commands: commands_rx,
        events: events_rx,
        leaves: leaves_rx,
        hub,
    };

    tokio::spawn(actor.run());

    LobbyHandle {
        id,
        commands: commands_tx,
        open: open_rx,
    }
}
