//! The state-handler task: sole owner of a [`Racer`].

use keyrace_protocol::{ClientMessage, LobbyId, ServerMessage};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::debug;

use super::racer::{Outgoing, Racer};
use crate::event::{ClientEvent, IncomingEffect};

pub(crate) struct StateLinks {
    pub lobby_id: LobbyId,
    pub inbound: mpsc::UnboundedReceiver<ClientMessage>,
    pub effects: mpsc::UnboundedReceiver<IncomingEffect>,
    pub done: oneshot::Receiver<()>,
    pub race_start: watch::Receiver<Option<Instant>>,
    pub outbound: mpsc::UnboundedSender<ServerMessage>,
    pub events: mpsc::Sender<ClientEvent>,
}

/// Multiplexes inbound messages, routed effects, effect timers and the
/// reader's done signal until the reader goes away or the lobby stops
/// listening.
pub(crate) async fn run_state_handler(mut racer: Racer, links: StateLinks) {
    let StateLinks {
        lobby_id,
        mut inbound,
        mut effects,
        mut done,
        race_start,
        outbound,
        events,
    } = links;

    let mut out = Vec::new();
    loop {
        tokio::select! {
            _ = &mut done => break,
            Some(msg) = inbound.recv() => {
                let start = *race_start.borrow();
                racer.handle_message(msg, start, Instant::now(), &mut out);
            }
            Some(effect) = effects.recv() => {
                racer.deliver(effect.from, effect.powerup, &mut out);
            }
            kind = racer.next_expiry() => {
                racer.expire(kind, &mut out);
            }
        }

        for item in out.drain(..) {
            match item {
                Outgoing::Client(msg) => {
                    let _ = outbound.send(msg);
                }
                Outgoing::Lobby(event) => {
                    if events.send(event).await.is_err() {
                        debug!(%lobby_id, "lobby gone, state handler stopping");
                        return;
                    }
                }
            }
        }
    }

    debug!(
        %lobby_id,
        cursor = racer.cursor(),
        finished = racer.is_finished(),
        "state handler stopped"
    );
}
