//! The synchronous core of a client's state handler.
//!
//! A [`Racer`] owns one player's words, cursor and power-up state. It never
//! touches a channel: every handler pushes [`Outgoing`] items into a buffer
//! that the state-handler task then delivers.

use std::sync::Arc;
use std::time::Duration;

use keyrace_powerup::{
    catalogue, effect, mutate_range, targets_self, Effect, EffectTimers, PowerupKind,
    PowerupState, PurchaseRejection, WordSource,
};
use keyrace_protocol::{ClientMessage, PlayerId, ServerMessage};
use rand::rngs::StdRng;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::event::ClientEvent;

/// Something a [`Racer`] wants delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outgoing {
    /// To the lobby, for routing or broadcast.
    Lobby(ClientEvent),
    /// Straight to this player's connection.
    Client(ServerMessage),
}

pub(crate) struct Racer {
    id: PlayerId,
    words: Vec<String>,
    cursor: usize,
    chars_typed: usize,
    finished: bool,
    selectable: usize,
    powerups: PowerupState,
    timers: EffectTimers,
    word_source: Arc<dyn WordSource>,
    rng: StdRng,
}

impl Racer {
    pub(crate) fn new(
        id: PlayerId,
        words: Vec<String>,
        displayed: Vec<PowerupKind>,
        selectable: usize,
        word_source: Arc<dyn WordSource>,
        rng: StdRng,
    ) -> Self {
        Self {
            id,
            words,
            cursor: 0,
            chars_typed: 0,
            finished: false,
            selectable,
            powerups: PowerupState::new(displayed),
            timers: EffectTimers::new(),
            word_source,
            rng,
        }
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub(crate) fn words(&self) -> &[String] {
        &self.words
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    #[cfg(test)]
    pub(crate) fn powerups(&self) -> &PowerupState {
        &self.powerups
    }

    /// Resolves when the next timed effect runs out. Pends while none is
    /// running.
    pub(crate) async fn next_expiry(&mut self) -> PowerupKind {
        self.timers.next_expiry().await
    }

    // -----------------------------------------------------------------------
    // Inbound messages
    // -----------------------------------------------------------------------

    /// Handles one decoded client message. `race_start` is `None` until the
    /// race has started.
    pub(crate) fn handle_message(
        &mut self,
        msg: ClientMessage,
        race_start: Option<Instant>,
        now: Instant,
        out: &mut Vec<Outgoing>,
    ) {
        match msg {
            ClientMessage::Register { .. } => {
                debug!(player_id = %self.id, "duplicate register ignored");
            }
            ClientMessage::Submission { answer } => {
                if let Some(start) = race_start {
                    self.submit(answer, now.saturating_duration_since(start), out);
                }
            }
            ClientMessage::PowerupPurchase { powerup, affected } => {
                self.purchase(powerup, affected, race_start.is_some(), out);
            }
            ClientMessage::SkipWait => {
                out.push(Outgoing::Lobby(ClientEvent::SkipWait { id: self.id }));
            }
            ClientMessage::SelectPowerups { powerups } => {
                if let Err(e) = self.powerups.select(&powerups, self.selectable) {
                    debug!(player_id = %self.id, error = %e, "selection rejected");
                }
            }
        }
    }

    fn submit(&mut self, answer: u32, elapsed: Duration, out: &mut Vec<Outgoing>) {
        if self.finished || answer as usize != self.cursor {
            return;
        }
        let Some(word) = self.words.get(self.cursor) else {
            return;
        };

        self.chars_typed += word.chars().count() + 1;
        self.cursor += 1;

        out.push(Outgoing::Lobby(ClientEvent::ProgressUpdate {
            id: self.id,
            progress: u32::try_from(self.cursor).unwrap_or(u32::MAX),
            wpm: wpm(self.chars_typed, elapsed),
        }));

        if self.powerups.word_completed() {
            self.status_changed(out);
        }

        if self.cursor == self.words.len() {
            self.finished = true;
            out.push(Outgoing::Lobby(ClientEvent::Finished { id: self.id }));
        }
    }

    fn purchase(
        &mut self,
        kind: PowerupKind,
        affected: PlayerId,
        race_started: bool,
        out: &mut Vec<Outgoing>,
    ) {
        let result = if race_started {
            self.powerups.purchase(kind)
        } else {
            Err(PurchaseRejection::RaceNotStarted)
        };

        let success = match result {
            Ok(()) => true,
            Err(e) => {
                debug!(player_id = %self.id, %kind, reason = %e, "purchase rejected");
                false
            }
        };
        out.push(Outgoing::Client(ServerMessage::PurchaseResult {
            powerup: kind,
            success,
        }));
        if !success {
            return;
        }

        if targets_self(kind) {
            self.apply(kind, out);
        } else {
            out.push(Outgoing::Lobby(ClientEvent::ApplyStatusEffect {
                from: self.id,
                affected,
                powerup: kind,
            }));
        }
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    /// Handles a power-up another player aimed at this one.
    pub(crate) fn deliver(&mut self, from: PlayerId, kind: PowerupKind, out: &mut Vec<Outgoing>) {
        if self.finished {
            debug!(player_id = %self.id, %kind, "effect on finished racer dropped");
            return;
        }

        if self.powerups.is_active(PowerupKind::RearViewMirror) {
            debug!(player_id = %self.id, %from, %kind, "effect reflected");
            self.powerups.deactivate(PowerupKind::RearViewMirror);
            if let Some(timer) = self.timers.get_mut(PowerupKind::RearViewMirror) {
                if timer.drain() {
                    trace!(player_id = %self.id, "mirror expiry drained");
                }
                timer.disarm();
            }
            out.push(Outgoing::Lobby(ClientEvent::ApplyStatusEffect {
                from: self.id,
                affected: from,
                powerup: kind,
            }));
            self.status_changed(out);
            return;
        }

        self.apply(kind, out);
    }

    fn apply(&mut self, kind: PowerupKind, out: &mut Vec<Outgoing>) {
        match effect(kind) {
            Effect::Timed(duration) => {
                self.powerups.activate(kind);
                if let Some(timer) = self.timers.get_mut(kind) {
                    timer.arm(duration);
                }
            }
            Effect::Mutate { transform, words } => {
                let start = self.cursor + catalogue::MUTATION_OFFSET;
                let Some(update) =
                    mutate_range(&mut self.words, start, words, transform, &mut self.rng)
                else {
                    debug!(player_id = %self.id, %kind, "nothing left to mutate");
                    return;
                };
                self.powerups.activate_for_words(kind, update.mutated);
                out.push(Outgoing::Client(ServerMessage::UpdateWords {
                    start: u32::try_from(update.start).unwrap_or(u32::MAX),
                    words: update.words,
                }));
            }
            Effect::Append { words } => {
                let start = self.words.len();
                let appended = self.word_source.random_words(words);
                self.words.extend(appended.iter().cloned());
                self.powerups.activate_for_words(kind, appended.len());
                out.push(Outgoing::Client(ServerMessage::UpdateWords {
                    start: u32::try_from(start).unwrap_or(u32::MAX),
                    words: appended,
                }));
            }
        }
        self.status_changed(out);
    }

    /// Clears a timed effect whose timer ran out.
    pub(crate) fn expire(&mut self, kind: PowerupKind, out: &mut Vec<Outgoing>) {
        if self.powerups.deactivate(kind) {
            debug!(player_id = %self.id, %kind, "effect expired");
            self.status_changed(out);
        }
    }

    fn status_changed(&self, out: &mut Vec<Outgoing>) {
        out.push(Outgoing::Lobby(ClientEvent::StatusChanged {
            id: self.id,
            powerups: self.powerups.active_kinds(),
        }));
    }
}

/// Words per minute, where a "word" is five characters (spaces included).
pub(crate) fn wpm(chars_typed: usize, elapsed: Duration) -> u32 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0;
    }
    // (chars / 5) * 60 / secs
    let wpm = chars_typed as f64 * 12.0 / secs;
    wpm.min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyrace_powerup::CorpusWords;
    use rand::SeedableRng;
    use PowerupKind::*;

    const ME: PlayerId = PlayerId(1);
    const THEM: PlayerId = PlayerId(0);

    fn racer(n_words: usize) -> Racer {
        let words = (0..n_words).map(|i| format!("w{i}")).collect();
        Racer::new(
            ME,
            words,
            PowerupKind::ALL.to_vec(),
            2,
            Arc::new(CorpusWords::new(vec!["spike".into()]).unwrap()),
            StdRng::seed_from_u64(1),
        )
    }

    fn started() -> (Option<Instant>, Instant) {
        let now = Instant::now();
        (Some(now), now)
    }

    fn submit(r: &mut Racer, answer: u32) -> Vec<Outgoing> {
        let (start, now) = started();
        let mut out = Vec::new();
        r.handle_message(ClientMessage::Submission { answer }, start, now, &mut out);
        out
    }

    fn status(powerups: Vec<PowerupKind>) -> Outgoing {
        Outgoing::Lobby(ClientEvent::StatusChanged { id: ME, powerups })
    }

    fn assert_used_implies_offered(r: &Racer) {
        for kind in PowerupKind::ALL {
            assert!(!r.powerups().is_used(kind) || r.powerups().is_offered(kind));
        }
    }

    // -----------------------------------------------------------------------
    // Typing
    // -----------------------------------------------------------------------

    #[test]
    fn test_submission_before_race_ignored() {
        let mut r = racer(3);
        let mut out = Vec::new();
        r.handle_message(
            ClientMessage::Submission { answer: 0 },
            None,
            Instant::now(),
            &mut out,
        );
        assert!(out.is_empty());
        assert_eq!(r.cursor(), 0);
    }

    #[test]
    fn test_wrong_index_ignored() {
        let mut r = racer(3);
        assert!(submit(&mut r, 1).is_empty());
        assert!(submit(&mut r, 99).is_empty());
        assert_eq!(r.cursor(), 0);
    }

    #[test]
    fn test_full_sequence_finishes_exactly_once() {
        let mut r = racer(3);
        let mut finished = 0;
        let mut progress = Vec::new();
        for answer in 0..3 {
            for o in submit(&mut r, answer) {
                match o {
                    Outgoing::Lobby(ClientEvent::ProgressUpdate { progress: p, .. }) => {
                        progress.push(p)
                    }
                    Outgoing::Lobby(ClientEvent::Finished { id }) => {
                        assert_eq!(id, ME);
                        finished += 1;
                    }
                    other => panic!("unexpected {other:?}"),
                }
            }
        }
        assert_eq!(progress, vec![1, 2, 3]);
        assert_eq!(finished, 1);
        assert!(r.is_finished());
        assert!(submit(&mut r, 3).is_empty());
        assert!(submit(&mut r, 2).is_empty());
    }

    #[test]
    fn test_wpm_counts_five_chars_per_word() {
        // 12 words of 4 chars + a space each = 60 chars = 12 "words".
        assert_eq!(wpm(60, Duration::from_secs(60)), 12);
        assert_eq!(wpm(60, Duration::from_secs(30)), 24);
        assert_eq!(wpm(60, Duration::ZERO), 0);
    }

    #[test]
    fn test_progress_reports_wpm_since_start() {
        let mut r = racer(3);
        let now = Instant::now();
        let start = now - Duration::from_secs(6);
        let mut out = Vec::new();
        r.handle_message(ClientMessage::Submission { answer: 0 }, Some(start), now, &mut out);
        // "w0" + space = 3 chars over 6 s: 0.6 words * 10 = 6 wpm.
        assert_eq!(
            out,
            vec![Outgoing::Lobby(ClientEvent::ProgressUpdate {
                id: ME,
                progress: 1,
                wpm: 6
            })]
        );
    }

    // -----------------------------------------------------------------------
    // Purchases
    // -----------------------------------------------------------------------

    fn buy(r: &mut Racer, powerup: PowerupKind, started: bool) -> Vec<Outgoing> {
        let now = Instant::now();
        let mut out = Vec::new();
        r.handle_message(
            ClientMessage::PowerupPurchase {
                powerup,
                affected: THEM,
            },
            started.then_some(now),
            now,
            &mut out,
        );
        out
    }

    fn select(r: &mut Racer, powerups: Vec<PowerupKind>) {
        let mut out = Vec::new();
        r.handle_message(
            ClientMessage::SelectPowerups { powerups },
            None,
            Instant::now(),
            &mut out,
        );
        assert!(out.is_empty());
    }

    fn result(powerup: PowerupKind, success: bool) -> Outgoing {
        Outgoing::Client(ServerMessage::PurchaseResult { powerup, success })
    }

    #[test]
    fn test_purchase_before_race_rejected() {
        let mut r = racer(20);
        select(&mut r, vec![Fog, IcyRoads]);
        assert_eq!(buy(&mut r, Fog, false), vec![result(Fog, false)]);
        assert!(!r.powerups().is_used(Fog));
    }

    #[test]
    fn test_purchase_sends_effect_to_lobby() {
        let mut r = racer(20);
        select(&mut r, vec![Fog, IcyRoads]);
        assert_eq!(
            buy(&mut r, Fog, true),
            vec![
                result(Fog, true),
                Outgoing::Lobby(ClientEvent::ApplyStatusEffect {
                    from: ME,
                    affected: THEM,
                    powerup: Fog
                })
            ]
        );
        assert_eq!(buy(&mut r, Fog, true), vec![result(Fog, false)]);
        assert_eq!(buy(&mut r, Scrambler, true), vec![result(Scrambler, false)]);
        assert_used_implies_offered(&r);
    }

    #[test]
    fn test_mirror_purchase_applies_to_self() {
        let mut r = racer(20);
        select(&mut r, vec![RearViewMirror, Fog]);
        assert_eq!(
            buy(&mut r, RearViewMirror, true),
            vec![result(RearViewMirror, true), status(vec![RearViewMirror])]
        );
        assert!(r.powerups().is_active(RearViewMirror));
    }

    #[test]
    fn test_tire_boot_locks_purchases() {
        let mut r = racer(20);
        select(&mut r, vec![Fog, IcyRoads]);
        let mut out = Vec::new();
        r.deliver(THEM, TireBoot, &mut out);
        assert_eq!(out, vec![status(vec![TireBoot])]);
        assert_eq!(buy(&mut r, Fog, true), vec![result(Fog, false)]);

        let mut out = Vec::new();
        r.expire(TireBoot, &mut out);
        assert_eq!(out, vec![status(vec![])]);
        assert_eq!(buy(&mut r, Fog, true)[0], result(Fog, true));
    }

    #[test]
    fn test_reselection_frozen_after_purchase() {
        let mut r = racer(20);
        select(&mut r, vec![Fog, IcyRoads]);
        select(&mut r, vec![Scrambler, TireBoot]);
        assert!(r.powerups().is_offered(Scrambler));
        assert!(!r.powerups().is_offered(Fog));

        buy(&mut r, Scrambler, true);
        select(&mut r, vec![Fog, IcyRoads]);
        assert!(r.powerups().is_offered(Scrambler));
        assert!(!r.powerups().is_offered(Fog));
        assert_used_implies_offered(&r);
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    #[test]
    fn test_icy_roads_mutates_ten_words_ahead() {
        let mut r = racer(30);
        submit(&mut r, 0);
        submit(&mut r, 1);

        let mut out = Vec::new();
        r.deliver(THEM, IcyRoads, &mut out);
        let Outgoing::Client(ServerMessage::UpdateWords { start, words }) = &out[0] else {
            panic!("expected UpdateWords, got {out:?}");
        };
        assert_eq!(*start, 5);
        assert_eq!(words.len(), 25, "the whole tail from the first mutated word");
        assert_eq!(words.as_slice(), &r.words()[5..]);
        assert_eq!(words[10], "w15");
        assert_eq!(r.words()[4], "w4");
        assert_eq!(r.powerups().words_left(IcyRoads), 10);
        assert_eq!(out[1], status(vec![IcyRoads]));

        let mut cleared_at = None;
        for answer in 2..12 {
            let out = submit(&mut r, answer);
            if out.contains(&status(vec![])) {
                cleared_at = Some(answer);
            }
        }
        assert_eq!(cleared_at, Some(11), "cleared after the tenth word");
        assert!(!r.powerups().is_active(IcyRoads));
    }

    #[test]
    fn test_mutation_clips_to_sequence_end() {
        let mut r = racer(6);
        let mut out = Vec::new();
        r.deliver(THEM, Scrambler, &mut out);
        let Outgoing::Client(ServerMessage::UpdateWords { start, words }) = &out[0] else {
            panic!("expected UpdateWords");
        };
        assert_eq!(*start, 3);
        assert_eq!(words.len(), 3);
        assert_eq!(r.powerups().words_left(Scrambler), 3);
    }

    #[test]
    fn test_mutation_with_nothing_ahead_has_no_effect() {
        let mut r = racer(3);
        let mut out = Vec::new();
        r.deliver(THEM, StickShift, &mut out);
        assert!(out.is_empty());
        assert!(!r.powerups().is_active(StickShift));
    }

    #[test]
    fn test_spike_strip_appends_words() {
        let mut r = racer(4);
        let mut out = Vec::new();
        r.deliver(THEM, SpikeStrip, &mut out);
        assert_eq!(
            out,
            vec![
                Outgoing::Client(ServerMessage::UpdateWords {
                    start: 4,
                    words: vec!["spike".into(); 5]
                }),
                status(vec![SpikeStrip])
            ]
        );
        assert_eq!(r.words().len(), 9);
        assert_eq!(r.powerups().words_left(SpikeStrip), 5);
    }

    #[test]
    fn test_mirror_reflects_and_is_consumed() {
        let mut r = racer(20);
        select(&mut r, vec![RearViewMirror, Fog]);
        buy(&mut r, RearViewMirror, true);

        let mut out = Vec::new();
        r.deliver(THEM, IcyRoads, &mut out);
        assert_eq!(
            out,
            vec![
                Outgoing::Lobby(ClientEvent::ApplyStatusEffect {
                    from: ME,
                    affected: THEM,
                    powerup: IcyRoads
                }),
                status(vec![])
            ]
        );
        assert_eq!(r.words()[3], "w3", "nothing applied to self");

        let mut out = Vec::new();
        r.deliver(THEM, Fog, &mut out);
        assert_eq!(out, vec![status(vec![Fog])], "mirror is single use");
    }

    #[test]
    fn test_stale_expiry_after_reflection_is_ignored() {
        let mut r = racer(20);
        select(&mut r, vec![RearViewMirror, Fog]);
        buy(&mut r, RearViewMirror, true);
        r.deliver(THEM, Fog, &mut Vec::new());

        let mut out = Vec::new();
        r.expire(RearViewMirror, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_effects_on_finished_racer_dropped() {
        let mut r = racer(1);
        submit(&mut r, 0);
        let mut out = Vec::new();
        r.deliver(THEM, SpikeStrip, &mut out);
        assert!(out.is_empty());
        assert_eq!(r.words().len(), 1);
    }

    #[test]
    fn test_skip_wait_forwarded() {
        let mut r = racer(1);
        let mut out = Vec::new();
        r.handle_message(ClientMessage::SkipWait, None, Instant::now(), &mut out);
        assert_eq!(out, vec![Outgoing::Lobby(ClientEvent::SkipWait { id: ME })]);
    }
}
