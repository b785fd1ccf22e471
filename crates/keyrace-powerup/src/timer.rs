//! Cancellable timers for the timed power-ups.
//!
//! An [`EffectTimer`] is either disarmed or armed with a deadline. While
//! disarmed, [`EffectTimer::expired`] pends forever, which makes it safe to
//! leave in a `tokio::select!` branch:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(msg) = inbound.recv() => { /* handle message */ }
//!         kind = timers.next_expiry() => { /* clear `kind` */ }
//!     }
//! }
//! ```
//!
//! Expiry is observed at most once per arming. Re-arming replaces the
//! deadline, and disarming forgets it, so a stale expiry is never acted on.

use std::time::Duration;

use keyrace_protocol::PowerupKind;
use tokio::time::{self, Instant};
use tracing::trace;

/// A single one-shot, re-armable deadline.
#[derive(Debug, Default)]
pub struct EffectTimer {
    deadline: Option<Instant>,
}

impl EffectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules expiry `duration` from now, replacing any earlier deadline.
    pub fn arm(&mut self, duration: Duration) {
        self.deadline = Some(Instant::now() + duration);
    }

    /// Cancels the pending expiry, if any.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Consumes an expiry that has already elapsed but was not observed.
    /// Returns `true` if there was one.
    pub fn drain(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Resolves when the armed deadline passes, disarming the timer.
    ///
    /// Pends forever while disarmed. Cancel safe: dropping the future
    /// before it resolves leaves the timer armed.
    pub async fn expired(&mut self) {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };
        time::sleep_until(deadline).await;
        self.deadline = None;
    }
}

/// The timers of one racer: Fog, Tire Boot and Rear View Mirror.
#[derive(Debug, Default)]
pub struct EffectTimers {
    fog: EffectTimer,
    tire_boot: EffectTimer,
    rear_view_mirror: EffectTimer,
}

impl EffectTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The timer for `kind`, or `None` if `kind` is not timed.
    pub fn get_mut(&mut self, kind: PowerupKind) -> Option<&mut EffectTimer> {
        match kind {
            PowerupKind::Fog => Some(&mut self.fog),
            PowerupKind::TireBoot => Some(&mut self.tire_boot),
            PowerupKind::RearViewMirror => Some(&mut self.rear_view_mirror),
            _ => None,
        }
    }

    /// Resolves with the kind whose timer fires next, disarming it.
    ///
    /// Pends forever while every timer is disarmed.
    pub async fn next_expiry(&mut self) -> PowerupKind {
        let earliest = [
            (PowerupKind::Fog, self.fog.deadline),
            (PowerupKind::TireBoot, self.tire_boot.deadline),
            (PowerupKind::RearViewMirror, self.rear_view_mirror.deadline),
        ]
        .into_iter()
        .filter_map(|(kind, deadline)| deadline.map(|d| (kind, d)))
        .min_by_key(|(_, deadline)| *deadline);

        let Some((kind, _)) = earliest else {
            return std::future::pending().await;
        };
        if let Some(timer) = self.get_mut(kind) {
            timer.expired().await;
        }
        trace!(%kind, "effect timer fired");
        kind
    }
}
