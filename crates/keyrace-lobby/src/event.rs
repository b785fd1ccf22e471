//! Internal messages between client actors and their lobby.

use keyrace_protocol::{PlayerId, PowerupKind};

/// An event a client's state handler reports to its lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ClientEvent {
    /// The player voted to skip the countdown.
    SkipWait { id: PlayerId },

    /// The player completed a word.
    ProgressUpdate {
        id: PlayerId,
        progress: u32,
        wpm: u32,
    },

    /// The player completed their last word.
    Finished { id: PlayerId },

    /// `from` bought `powerup` against `affected`.
    ApplyStatusEffect {
        from: PlayerId,
        affected: PlayerId,
        powerup: PowerupKind,
    },

    /// The set of effects on the player changed.
    StatusChanged {
        id: PlayerId,
        powerups: Vec<PowerupKind>,
    },
}

/// A power-up routed by the lobby to the affected player's state handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct IncomingEffect {
    pub from: PlayerId,
    pub powerup: PowerupKind,
}
