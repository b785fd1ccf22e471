//! Lobby configuration and state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// SkipWaitPolicy
// ---------------------------------------------------------------------------

/// How many `SkipWait` votes end the countdown early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipWaitPolicy {
    /// Every seated player has voted.
    #[default]
    Unanimous,
    /// Any single vote starts the race.
    FirstVote,
}

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Configuration shared by every lobby the hub opens.
///
/// Missing fields in a config file fall back to [`LobbyConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbyConfig {
    /// Maximum players per lobby.
    pub capacity: usize,

    /// Seconds from lobby creation until the race starts on its own.
    pub countdown_secs: u64,

    /// Seconds from lobby creation during which new players may join.
    pub open_secs: u64,

    /// Number of words in a race.
    pub word_count: usize,

    /// Number of power-ups displayed to each player.
    pub displayed_powerups: usize,

    /// Number of displayed power-ups each player must select.
    pub selectable_powerups: usize,

    /// Quorum for starting the race early.
    pub skip_wait: SkipWaitPolicy,

    /// Start the race as soon as the lobby is full.
    pub start_when_full: bool,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            countdown_secs: 15,
            open_secs: 5,
            word_count: 100,
            displayed_powerups: 4,
            selectable_powerups: 2,
            skip_wait: SkipWaitPolicy::Unanimous,
            start_when_full: false,
        }
    }
}

impl LobbyConfig {
    /// Player ids and counts travel as single bytes.
    pub const MAX_CAPACITY: usize = u8::MAX as usize;

    /// Size of the power-up catalogue.
    pub const MAX_DISPLAYED: usize = keyrace_protocol::PowerupKind::COUNT;

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Rules:
    /// - `capacity` in `1..=MAX_CAPACITY`.
    /// - `open_secs` no longer than `countdown_secs`.
    /// - `word_count` at least 1.
    /// - `displayed_powerups` in `1..=MAX_DISPLAYED`.
    /// - `selectable_powerups` in `1..=displayed_powerups`.
    pub fn validated(mut self) -> Self {
        if !(1..=Self::MAX_CAPACITY).contains(&self.capacity) {
            warn!(capacity = self.capacity, "capacity out of range, clamping");
            self.capacity = self.capacity.clamp(1, Self::MAX_CAPACITY);
        }
        if self.open_secs > self.countdown_secs {
            warn!(
                open_secs = self.open_secs,
                countdown_secs = self.countdown_secs,
                "open window longer than countdown, clamping"
            );
            self.open_secs = self.countdown_secs;
        }
        if self.word_count == 0 {
            warn!("word_count is 0, using 1");
            self.word_count = 1;
        }
        self.displayed_powerups = self.displayed_powerups.clamp(1, Self::MAX_DISPLAYED);
        self.selectable_powerups = self.selectable_powerups.clamp(1, self.displayed_powerups);
        self
    }

    pub fn countdown(&self) -> Duration {
        Duration::from_secs(self.countdown_secs)
    }

    pub fn open_window(&self) -> Duration {
        Duration::from_secs(self.open_secs)
    }
}

// ---------------------------------------------------------------------------
// LobbyState
// ---------------------------------------------------------------------------

/// The lifecycle state of a lobby.
///
/// ```text
/// Waiting → Racing → Closing → Closed
/// ```
///
/// - **Waiting**: seating players, countdown running.
/// - **Racing**: submissions count, power-ups can be bought.
/// - **Closing**: every player finished or left (or the lobby was shut
///   down). Queued registrations are sent back to the hub and remaining
///   connections are closed.
/// - **Closed**: the lobby task has stopped.
///
/// Closing can also be entered straight from Waiting, when a lobby is shut
/// down before its race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LobbyState {
    Waiting,
    Racing,
    Closing,
    Closed,
}

impl LobbyState {
    /// Returns `true` if the lobby may still seat players.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting)
    }

    pub fn is_racing(&self) -> bool {
        matches!(self, Self::Racing)
    }

    /// The next state in the normal lifecycle.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Racing),
            Self::Racing => Some(Self::Closing),
            Self::Closing => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    /// Returns `true` if moving to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (self == Self::Waiting && target == Self::Closing)
    }
}

impl std::fmt::Display for LobbyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Racing => write!(f, "Racing"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: LobbyConfig =
            serde_json::from_str(r#"{ "capacity": 2, "skip_wait": "first_vote" }"#).unwrap();
        assert_eq!(config.capacity, 2);
        assert_eq!(config.skip_wait, SkipWaitPolicy::FirstVote);
        assert_eq!(config.countdown_secs, 15);
        assert_eq!(config.word_count, 100);
        assert!(!config.start_when_full);
    }

    #[test]
    fn test_lobby_state_next_follows_strict_order() {
        assert_eq!(LobbyState::Waiting.next(), Some(LobbyState::Racing));
        assert_eq!(LobbyState::Racing.next(), Some(LobbyState::Closing));
        assert_eq!(LobbyState::Closing.next(), Some(LobbyState::Closed));
        assert_eq!(LobbyState::Closed.next(), None);
    }

    #[test]
    fn test_lobby_state_can_transition_to() {
        assert!(LobbyState::Waiting.can_transition_to(LobbyState::Racing));
        assert!(LobbyState::Waiting.can_transition_to(LobbyState::Closing));
        assert!(!LobbyState::Waiting.can_transition_to(LobbyState::Closed));
        assert!(!LobbyState::Racing.can_transition_to(LobbyState::Waiting));
        assert!(!LobbyState::Closed.can_transition_to(LobbyState::Closing));
    }

    #[test]
    fn test_lobby_state_is_joinable() {
        assert!(LobbyState::Waiting.is_joinable());
        assert!(!LobbyState::Racing.is_joinable());
        assert!(!LobbyState::Closing.is_joinable());
        assert!(!LobbyState::Closed.is_joinable());
    }

    #[test]
    fn test_lobby_state_display() {
        assert_eq!(LobbyState::Waiting.to_string(), "Waiting");
        assert_eq!(LobbyState::Closing.to_string(), "Closing");
    }

    #[test]
    fn test_lobby_config_default() {
        let config = LobbyConfig::default();
        assert_eq!(config.capacity, 4);
        assert_eq!(config.countdown(), Duration::from_secs(15));
        assert_eq!(config.open_window(), Duration::from_secs(5));
        assert_eq!(config.word_count, 100);
        assert_eq!(config.displayed_powerups, 4);
        assert_eq!(config.selectable_powerups, 2);
        assert_eq!(config.skip_wait, SkipWaitPolicy::Unanimous);
        assert!(!config.start_when_full);
    }

    #[test]
    fn test_validated_clamps() {
        let config = LobbyConfig {
            capacity: 0,
            countdown_secs: 3,
            open_secs: 10,
            word_count: 0,
            displayed_powerups: 20,
            selectable_powerups: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(config.capacity, 1);
        assert_eq!(config.open_secs, 3);
        assert_eq!(config.word_count, 1);
        assert_eq!(config.displayed_powerups, 7);
        assert_eq!(config.selectable_powerups, 1);
    }

    #[test]
    fn test_validated_keeps_defaults() {
        assert_eq!(LobbyConfig::default().validated(), LobbyConfig::default());
    }
}
