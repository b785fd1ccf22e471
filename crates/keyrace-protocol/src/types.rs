//! Core protocol types for Keyrace's wire format.
//!
//! Every type in this module travels "on the wire": it is what the
//! client and the server exchange, one message per WebSocket frame. The
//! byte layout lives in [`crate::codec`]; here we only describe the shapes.

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's id within a lobby.
///
/// Ids are dense (0, 1, 2, ...) and assigned in registration order, so a
/// single byte is enough on the wire. Two players in different lobbies can
/// share an id; the pair (lobby, player) is what is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u8);

/// `tracing::info!(player_id = %id, ...)` prints "P-2".
impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a lobby (one race room).
///
/// Lobby ids never reach the wire; they exist for logging and for the
/// hub's redirect bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LobbyId(pub u64);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Power-ups
// ---------------------------------------------------------------------------

/// The power-up catalogue.
///
/// The discriminant is the wire id. Decoding any other byte is an error,
/// so an unknown id can never reach game logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PowerupKind {
    /// Appends extra words to the target's sequence.
    SpikeStrip = 0,
    /// Obfuscates the words ahead of the target.
    StickShift = 1,
    /// The target sees only the current word for a while.
    Fog = 2,
    /// Repeats characters in the words ahead of the target.
    IcyRoads = 3,
    /// Locks the target's purchases for a while.
    TireBoot = 4,
    /// Shuffles characters in the words ahead of the target.
    Scrambler = 5,
    /// Reflects the next incoming power-up back at its sender.
    RearViewMirror = 6,
}

impl PowerupKind {
    /// Number of kinds in the catalogue.
    pub const COUNT: usize = 7;

    /// Every kind, in id order.
    pub const ALL: [PowerupKind; Self::COUNT] = [
        PowerupKind::SpikeStrip,
        PowerupKind::StickShift,
        PowerupKind::Fog,
        PowerupKind::IcyRoads,
        PowerupKind::TireBoot,
        PowerupKind::Scrambler,
        PowerupKind::RearViewMirror,
    ];

    /// The wire id.
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Index into per-kind arrays (`[T; PowerupKind::COUNT]`).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Human-readable name, as shown to players.
    pub fn name(self) -> &'static str {
        match self {
            PowerupKind::SpikeStrip => "Spike Strip",
            PowerupKind::StickShift => "Stick Shift",
            PowerupKind::Fog => "Fog",
            PowerupKind::IcyRoads => "Icy Roads",
            PowerupKind::TireBoot => "Tire Boot",
            PowerupKind::Scrambler => "Scrambler",
            PowerupKind::RearViewMirror => "Rear View Mirror",
        }
    }
}

impl TryFrom<u8> for PowerupKind {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        PowerupKind::ALL
            .get(id as usize)
            .copied()
            .ok_or(ProtocolError::UnknownPowerup(id))
    }
}

impl fmt::Display for PowerupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// A registered player as announced to the rest of the lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

// ---------------------------------------------------------------------------
// ClientMessage: client → server
// ---------------------------------------------------------------------------

/// Messages sent by a client.
///
/// The first byte of a frame is the opcode; see [`ClientMessage::opcode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// First frame of every connection: "my display name is ..."
    Register { name: String },

    /// "I typed word number `answer`." Accepted only when it matches the
    /// player's cursor.
    Submission { answer: u32 },

    /// Buy `powerup` and aim it at `affected`. Self-targeted kinds ignore
    /// `affected`.
    PowerupPurchase {
        powerup: PowerupKind,
        affected: PlayerId,
    },

    /// Vote to start the race before the countdown ends.
    SkipWait,

    /// Choose which displayed power-ups this player may buy.
    SelectPowerups { powerups: Vec<PowerupKind> },
}

impl ClientMessage {
    pub const REGISTER: u8 = 0;
    pub const SUBMISSION: u8 = 1;
    pub const POWERUP_PURCHASE: u8 = 2;
    pub const SKIP_WAIT: u8 = 3;
    pub const SELECT_POWERUPS: u8 = 4;

    /// The opcode byte this message is framed with.
    pub fn opcode(&self) -> u8 {
        match self {
            ClientMessage::Register { .. } => Self::REGISTER,
            ClientMessage::Submission { .. } => Self::SUBMISSION,
            ClientMessage::PowerupPurchase { .. } => Self::POWERUP_PURCHASE,
            ClientMessage::SkipWait => Self::SKIP_WAIT,
            ClientMessage::SelectPowerups { .. } => Self::SELECT_POWERUPS,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Register { .. } => "Register",
            ClientMessage::Submission { .. } => "Submission",
            ClientMessage::PowerupPurchase { .. } => "PowerupPurchase",
            ClientMessage::SkipWait => "SkipWait",
            ClientMessage::SelectPowerups { .. } => "SelectPowerups",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: server → client
// ---------------------------------------------------------------------------

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Sent right after a valid `Register`, before the player is seated.
    HubGreeting,

    /// Sent once the player has a seat in a lobby.
    LobbyGreeting {
        /// The id assigned to the receiving player.
        player_id: PlayerId,
        /// Seconds left until the countdown starts the race.
        seconds_remaining: u16,
        /// Everyone seated so far, the receiver included.
        players: Vec<Player>,
        /// The receiver's starting word sequence.
        words: Vec<String>,
        /// The power-ups the receiver may choose from.
        powerups: Vec<PowerupKind>,
    },

    /// Another player took a seat.
    NewRegisteredPlayer(Player),

    /// The race is on; submissions count from now.
    RaceStarted,

    /// A player advanced. `progress` is the number of words completed.
    ProgressUpdate {
        player_id: PlayerId,
        progress: u32,
        wpm: u32,
    },

    /// A player typed their last word. `placement` is 1 for the winner.
    PlayerFinished { player_id: PlayerId, placement: u8 },

    /// The set of power-ups currently affecting a player changed.
    StatusChanged {
        player_id: PlayerId,
        powerups: Vec<PowerupKind>,
    },

    /// Reply to the purchaser of a power-up.
    PurchaseResult { powerup: PowerupKind, success: bool },

    /// The receiver's words from `start` onward were replaced (or, when
    /// `start` equals the old length, appended).
    UpdateWords { start: u32, words: Vec<String> },
}

impl ServerMessage {
    pub const HUB_GREETING: u8 = 0;
    pub const LOBBY_GREETING: u8 = 1;
    pub const NEW_REGISTERED_PLAYER: u8 = 2;
    pub const RACE_STARTED: u8 = 3;
    pub const PROGRESS_UPDATE: u8 = 4;
    pub const PLAYER_FINISHED: u8 = 5;
    pub const STATUS_CHANGED: u8 = 6;
    pub const PURCHASE_RESULT: u8 = 7;
    pub const UPDATE_WORDS: u8 = 8;

    /// The opcode byte this message is framed with.
    pub fn opcode(&self) -> u8 {
        match self {
            ServerMessage::HubGreeting => Self::HUB_GREETING,
            ServerMessage::LobbyGreeting { .. } => Self::LOBBY_GREETING,
            ServerMessage::NewRegisteredPlayer(_) => Self::NEW_REGISTERED_PLAYER,
            ServerMessage::RaceStarted => Self::RACE_STARTED,
            ServerMessage::ProgressUpdate { .. } => Self::PROGRESS_UPDATE,
            ServerMessage::PlayerFinished { .. } => Self::PLAYER_FINISHED,
            ServerMessage::StatusChanged { .. } => Self::STATUS_CHANGED,
            ServerMessage::PurchaseResult { .. } => Self::PURCHASE_RESULT,
            ServerMessage::UpdateWords { .. } => Self::UPDATE_WORDS,
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::HubGreeting => "HubGreeting",
            ServerMessage::LobbyGreeting { .. } => "LobbyGreeting",
            ServerMessage::NewRegisteredPlayer(_) => "NewRegisteredPlayer",
            ServerMessage::RaceStarted => "RaceStarted",
            ServerMessage::ProgressUpdate { .. } => "ProgressUpdate",
            ServerMessage::PlayerFinished { .. } => "PlayerFinished",
            ServerMessage::StatusChanged { .. } => "StatusChanged",
            ServerMessage::PurchaseResult { .. } => "PurchaseResult",
            ServerMessage::UpdateWords { .. } => "UpdateWords",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(3).to_string(), "P-3");
    }

    #[test]
    fn test_lobby_id_display() {
        assert_eq!(LobbyId(12).to_string(), "L-12");
    }

    #[test]
    fn test_powerup_ids_match_catalogue_order() {
        for (i, kind) in PowerupKind::ALL.iter().enumerate() {
            assert_eq!(kind.id() as usize, i);
            assert_eq!(kind.index(), i);
            assert_eq!(PowerupKind::try_from(i as u8), Ok(*kind));
        }
    }

    #[test]
    fn test_powerup_unknown_id_rejected() {
        assert_eq!(
            PowerupKind::try_from(7),
            Err(ProtocolError::UnknownPowerup(7))
        );
        assert_eq!(
            PowerupKind::try_from(255),
            Err(ProtocolError::UnknownPowerup(255))
        );
    }

    #[test]
    fn test_powerup_display_uses_name() {
        assert_eq!(PowerupKind::RearViewMirror.to_string(), "Rear View Mirror");
        assert_eq!(PowerupKind::IcyRoads.to_string(), "Icy Roads");
    }

    #[test]
    fn test_client_opcodes() {
        assert_eq!(ClientMessage::Register { name: "a".into() }.opcode(), 0);
        assert_eq!(ClientMessage::Submission { answer: 0 }.opcode(), 1);
        assert_eq!(
            ClientMessage::PowerupPurchase {
                powerup: PowerupKind::Fog,
                affected: PlayerId(1)
            }
            .opcode(),
            2
        );
        assert_eq!(ClientMessage::SkipWait.opcode(), 3);
        assert_eq!(
            ClientMessage::SelectPowerups { powerups: vec![] }.opcode(),
            4
        );
    }

    #[test]
    fn test_server_opcodes() {
        assert_eq!(ServerMessage::HubGreeting.opcode(), 0);
        assert_eq!(ServerMessage::RaceStarted.opcode(), 3);
        assert_eq!(
            ServerMessage::UpdateWords {
                start: 0,
                words: vec![]
            }
            .opcode(),
            8
        );
    }
}
