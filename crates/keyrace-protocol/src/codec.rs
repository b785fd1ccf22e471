//! Binary encoding for [`ClientMessage`] and [`ServerMessage`].
//!
//! Every frame is `opcode: u8` followed by the payload. Integers are
//! big-endian. Strings (names, words) carry a `u8` byte-length prefix, lists
//! carry a `u8` count, except the word lists which carry a `u32` count.
//!
//! Decoding reads through a [`ByteReader`] cursor that checks every
//! declared length against what is left in the buffer, then insists that
//! nothing is left over. A malformed frame is rejected as a whole; there is
//! no partially decoded message.
//!
//! ## Example
//!
//! ```rust
//! use keyrace_protocol::{ClientMessage, WireFormat};
//!
//! let msg = ClientMessage::Submission { answer: 2 };
//! let bytes = msg.encode().unwrap();
//! assert_eq!(bytes, [1, 0, 0, 0, 2]);
//! assert_eq!(ClientMessage::decode(&bytes).unwrap(), msg);
//! ```

use crate::types::{ClientMessage, Player, PlayerId, PowerupKind, ServerMessage};
use crate::ProtocolError;

/// A message that has a binary wire representation.
///
/// Both directions implement it, so a test client can speak the same codec
/// as the server.
pub trait WireFormat: Sized {
    /// Serializes the message into one frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::TooLong`] if a string or list does not fit
    /// its length prefix.
    fn encode(&self) -> Result<Vec<u8>, ProtocolError>;

    /// Parses exactly one frame.
    ///
    /// # Errors
    /// Any truncation, trailing byte, unknown opcode or power-up id, or
    /// invalid UTF-8 rejects the frame.
    fn decode(data: &[u8]) -> Result<Self, ProtocolError>;
}

// ---------------------------------------------------------------------------
// ByteWriter
// ---------------------------------------------------------------------------

struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    fn new(opcode: u8) -> Self {
        let mut buf = Vec::with_capacity(16);
        buf.push(opcode);
        Self { buf }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    fn count_u8(&mut self, field: &'static str, len: usize) -> Result<(), ProtocolError> {
        let n = u8::try_from(len).map_err(|_| ProtocolError::TooLong {
            field,
            len,
            max: u8::MAX as usize,
        })?;
        self.u8(n);
        Ok(())
    }

    fn count_u32(&mut self, field: &'static str, len: usize) -> Result<(), ProtocolError> {
        let n = u32::try_from(len).map_err(|_| ProtocolError::TooLong {
            field,
            len,
            max: u32::MAX as usize,
        })?;
        self.u32(n);
        Ok(())
    }

    fn str_u8(&mut self, field: &'static str, s: &str) -> Result<(), ProtocolError> {
        self.count_u8(field, s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    fn player(&mut self, player: &Player) -> Result<(), ProtocolError> {
        self.u8(player.id.0);
        self.str_u8("player name", &player.name)
    }

    fn powerups(&mut self, kinds: &[PowerupKind]) -> Result<(), ProtocolError> {
        self.count_u8("power-up list", kinds.len())?;
        self.buf.extend(kinds.iter().map(|k| k.id()));
        Ok(())
    }

    fn words(&mut self, words: &[String]) -> Result<(), ProtocolError> {
        self.count_u32("word list", words.len())?;
        for word in words {
            self.str_u8("word", word)?;
        }
        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// A bounds-checked cursor over one frame.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if n > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], ProtocolError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, ProtocolError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn str_u8(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let len = self.u8()? as usize;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8 { field })
    }

    fn player_id(&mut self) -> Result<PlayerId, ProtocolError> {
        self.u8().map(PlayerId)
    }

    fn powerup(&mut self) -> Result<PowerupKind, ProtocolError> {
        PowerupKind::try_from(self.u8()?)
    }

    fn player(&mut self) -> Result<Player, ProtocolError> {
        let id = self.player_id()?;
        let name = self.str_u8("player name")?;
        Ok(Player { id, name })
    }

    fn powerups(&mut self) -> Result<Vec<PowerupKind>, ProtocolError> {
        let n = self.u8()? as usize;
        (0..n).map(|_| self.powerup()).collect()
    }

    fn words(&mut self) -> Result<Vec<String>, ProtocolError> {
        let n = self.u32()? as usize;
        // Each word needs at least its length byte, so a count larger than
        // the rest of the frame can be rejected before allocating.
        if n > self.remaining() {
            return Err(ProtocolError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let mut words = Vec::with_capacity(n);
        for _ in 0..n {
            words.push(self.str_u8("word")?);
        }
        Ok(words)
    }

    fn players(&mut self) -> Result<Vec<Player>, ProtocolError> {
        let n = self.u8()? as usize;
        (0..n).map(|_| self.player()).collect()
    }

    /// Fails if any bytes were left unread.
    pub(crate) fn finish(self) -> Result<(), ProtocolError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}

fn opcode(data: &[u8]) -> Result<(u8, ByteReader<'_>), ProtocolError> {
    let (&op, rest) = data
        .split_first()
        .ok_or_else(|| ProtocolError::InvalidMessage("empty frame".into()))?;
    Ok((op, ByteReader::new(rest)))
}

// ---------------------------------------------------------------------------
// ClientMessage
// ---------------------------------------------------------------------------

impl WireFormat for ClientMessage {
    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = ByteWriter::new(self.opcode());
        match self {
            ClientMessage::Register { name } => w.str_u8("player name", name)?,
            ClientMessage::Submission { answer } => w.u32(*answer),
            ClientMessage::PowerupPurchase { powerup, affected } => {
                w.u8(powerup.id());
                w.u8(affected.0);
            }
            ClientMessage::SkipWait => {}
            ClientMessage::SelectPowerups { powerups } => w.powerups(powerups)?,
        }
        Ok(w.finish())
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (op, mut r) = opcode(data)?;
        let msg = match op {
            ClientMessage::REGISTER => ClientMessage::Register {
                name: r.str_u8("player name")?,
            },
            ClientMessage::SUBMISSION => ClientMessage::Submission { answer: r.u32()? },
            ClientMessage::POWERUP_PURCHASE => ClientMessage::PowerupPurchase {
                powerup: r.powerup()?,
                affected: r.player_id()?,
            },
            ClientMessage::SKIP_WAIT => ClientMessage::SkipWait,
            ClientMessage::SELECT_POWERUPS => ClientMessage::SelectPowerups {
                powerups: r.powerups()?,
            },
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        r.finish()?;
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// ServerMessage
// ---------------------------------------------------------------------------

impl WireFormat for ServerMessage {
    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = ByteWriter::new(self.opcode());
        match self {
            ServerMessage::HubGreeting | ServerMessage::RaceStarted => {}
            ServerMessage::LobbyGreeting {
                player_id,
                seconds_remaining,
                players,
                words,
                powerups,
            } => {
                w.u8(player_id.0);
                w.u16(*seconds_remaining);
                w.count_u8("player list", players.len())?;
                for player in players {
                    w.player(player)?;
                }
                w.words(words)?;
                w.powerups(powerups)?;
            }
            ServerMessage::NewRegisteredPlayer(player) => w.player(player)?,
            ServerMessage::ProgressUpdate {
                player_id,
                progress,
                wpm,
            } => {
                w.u8(player_id.0);
                w.u32(*progress);
                w.u32(*wpm);
            }
            ServerMessage::PlayerFinished {
                player_id,
                placement,
            } => {
                w.u8(player_id.0);
                w.u8(*placement);
            }
            ServerMessage::StatusChanged {
                player_id,
                powerups,
            } => {
                w.u8(player_id.0);
                w.powerups(powerups)?;
            }
            ServerMessage::PurchaseResult { powerup, success } => {
                w.u8(powerup.id());
                w.u8(u8::from(*success));
            }
            ServerMessage::UpdateWords { start, words } => {
                w.u32(*start);
                w.words(words)?;
            }
        }
        Ok(w.finish())
    }

    fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        let (op, mut r) = opcode(data)?;
        let msg = match op {
            ServerMessage::HUB_GREETING => ServerMessage::HubGreeting,
            ServerMessage::LOBBY_GREETING => ServerMessage::LobbyGreeting {
                player_id: r.player_id()?,
                seconds_remaining: r.u16()?,
                players: r.players()?,
                words: r.words()?,
                powerups: r.powerups()?,
            },
            ServerMessage::NEW_REGISTERED_PLAYER => {
                ServerMessage::NewRegisteredPlayer(r.player()?)
            }
            ServerMessage::RACE_STARTED => ServerMessage::RaceStarted,
            ServerMessage::PROGRESS_UPDATE => ServerMessage::ProgressUpdate {
                player_id: r.player_id()?,
                progress: r.u32()?,
                wpm: r.u32()?,
            },
            ServerMessage::PLAYER_FINISHED => ServerMessage::PlayerFinished {
                player_id: r.player_id()?,
                placement: r.u8()?,
            },
            ServerMessage::STATUS_CHANGED => ServerMessage::StatusChanged {
                player_id: r.player_id()?,
                powerups: r.powerups()?,
            },
            ServerMessage::PURCHASE_RESULT => ServerMessage::PurchaseResult {
                powerup: r.powerup()?,
                success: match r.u8()? {
                    0 => false,
                    1 => true,
                    other => {
                        return Err(ProtocolError::InvalidMessage(format!(
                            "purchase success flag {other}"
                        )));
                    }
                },
            },
            ServerMessage::UPDATE_WORDS => ServerMessage::UpdateWords {
                start: r.u32()?,
                words: r.words()?,
            },
            other => return Err(ProtocolError::UnknownOpcode(other)),
        };
        r.finish()?;
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
