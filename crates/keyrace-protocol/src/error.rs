//! Error types for the protocol layer.
//!
//! Each crate in Keyrace defines its own error enum. A `ProtocolError` always
//! means a frame could not be turned into a message (or back), never that
//! the network or a lobby misbehaved.

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame ended before a field could be read.
    ///
    /// `needed` is the size of the field being read, `remaining` what was
    /// left in the buffer at that point.
    #[error("truncated frame: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// The payload was fully decoded but bytes were left over. Declared
    /// lengths must consume the frame exactly.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// The first byte does not name a message of this direction.
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),

    /// A power-up id outside the catalogue.
    #[error("unknown power-up id {0}")]
    UnknownPowerup(u8),

    /// A name or word was not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    /// A value does not fit in its length prefix when encoding.
    #[error("{field} too long: {len} > {max}")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// The message is invalid at the protocol level, e.g. an empty frame.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
