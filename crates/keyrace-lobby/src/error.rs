//! Error types for the lobby layer.

use keyrace_protocol::LobbyId;

/// Errors that can occur when talking to a hub or lobby task.
///
/// Game-level problems (full lobby, invalid purchase, ...) are not errors:
/// they are redirections or silently ignored actions.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    /// The lobby's command channel is closed.
    #[error("lobby {0} is unavailable")]
    Unavailable(LobbyId),

    /// The hub task has stopped.
    #[error("hub is unavailable")]
    HubUnavailable,
}
