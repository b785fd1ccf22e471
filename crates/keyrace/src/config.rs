//! Server configuration, loaded from an optional JSON file.

use std::path::{Path, PathBuf};

use keyrace_lobby::LobbyConfig;
use serde::{Deserialize, Serialize};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";

/// Errors from loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Everything the server binary can be configured with.
///
/// Missing fields fall back to [`ServerConfig::default`], so an empty
/// object `{}` is a valid config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,

    /// Settings shared by every lobby.
    pub lobby: LobbyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            lobby: LobbyConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads and parses the JSON config at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
