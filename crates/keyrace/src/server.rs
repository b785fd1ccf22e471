//! `KeyraceServer` builder and accept loop.
//!
//! This is the entry point for running a Keyrace server. It ties together
//! the layers: transport → handshake → hub → lobby.

use std::sync::Arc;

use keyrace_lobby::{spawn_hub, HubHandle, LobbyConfig};
use keyrace_powerup::{CorpusWords, WordSource};
use keyrace_transport::{Transport, WebSocketReader, WebSocketTransport};

use crate::config::{ServerConfig, DEFAULT_BIND};
use crate::handler::handle_incoming;
use crate::KeyraceError;

/// Builder for configuring and starting a Keyrace server.
///
/// # Example
///
/// ```rust,ignore
/// use keyrace::prelude::*;
///
/// let server = KeyraceServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct KeyraceServerBuilder {
    bind_addr: String,
    lobby_config: LobbyConfig,
    words: Option<Arc<dyn WordSource>>,
}

impl KeyraceServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            lobby_config: LobbyConfig::default(),
            words: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration shared by every lobby.
    pub fn lobby_config(mut self, config: LobbyConfig) -> Self {
        self.lobby_config = config;
        self
    }

    /// Applies a loaded [`ServerConfig`].
    pub fn config(self, config: ServerConfig) -> Self {
        self.bind(&config.bind).lobby_config(config.lobby)
    }

    /// Sets where race words come from. Defaults to
    /// [`CorpusWords::english`].
    pub fn words(mut self, words: impl WordSource) -> Self {
        self.words = Some(Arc::new(words));
        self
    }

    /// Binds the listener and starts the hub.
    pub async fn build(self) -> Result<KeyraceServer, KeyraceError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let words = self
            .words
            .unwrap_or_else(|| Arc::new(CorpusWords::english()));
        let hub = spawn_hub(self.lobby_config, words);

        Ok(KeyraceServer { transport, hub })
    }
}

impl Default for KeyraceServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Keyrace server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KeyraceServer {
    transport: WebSocketTransport,
    hub: HubHandle<WebSocketReader>,
}

impl KeyraceServer {
    /// Creates a new builder.
    pub fn builder() -> KeyraceServerBuilder {
        KeyraceServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Spawns a task per accepted socket that runs the WebSocket upgrade and
    /// the Register handshake. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), KeyraceError> {
        if let Ok(addr) = self.local_addr() {
            tracing::info!(%addr, "keyrace server running");
        }

        loop {
            match self.transport.accept().await {
                Ok(incoming) => {
                    let hub = self.hub.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_incoming(incoming, hub).await {
                            tracing::debug!(error = %e, "connection dropped during handshake");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
