//! Logging setup for the server binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CRATES: &[&str] = &[
    "keyrace",
    "keyrace_server",
    "keyrace_transport",
    "keyrace_protocol",
    "keyrace_powerup",
    "keyrace_lobby",
];

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` overrides the filter; otherwise every keyrace crate logs at
/// `default_level`.
pub fn setup_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                CRATES
                    .iter()
                    .map(|krate| format!("{krate}={default_level}"))
                    .collect::<Vec<_>>()
                    .join(",")
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
