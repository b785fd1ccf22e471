//! Keyrace server binary.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin keyrace-server
//! cargo run --bin keyrace-server -- --bind 0.0.0.0:9000 --config keyrace.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use keyrace::logger::setup_logger;
use keyrace::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "keyrace-server")]
#[command(about = "Multiplayer typing-race server", long_about = None)]
struct Args {
    /// Address to bind the WebSocket listener to (overrides the config file)
    #[arg(short, long)]
    bind: Option<String>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    setup_logger(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), KeyraceError> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    tracing::debug!(?config, "configuration loaded");

    let server = KeyraceServer::builder().config(config).build().await?;
    server.run().await
}
