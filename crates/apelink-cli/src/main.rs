mod manifest;
mod shutdown;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use apelink_core::{EmulatorClient, GameInterface, SessionStore, SyncEngine};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::manifest::ManifestSession;
use crate::shutdown::ShutdownSignal;

#[derive(Parser)]
#[command(name = "apelink")]
#[command(about = "Live-memory bridge to a multiplayer coordination session")]
struct Args {
    /// Emulator memory socket host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Emulator memory socket port
    #[arg(long, default_value_t = apelink_core::DEFAULT_PORT)]
    port: u16,

    /// Session manifest describing the coordination session
    #[arg(short, long, default_value = "session.json")]
    manifest: PathBuf,

    /// Directory for per-seed progress snapshots
    #[arg(short, long, default_value = "sessions")]
    sessions: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("apelink_core=info".parse()?)
                .add_directive("apelink_cli=info".parse()?),
        )
        .init();

    let args = Args::parse();
    info!("apelink {}", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.trigger();
    })?;

    let session = ManifestSession::load(&args.manifest)?;
    let client = EmulatorClient::new(&args.host, args.port)?;
    let game = GameInterface::new(client);
    let store = SessionStore::new(&args.sessions);

    let mut engine = SyncEngine::new(game, session, store);
    engine.run(shutdown.as_ref());

    info!("Shutdown complete");
    Ok(())
}
