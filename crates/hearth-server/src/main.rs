//! Server entry point: configuration, logging, the accept loop, and the
//! ctrl-c handler.
//!
//! Exit codes: 0 for a normal shutdown, 1 for a fatal initialisation
//! failure (bad configuration or a port that cannot be bound).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hearth_server::net::{Collaborators, Server};
use hearth_server::ServerConfig;

#[derive(Debug, Parser)]
#[command(name = "hearth-server", about = "A Minecraft Java Edition server (protocol 754)")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "hearth.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Structured logging; level overridden by RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match ServerConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("cannot load configuration from {}: {e}", args.config.display());
            return ExitCode::FAILURE;
        }
    };
    info!(
        port = config.port,
        online_mode = config.online_mode,
        max_players = config.max_players,
        "starting"
    );

    let server = match Server::bind(config, Collaborators::default()).await {
        Ok(server) => server,
        Err(e) => {
            error!("initialisation failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received");
            shutdown.shutdown();
        }
    });

    match server.run().await {
        Ok(()) => {
            info!("stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("server failed: {e}");
            ExitCode::FAILURE
        }
    }
}
