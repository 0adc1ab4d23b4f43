//! Stillpoint CLI
//!
//! Runs meditation sessions against the simulated audio backend.

use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stillpoint::cli::commands::{self, PlayOptions};
use stillpoint::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    tracing::info!("Stillpoint v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Play {
            config,
            voice,
            ambient,
            chime,
            sit_secs,
            time_scale,
            fail_sources,
            cancel,
        } => {
            let options = PlayOptions {
                voice,
                ambient,
                chime,
                sit: Duration::from_secs(sit_secs),
                time_scale,
                fail_sources,
                cancel,
            };
            commands::play(config.as_deref(), options).await
        }
        Commands::CheckSource { source } => commands::check_source(&source),
    }
}
