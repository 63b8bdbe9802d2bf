//! Sightclip CLI
//!
//! Clips videos and live streams wherever a classifier sees objects.
//!
//! # Usage
//!
//! ```bash
//! sightclip process match.mp4 stream.mkv
//! sightclip folder ./recordings
//! sightclip --config live.toml watch
//! sightclip check-config
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sightclip::adapters::init_tracing;
use sightclip::cli::{commands, Cli, Commands};
use sightclip::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let config = AppConfig::load(&cli.config)
        .and_then(|config| config.with_overrides(cli.output_dir.clone(), cli.max_jobs))
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    let result = match cli.command {
        Commands::Process(args) => commands::process(config, args).await,
        Commands::Folder(args) => commands::folder(config, args).await,
        Commands::Watch => {
            let cancel = CancellationToken::new();
            let signal = cancel.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Interrupt received, shutting down");
                        signal.cancel();
                    }
                    Err(e) => error!(error = %e, "Cannot listen for Ctrl-C"),
                }
            });
            commands::watch(config, cancel).await
        }
        Commands::CheckConfig => commands::check_config(&config).map(|rendered| {
            println!("{}", rendered);
        }),
    };

    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "Command failed");
    }
    result
}
