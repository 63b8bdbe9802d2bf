//! Command implementations

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::{AppContainer, DefaultAppContainer, SchedulerHandle};
use crate::cli::args::{FolderArgs, ProcessArgs};
use crate::config::AppConfig;
use crate::domain::model::VideoRef;

/// Execute the process command
pub async fn process(config: AppConfig, args: ProcessArgs) -> Result<()> {
    let container = DefaultAppContainer::new(config).context("Failed to initialise pipeline")?;
    let (queue, handle) = container.spawn_scheduler();

    for file in args.files {
        if !file.is_file() {
            warn!(path = %file.display(), "Input file does not exist, skipping");
            continue;
        }
        let slot = queue
            .submit(VideoRef::from_path(&file))
            .context("Failed to queue video")?;
        info!(slot, path = %file.display(), "Video queued");
    }
    drop(queue);

    drain(handle).await
}

/// Execute the folder command
pub async fn folder(config: AppConfig, args: FolderArgs) -> Result<()> {
    let container = DefaultAppContainer::new(config).context("Failed to initialise pipeline")?;
    let (queue, handle) = container.spawn_scheduler();

    let ingest = container.folder_ingest(queue);
    let queued = ingest
        .enqueue(&args.dir)
        .await
        .with_context(|| format!("Failed to ingest folder {}", args.dir.display()))?;
    info!(folder = %args.dir.display(), queued, "Folder ingested");
    drop(ingest);

    drain(handle).await
}

/// Execute the watch command; returns after Ctrl-C once queued jobs finish
pub async fn watch(config: AppConfig, cancel: CancellationToken) -> Result<()> {
    if config.live.channels.is_empty() {
        anyhow::bail!("No channels configured under [live]");
    }

    let container = DefaultAppContainer::new(config).context("Failed to initialise pipeline")?;
    let (queue, handle) = container.spawn_scheduler();

    let manager = container.live_manager(queue);
    manager.run(cancel).await;

    drain(handle).await
}

/// Execute the check-config command
pub fn check_config(config: &AppConfig) -> Result<String> {
    config.validate().context("Configuration is invalid")?;
    let rendered = config
        .to_toml_string()
        .context("Failed to render configuration")?;
    Ok(rendered)
}

async fn drain(handle: SchedulerHandle) -> Result<()> {
    let stats = handle.wait().await.context("Scheduler stopped unexpectedly")?;
    info!(completed = stats.completed, failed = stats.failed, "All jobs finished");
    if stats.failed > 0 {
        warn!(failed = stats.failed, "Some videos failed to process");
    }
    Ok(())
}
