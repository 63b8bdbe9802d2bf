// Folder ingest - Enqueue every video in a directory

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::scheduler::JobQueue;
use crate::domain::model::VideoRef;
use crate::error::SightclipResult;
use crate::ports::VideoResizer;
use crate::utils::path::list_videos;

/// Target size and the tool used to reach it
pub struct ResizeStep {
    pub resizer: Arc<dyn VideoResizer>,
    pub width: u32,
    pub height: u32,
}

pub struct FolderIngest {
    queue: JobQueue,
    resize: Option<ResizeStep>,
}

impl FolderIngest {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue, resize: None }
    }

    pub fn with_resize(mut self, resize: ResizeStep) -> Self {
        self.resize = Some(resize);
        self
    }

    /// Enqueue the videos of `dir`; returns how many were queued
    pub async fn enqueue(&self, dir: &Path) -> SightclipResult<usize> {
        let videos = list_videos(dir)?;
        info!(folder = %dir.display(), videos = videos.len(), "Scanning folder");

        let mut queued = 0;
        for video in videos {
            let path = match &self.resize {
                Some(step) => match resize_into_tmp(step, dir, &video).await {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(video = %video.display(), error = %e, "Resize failed, skipping video");
                        continue;
                    }
                },
                None => video,
            };

            let slot = self.queue.submit(VideoRef::from_path(path))?;
            queued += 1;
            info!(slot, "Video queued");
        }
        Ok(queued)
    }
}

async fn resize_into_tmp(step: &ResizeStep, dir: &Path, video: &Path) -> SightclipResult<PathBuf> {
    let tmp_dir = dir.join("tmp");
    tokio::fs::create_dir_all(&tmp_dir).await?;

    let file_name = video.file_name().unwrap_or_default();
    let output = tmp_dir.join(file_name);
    if tokio::fs::try_exists(&output).await? {
        info!(video = %output.display(), "Resized copy already present");
        return Ok(output);
    }

    step.resizer
        .resize(video, &output, step.width, step.height)
        .await
}
