// FFmpeg resizer - Rescales whole files before they are queued

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::info;

use crate::error::{SightclipError, SightclipResult};
use crate::ports::VideoResizer;

#[derive(Debug, Clone)]
pub struct FfmpegResizer {
    program: String,
}

impl FfmpegResizer {
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }

    fn args(input: &Path, output: &Path, width: u32, height: u32) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", width, height),
            "-c:a".to_string(),
            "copy".to_string(),
            output.display().to_string(),
        ]
    }
}

impl Default for FfmpegResizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoResizer for FfmpegResizer {
    async fn resize(
        &self,
        input: &Path,
        output: &Path,
        width: u32,
        height: u32,
    ) -> SightclipResult<PathBuf> {
        info!(input = %input.display(), width, height, "Resizing video");
        let status = Command::new(&self.program)
            .args(Self::args(input, output, width, height))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .status()
            .await?;

        if !status.success() {
            // Partial output would be mistaken for a finished resize next run
            let _ = tokio::fs::remove_file(output).await;
            return Err(SightclipError::ProcessFailed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        Ok(output.to_path_buf())
    }
}
