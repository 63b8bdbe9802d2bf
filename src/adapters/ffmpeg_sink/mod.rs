// FFmpeg clip sink - Pipes raw RGB24 frames into an ffmpeg encoder process

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use tracing::debug;

use crate::domain::model::{Frame, VideoInfo};
use crate::error::{SightclipError, SightclipResult};
use crate::ports::{ClipSink, ClipSinkFactory};

/// Frame rate used when the source does not report one
const FALLBACK_FPS: f64 = 30.0;

/// Encodes clips with an external `ffmpeg` binary
#[derive(Debug, Clone)]
pub struct FfmpegClipSinkFactory {
    program: String,
    codec: String,
}

impl FfmpegClipSinkFactory {
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            codec: "libx264".to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn encoder_args(&self, path: &Path, video: &VideoInfo) -> Vec<String> {
        let fps = if video.fps > 0.0 { video.fps } else { FALLBACK_FPS };
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", video.width, video.height),
            "-r".to_string(),
            format!("{:.3}", fps),
            "-i".to_string(),
            "-".to_string(),
            "-c:v".to_string(),
            self.codec.clone(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            path.display().to_string(),
        ]
    }
}

impl Default for FfmpegClipSinkFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipSinkFactory for FfmpegClipSinkFactory {
    fn create(&self, path: &Path, video: &VideoInfo) -> SightclipResult<Box<dyn ClipSink>> {
        let args = self.encoder_args(path, video);
        debug!(program = %self.program, ?args, "Starting clip encoder");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SightclipError::Sink {
                path: path.display().to_string(),
                message: format!("failed to start {}: {}", self.program, e),
            })?;

        let stdin = child.stdin.take().ok_or_else(|| SightclipError::Sink {
            path: path.display().to_string(),
            message: "encoder stdin unavailable".to_string(),
        })?;

        Ok(Box::new(FfmpegClipSink {
            program: self.program.clone(),
            path: path.to_path_buf(),
            width: video.width,
            height: video.height,
            child,
            stdin: Some(stdin),
        }))
    }
}

pub struct FfmpegClipSink {
    program: String,
    path: PathBuf,
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<ChildStdin>,
}

impl FfmpegClipSink {
    fn sink_error(&self, message: impl Into<String>) -> SightclipError {
        SightclipError::Sink {
            path: self.path.display().to_string(),
            message: message.into(),
        }
    }
}

impl ClipSink for FfmpegClipSink {
    fn write_frame(&mut self, frame: &Frame) -> SightclipResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(self.sink_error(format!(
                "frame {} is {}x{}, clip is {}x{}",
                frame.index,
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.sink_error("encoder input already closed"));
        };
        if let Err(e) = stdin.write_all(frame.as_bytes()) {
            return Err(self.sink_error(format!("encoder rejected frame {}: {}", frame.index, e)));
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> SightclipResult<()> {
        // Closing stdin signals end of input
        drop(self.stdin.take());
        let status = self.child.wait()?;
        if !status.success() {
            return Err(SightclipError::ProcessFailed {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }
        debug!(path = %self.path.display(), "Clip encoded");
        Ok(())
    }
}

impl Drop for FfmpegClipSink {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            // Abandoned without finish; do not leave the encoder running
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
