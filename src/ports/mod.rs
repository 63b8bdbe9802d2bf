// Ports - Interface definitions (contracts)
//
// Frame decoding, classification and clip encoding are blocking and run on the
// pipeline's worker threads. Stream status and capture are async and live on the
// runtime.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::model::*;
use crate::error::SightclipResult;

/// Ordered, finite sequence of decoded frames
pub trait FrameSource: Send {
    fn info(&self) -> &VideoInfo;

    /// Next frame in source order; `Ok(None)` at end of stream
    fn next_frame(&mut self) -> SightclipResult<Option<Frame>>;
}

/// Opens frame sources for video files
pub trait SourceOpener: Send + Sync {
    fn open(&self, path: &Path) -> SightclipResult<Box<dyn FrameSource>>;
}

/// Per-frame object classifier
pub trait Classifier: Send {
    /// Class name table used to resolve detection ids
    fn class_names(&self) -> &ClassNames;

    /// Classify one frame; may fail per call without poisoning later calls
    fn classify(&mut self, frame: &Frame) -> SightclipResult<Vec<Detection>>;
}

/// Creates one classifier instance per job
pub trait ClassifierFactory: Send + Sync {
    fn create(&self) -> SightclipResult<Box<dyn Classifier>>;
}

/// Destination for the frames of one clip
pub trait ClipSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> SightclipResult<()>;

    /// Flush and close the clip
    fn finish(self: Box<Self>) -> SightclipResult<()>;
}

/// Creates clip sinks at a given path
pub trait ClipSinkFactory: Send + Sync {
    fn create(&self, path: &Path, video: &VideoInfo) -> SightclipResult<Box<dyn ClipSink>>;
}

/// Reports whether a live channel is currently broadcasting
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn status(&self, channel: &str) -> SightclipResult<StreamStatus>;
}

/// How a capture process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureExit {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

/// Starts recordings of live channels
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    async fn start(&self, channel: &str, output: &Path) -> SightclipResult<Box<dyn CaptureSession>>;
}

/// A running recording
#[async_trait]
pub trait CaptureSession: Send {
    fn output_path(&self) -> &Path;

    /// Ask the capture to stop gracefully
    fn interrupt(&mut self) -> SightclipResult<()>;

    /// Wait for the capture to exit
    async fn wait(&mut self) -> SightclipResult<CaptureExit>;

    /// Terminate the capture forcibly and reap it
    async fn kill(&mut self) -> SightclipResult<()>;

    /// Exit status if the capture has already ended, without blocking
    fn try_exit(&mut self) -> SightclipResult<Option<CaptureExit>>;
}

/// Rescales a video file before processing
#[async_trait]
pub trait VideoResizer: Send + Sync {
    /// Scale `input` to `width`x`height`, writing `output`
    async fn resize(&self, input: &Path, output: &Path, width: u32, height: u32)
        -> SightclipResult<PathBuf>;
}
