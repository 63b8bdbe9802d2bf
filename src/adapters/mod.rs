// Adapters - External system implementations

pub mod command_status;
pub mod ffmpeg_resize;
pub mod ffmpeg_sink;
pub mod ffmpeg_source;
pub mod process_capture;
pub mod process_classifier;
pub mod tracing_log;

// Re-export adapters
pub use command_status::CommandStatusProbe;
pub use ffmpeg_resize::FfmpegResizer;
pub use ffmpeg_sink::FfmpegClipSinkFactory;
pub use ffmpeg_source::FfmpegSourceOpener;
pub use process_capture::CommandCaptureBackend;
pub use process_classifier::ProcessClassifierFactory;
pub use tracing_log::{init_tracing, LogFormat};
