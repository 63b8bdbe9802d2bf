//! Error handling module for Sightclip

use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::errors::DomainError;

/// Main error type for Sightclip operations
#[derive(Error, Debug)]
pub enum SightclipError {
    /// Configuration could not be loaded or validated
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Domain value rejected by validation
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Video source could not be opened
    #[error("Failed to open video source {path}: {message}")]
    SourceOpen { path: String, message: String },

    /// Folder to ingest does not exist
    #[error("Folder not found: {path}")]
    MissingFolder { path: String },

    /// Video decoding failed mid-stream
    #[error("Decode error: {message}")]
    Decode { message: String },

    /// Classifier invocation failed
    #[error("Classifier error: {message}")]
    Classifier { message: String },

    /// Clip or debug encoder failed
    #[error("Clip writer error for {path}: {message}")]
    Sink { path: String, message: String },

    /// External capture or status tool failed
    #[error("Capture error for channel {channel}: {message}")]
    Capture { channel: String, message: String },

    /// External process exited unsuccessfully
    #[error("{program} exited with status {status}")]
    ProcessFailed { program: String, status: String },

    /// Job queue no longer accepts work
    #[error("Job queue is closed")]
    QueueClosed,

    /// A pipeline stage panicked or was cancelled
    #[error("Pipeline stage '{stage}' did not complete: {message}")]
    StageFailed { stage: &'static str, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// FFmpeg error
    #[error("FFmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    /// Malformed JSON from a helper process
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Sightclip operations
pub type SightclipResult<T> = std::result::Result<T, SightclipError>;
