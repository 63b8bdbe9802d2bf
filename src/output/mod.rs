//! Output layout and per-video window logs
//!
//! Every processed video gets its own directory under the output root:
//!
//! ```text
//! {output_dir}/{stem}/{class}-{stem}.{ext}
//! {output_dir}/{stem}/debug/{stem}.log
//! {output_dir}/{stem}/debug/{stem}-debug.{ext}
//! ```

use std::io;
use std::path::{Path, PathBuf};

pub mod window_log;

pub use window_log::WindowLog;

/// Paths of every output produced for one video
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLayout {
    video_dir: PathBuf,
    stem: String,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, stem: &str) -> Self {
        Self {
            video_dir: output_dir.join(stem),
            stem: stem.to_string(),
        }
    }

    /// Directory holding the clips
    pub fn video_dir(&self) -> &Path {
        &self.video_dir
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.video_dir.join("debug")
    }

    pub fn log_path(&self) -> PathBuf {
        self.debug_dir().join(format!("{}.log", self.stem))
    }

    pub fn debug_video_path(&self, extension: &str) -> PathBuf {
        self.debug_dir()
            .join(format!("{}-debug.{}", self.stem, extension))
    }

    pub fn clip_path(&self, class_name: &str, extension: &str) -> PathBuf {
        self.video_dir
            .join(format!("{}-{}.{}", class_name, self.stem, extension))
    }

    /// Create the video and debug directories
    pub fn create_dirs(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.debug_dir())
    }
}
