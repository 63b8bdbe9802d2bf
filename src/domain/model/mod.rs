// Domain models - Core types and data structures

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;

use crate::domain::errors::DomainError;

/// Classifier class identifier
pub type ClassId = u32;

/// A decoded video frame with its position in the source
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

/// Shared handle to a frame; buffers and queues hold these instead of pixel copies
pub type SharedFrame = Arc<Frame>;

impl Frame {
    /// Create a frame from an existing image
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Create a frame from packed RGB24 pixels
    pub fn from_rgb(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DomainError> {
        let expected = width as usize * height as usize * 3;
        let actual = pixels.len();
        let image = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            DomainError::InvalidFrame(format!(
                "frame {} has {} bytes, expected {} for {}x{}",
                index, actual, expected, width, height
            ))
        })?;
        Ok(Self { index, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Packed RGB24 pixel data
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Stream metadata reported by a frame source
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Total frame count as reported by the container; 0 when unknown
    pub total_frames: u64,
}

impl VideoInfo {
    pub fn new(width: u32, height: u32, fps: f64, total_frames: u64) -> Result<Self, DomainError> {
        if width == 0 || height == 0 {
            return Err(DomainError::BadArgs(format!(
                "Video dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            fps,
            total_frames,
        })
    }

    /// Convert a frame index to seconds; 0 when the frame rate is unknown
    pub fn seconds_at(&self, frame_index: u64) -> f64 {
        if self.fps > 0.0 {
            frame_index as f64 / self.fps
        } else {
            0.0
        }
    }
}

/// Axis-aligned box in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

/// One classifier hit on one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub class_id: ClassId,
    pub confidence: f32,
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    pub fn new(class_id: ClassId, confidence: f32) -> Self {
        Self {
            class_id,
            confidence,
            bbox: None,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }
}

/// Class name table supplied by the classifier
#[derive(Debug, Clone, Default)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Resolve a class id, falling back to a placeholder for ids outside the table
    pub fn name(&self, class_id: ClassId) -> String {
        self.names
            .get(class_id as usize)
            .cloned()
            .unwrap_or_else(|| format!("unknown-{}", class_id))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Confidence cutoffs, global default plus per-class overrides by name
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidencePolicy {
    pub default_threshold: f32,
    pub overrides: HashMap<String, f32>,
}

impl ConfidencePolicy {
    pub fn new(default_threshold: f32, overrides: HashMap<String, f32>) -> Self {
        Self {
            default_threshold,
            overrides,
        }
    }

    pub fn threshold_for(&self, class_name: &str) -> f32 {
        self.overrides
            .get(class_name)
            .copied()
            .unwrap_or(self.default_threshold)
    }

    pub fn accepts(&self, class_name: &str, confidence: f32) -> bool {
        confidence >= self.threshold_for(class_name)
    }
}

/// Per-channel lifecycle state for live sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Idle,
    Recording,
    QueuedForInference,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelState::Idle => write!(f, "idle"),
            ChannelState::Recording => write!(f, "recording"),
            ChannelState::QueuedForInference => write!(f, "queued-for-inference"),
        }
    }
}

/// Stream status reported by a status probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Online,
    Offline,
}

/// Identifies a video to process
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRef {
    pub path: PathBuf,
    pub source_dir: PathBuf,
}

impl VideoRef {
    /// Reference a video, taking its parent directory as the source directory
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { path, source_dir }
    }

    /// File name without extension, used to name every output of this video
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string())
    }
}
