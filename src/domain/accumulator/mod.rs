// Frame accumulator - Per-class frame buffers for open detection windows

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::model::{ClassId, SharedFrame};

/// Holds the frames of every open window until that window closes.
///
/// Buffers store shared handles, so a frame seen while several classes are
/// active is kept once in memory.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buffers: HashMap<ClassId, Vec<SharedFrame>>,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame to the buffer of each listed class
    pub fn push(&mut self, frame: &SharedFrame, classes: &[ClassId]) {
        for &class_id in classes {
            self.buffers
                .entry(class_id)
                .or_default()
                .push(Arc::clone(frame));
        }
    }

    /// Take and clear the buffer of one class
    pub fn take(&mut self, class_id: ClassId) -> Vec<SharedFrame> {
        self.buffers.remove(&class_id).unwrap_or_default()
    }

    /// Number of frames buffered for one class
    pub fn len(&self, class_id: ClassId) -> usize {
        self.buffers.get(&class_id).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Frame;
    use image::RgbImage;

    fn frame(index: u64) -> SharedFrame {
        Arc::new(Frame::new(index, RgbImage::new(2, 2)))
    }

    #[test]
    fn test_push_shares_frames_between_classes() {
        let mut accumulator = FrameAccumulator::new();
        let shared = frame(3);

        accumulator.push(&shared, &[1, 2]);
        assert_eq!(accumulator.len(1), 1);
        assert_eq!(accumulator.len(2), 1);
        // Two buffers plus the local handle
        assert_eq!(Arc::strong_count(&shared), 3);
    }

    #[test]
    fn test_take_clears_buffer() {
        let mut accumulator = FrameAccumulator::new();
        for index in 0..4 {
            accumulator.push(&frame(index), &[7]);
        }

        let frames = accumulator.take(7);
        let indices: Vec<u64> = frames.iter().map(|frame| frame.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(accumulator.len(7), 0);
        assert!(accumulator.take(7).is_empty());
        assert!(accumulator.is_empty());
    }

    #[test]
    fn test_push_with_no_classes_is_noop() {
        let mut accumulator = FrameAccumulator::new();
        accumulator.push(&frame(0), &[]);
        assert!(accumulator.is_empty());
    }
}
