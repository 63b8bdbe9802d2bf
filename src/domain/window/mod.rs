// Detection windows - Per-class presence tracking over sampled ticks
//
// A window opens on the first positive sample for a class and stays open while
// its grace budget is positive. Every sampled tick while open leaves one mark,
// so the detection percentage of a closed window is the share of sampled ticks
// that actually saw the class.

use std::collections::BTreeMap;

use crate::domain::errors::DomainError;
use crate::domain::model::{ClassId, VideoInfo};

/// Sampling and closing parameters shared by every window of one pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    /// Frame stride between classifier invocations
    pub check_interval: u64,
    /// Sampled intervals a window survives without a detection
    pub grace_period: u64,
    /// Minimum detection percentage for a window to be saved
    pub min_detect_percent: f64,
}

impl TrackerSettings {
    pub fn new(
        check_interval: u64,
        grace_period: u64,
        min_detect_percent: f64,
    ) -> Result<Self, DomainError> {
        if check_interval == 0 {
            return Err(DomainError::InvalidSettings(
                "check interval must be positive".to_string(),
            ));
        }
        if grace_period == 0 {
            return Err(DomainError::InvalidSettings(
                "grace period must be at least one sampled interval".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&min_detect_percent) {
            return Err(DomainError::InvalidSettings(format!(
                "minimum detection percentage {} is outside 0..=1",
                min_detect_percent
            )));
        }
        Ok(Self {
            check_interval,
            grace_period,
            min_detect_percent,
        })
    }

    /// Whether the classifier runs on this frame
    pub fn is_sampled(&self, frame_index: u64) -> bool {
        frame_index % self.check_interval == 0
    }

    /// Grace budget granted by each positive sample, in frames
    pub fn grace_budget(&self) -> u64 {
        self.grace_period * self.check_interval
    }
}

/// One sampled tick inside a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mark {
    /// The class was present on this frame
    Detected(u64),
    /// Sampled during grace without a detection
    Absent,
}

/// What one tick says about one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// The classifier did not run on this frame
    Skipped,
    /// The classifier ran and did not report the class above threshold
    Absent,
    /// The classifier reported the class with this confidence
    Present(f32),
}

/// Presence state machine for a single class
#[derive(Debug, Clone)]
pub struct DetectionWindow {
    class_id: ClassId,
    marks: Vec<Mark>,
    grace_remaining: u64,
    confidences: Vec<f32>,
    active: bool,
}

impl DetectionWindow {
    pub fn new(class_id: ClassId) -> Self {
        Self {
            class_id,
            marks: Vec::new(),
            grace_remaining: 0,
            confidences: Vec::new(),
            active: false,
        }
    }

    /// Feed one tick; returns the closed window when the grace budget runs out on this tick
    pub fn observe(
        &mut self,
        frame_index: u64,
        sample: Sample,
        settings: &TrackerSettings,
    ) -> Option<ClosedWindow> {
        match sample {
            Sample::Skipped => return None,
            Sample::Present(confidence) => {
                self.marks.push(Mark::Detected(frame_index));
                self.grace_remaining = settings.grace_budget();
                self.confidences.push(confidence);
            }
            Sample::Absent if self.grace_remaining > 0 => {
                self.marks.push(Mark::Absent);
                self.grace_remaining = self.grace_remaining.saturating_sub(settings.check_interval);
            }
            Sample::Absent => {
                self.grace_remaining = 0;
            }
        }

        let was_active = self.active;
        self.active = self.grace_remaining > 0;
        if was_active && !self.active {
            Some(self.take_closed(frame_index))
        } else {
            None
        }
    }

    /// Close an open window regardless of its remaining grace (end of stream)
    pub fn force_close(&mut self, frame_index: u64) -> Option<ClosedWindow> {
        if !self.active {
            return None;
        }
        self.active = false;
        self.grace_remaining = 0;
        Some(self.take_closed(frame_index))
    }

    fn take_closed(&mut self, frame_index: u64) -> ClosedWindow {
        ClosedWindow {
            class_id: self.class_id,
            marks: std::mem::take(&mut self.marks),
            confidences: std::mem::take(&mut self.confidences),
            closed_at: frame_index,
        }
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn grace_remaining(&self) -> u64 {
        self.grace_remaining
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn confidences(&self) -> &[f32] {
        &self.confidences
    }
}

/// Everything a window accrued between opening and closing
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedWindow {
    pub class_id: ClassId,
    pub marks: Vec<Mark>,
    pub confidences: Vec<f32>,
    pub closed_at: u64,
}

impl ClosedWindow {
    /// Number of marks that are real detections
    pub fn detections(&self) -> usize {
        self.marks
            .iter()
            .filter(|mark| matches!(mark, Mark::Detected(_)))
            .count()
    }

    /// Number of sampled ticks the window spanned
    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn detection_percentage(&self) -> f64 {
        self.detections() as f64 / self.marks.len().max(1) as f64
    }

    /// Last frame with a real detection, or the closing frame when there is none
    pub fn last_valid_frame(&self) -> u64 {
        self.marks
            .iter()
            .filter_map(|mark| match mark {
                Mark::Detected(index) => Some(*index),
                Mark::Absent => None,
            })
            .max()
            .unwrap_or(self.closed_at)
    }

    pub fn is_saved(&self, min_detect_percent: f64) -> bool {
        self.detection_percentage() >= min_detect_percent
    }

    pub fn confidence_stats(&self) -> ConfidenceStats {
        ConfidenceStats::from_samples(&self.confidences)
    }
}

/// Mean, median and peak of a window's confidence samples
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfidenceStats {
    pub mean: f64,
    pub median: f64,
    pub peak: f64,
}

impl ConfidenceStats {
    /// All three are zero for an empty sample set
    pub fn from_samples(samples: &[f32]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<f64> = samples.iter().map(|&value| value as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            sorted[count / 2]
        } else {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        };
        let peak = sorted[count - 1];

        Self { mean, median, peak }
    }
}

/// Report for one closed window, as written to the per-video log
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSummary {
    pub class_name: String,
    pub timestamp_secs: f64,
    pub frame_count: usize,
    pub window_length: usize,
    pub detection_percentage: f64,
    pub confidence: ConfidenceStats,
    pub saved: bool,
    pub buffered_frames: usize,
}

impl WindowSummary {
    pub fn from_closed(
        closed: &ClosedWindow,
        class_name: impl Into<String>,
        video: &VideoInfo,
        min_detect_percent: f64,
        buffered_frames: usize,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            timestamp_secs: video.seconds_at(closed.last_valid_frame()),
            frame_count: closed.detections(),
            window_length: closed.len(),
            detection_percentage: closed.detection_percentage(),
            confidence: closed.confidence_stats(),
            saved: closed.is_saved(min_detect_percent),
            buffered_frames,
        }
    }
}

/// All windows of one pipeline, keyed by class
#[derive(Debug, Clone)]
pub struct WindowTracker {
    settings: TrackerSettings,
    windows: BTreeMap<ClassId, DetectionWindow>,
}

impl WindowTracker {
    pub fn new(settings: TrackerSettings) -> Self {
        Self {
            settings,
            windows: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Advance every window by one tick.
    ///
    /// `samples` maps each class reported on this tick to its confidence. Windows
    /// are created lazily for newly reported classes; every known class receives
    /// an observation. Non-sampled ticks leave all windows untouched.
    pub fn observe(
        &mut self,
        frame_index: u64,
        sampled: bool,
        samples: &BTreeMap<ClassId, f32>,
    ) -> Vec<ClosedWindow> {
        if !sampled {
            return Vec::new();
        }

        for &class_id in samples.keys() {
            self.windows
                .entry(class_id)
                .or_insert_with(|| DetectionWindow::new(class_id));
        }

        let mut closed = Vec::new();
        for (class_id, window) in self.windows.iter_mut() {
            let sample = samples
                .get(class_id)
                .map_or(Sample::Absent, |&confidence| Sample::Present(confidence));
            if let Some(window) = window.observe(frame_index, sample, &self.settings) {
                closed.push(window);
            }
        }
        closed
    }

    /// Force-close every open window; each closes at most once
    pub fn close_all(&mut self, frame_index: u64) -> Vec<ClosedWindow> {
        self.windows
            .values_mut()
            .filter_map(|window| window.force_close(frame_index))
            .collect()
    }

    pub fn is_active(&self, class_id: ClassId) -> bool {
        self.windows
            .get(&class_id)
            .map_or(false, DetectionWindow::is_active)
    }

    pub fn active_classes(&self) -> Vec<ClassId> {
        self.windows
            .values()
            .filter(|window| window.is_active())
            .map(DetectionWindow::class_id)
            .collect()
    }

    pub fn window(&self, class_id: ClassId) -> Option<&DetectionWindow> {
        self.windows.get(&class_id)
    }
}

#[cfg(test)]
mod tests;
