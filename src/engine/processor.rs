//! Processing stage: classification, window tracking and clip selection

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::accumulator::FrameAccumulator;
use crate::domain::model::*;
use crate::domain::window::{ClosedWindow, WindowSummary, WindowTracker};
use crate::engine::annotate::annotate;
use crate::engine::progress::ProgressTracker;
use crate::output::WindowLog;
use crate::ports::{Classifier, ClipSink};

/// A frame destined for one class's clip
#[derive(Debug, Clone)]
pub struct ClipFrame {
    pub class_name: String,
    pub frame: SharedFrame,
}

/// Where the frames of saved windows go
pub trait ClipForward {
    /// Hand over the frames of one saved window; false once the receiver is gone
    fn forward(&mut self, class_name: &str, frames: Vec<SharedFrame>) -> bool;
}

impl ClipForward for mpsc::Sender<ClipFrame> {
    fn forward(&mut self, class_name: &str, frames: Vec<SharedFrame>) -> bool {
        for frame in frames {
            let item = ClipFrame {
                class_name: class_name.to_string(),
                frame,
            };
            if self.blocking_send(item).is_err() {
                return false;
            }
        }
        true
    }
}

impl ClipForward for Vec<ClipFrame> {
    fn forward(&mut self, class_name: &str, frames: Vec<SharedFrame>) -> bool {
        self.extend(frames.into_iter().map(|frame| ClipFrame {
            class_name: class_name.to_string(),
            frame,
        }));
        true
    }
}

/// Reduce raw detections to one sample per class.
///
/// Detections under the class's threshold are dropped; when a class appears
/// several times the highest confidence wins.
pub fn collect_samples(
    detections: &[Detection],
    names: &ClassNames,
    policy: &ConfidencePolicy,
) -> BTreeMap<ClassId, f32> {
    let mut samples: BTreeMap<ClassId, f32> = BTreeMap::new();
    for detection in detections {
        let name = names.name(detection.class_id);
        if !policy.accepts(&name, detection.confidence) {
            continue;
        }
        samples
            .entry(detection.class_id)
            .and_modify(|best| *best = best.max(detection.confidence))
            .or_insert(detection.confidence);
    }
    samples
}

/// Counters for one processed video
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessorStats {
    pub frames: u64,
    pub sampled: u64,
    pub classifier_errors: u64,
    pub windows_closed: usize,
    pub windows_saved: usize,
    pub windows_logged: usize,
}

/// Sink writing annotated frames for inspection
pub type DebugSink = Box<dyn ClipSink>;

/// Result of draining the processing stage
pub struct ProcessorOutcome {
    pub stats: ProcessorStats,
    /// Returned unfinished so it can be closed after the clip writer drains
    pub debug_sink: Option<DebugSink>,
}

/// Per-frame state machine of one pipeline
pub struct FrameProcessor<F: ClipForward> {
    classifier: Box<dyn Classifier>,
    names: ClassNames,
    policy: ConfidencePolicy,
    tracker: WindowTracker,
    accumulator: FrameAccumulator,
    video: VideoInfo,
    log: Option<WindowLog<Box<dyn Write + Send>>>,
    debug_sink: Option<DebugSink>,
    forward: F,
    forward_open: bool,
    progress: Option<ProgressTracker>,
    last_detections: Vec<Detection>,
    last_index: Option<u64>,
    stats: ProcessorStats,
}

impl<F: ClipForward> FrameProcessor<F> {
    pub fn new(
        classifier: Box<dyn Classifier>,
        tracker: WindowTracker,
        policy: ConfidencePolicy,
        video: VideoInfo,
        forward: F,
    ) -> Self {
        let names = classifier.class_names().clone();
        Self {
            classifier,
            names,
            policy,
            tracker,
            accumulator: FrameAccumulator::new(),
            video,
            log: None,
            debug_sink: None,
            forward,
            forward_open: true,
            progress: None,
            last_detections: Vec::new(),
            last_index: None,
            stats: ProcessorStats::default(),
        }
    }

    pub fn with_log(mut self, log: WindowLog<Box<dyn Write + Send>>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn with_progress(mut self, progress: ProgressTracker) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    pub fn tracker(&self) -> &WindowTracker {
        &self.tracker
    }

    pub fn accumulator(&self) -> &FrameAccumulator {
        &self.accumulator
    }

    /// Process the next frame in source order
    pub fn process(&mut self, frame: Frame) {
        let index = frame.index;
        let sampled = self.tracker.settings().is_sampled(index);

        let samples = if sampled {
            self.stats.sampled += 1;
            self.classify(&frame)
        } else {
            BTreeMap::new()
        };

        let frame: SharedFrame = Arc::new(frame);
        for closed in self.tracker.observe(index, sampled, &samples) {
            self.close_window(closed);
        }

        let active = self.tracker.active_classes();
        self.accumulator.push(&frame, &active);

        self.write_debug(&frame);

        self.stats.frames += 1;
        self.last_index = Some(index);
        if let Some(progress) = &self.progress {
            progress.update(self.stats.frames);
        }
    }

    /// Close every window still open and flush the log
    pub fn finish(mut self) -> ProcessorOutcome {
        let last_index = self.last_index.unwrap_or(0);
        for closed in self.tracker.close_all(last_index) {
            self.close_window(closed);
        }

        if let Some(log) = self.log.as_mut() {
            if let Err(e) = log.flush() {
                warn!(error = %e, "Failed to flush window log");
            }
        }
        if let Some(progress) = &self.progress {
            progress.complete();
        }

        ProcessorOutcome {
            stats: self.stats,
            debug_sink: self.debug_sink,
        }
    }

    fn classify(&mut self, frame: &Frame) -> BTreeMap<ClassId, f32> {
        match self.classifier.classify(frame) {
            Ok(detections) => {
                let samples = collect_samples(&detections, &self.names, &self.policy);
                if self.debug_sink.is_some() {
                    self.last_detections = detections
                        .into_iter()
                        .filter(|d| samples.contains_key(&d.class_id))
                        .collect();
                }
                samples
            }
            Err(e) => {
                self.stats.classifier_errors += 1;
                warn!(frame = frame.index, error = %e, "Classifier failed, treating frame as empty");
                self.last_detections.clear();
                BTreeMap::new()
            }
        }
    }

    fn close_window(&mut self, closed: ClosedWindow) {
        let buffered = self.accumulator.take(closed.class_id);
        let class_name = self.names.name(closed.class_id);
        let summary = WindowSummary::from_closed(
            &closed,
            class_name.as_str(),
            &self.video,
            self.tracker.settings().min_detect_percent,
            buffered.len(),
        );

        info!(
            class = %summary.class_name,
            timestamp_secs = format_args!("{:.2}", summary.timestamp_secs),
            frame_count = summary.frame_count,
            window_length = summary.window_length,
            detection_percentage = format_args!("{:.2}", summary.detection_percentage),
            mean_confidence = format_args!("{:.2}", summary.confidence.mean),
            peak_confidence = format_args!("{:.2}", summary.confidence.peak),
            saved = summary.saved,
            buffered_frames = summary.buffered_frames,
            "Detection window closed"
        );

        self.stats.windows_closed += 1;
        if summary.saved {
            self.stats.windows_saved += 1;
            if self.forward_open && !self.forward.forward(&class_name, buffered) {
                warn!(class = %class_name, "Clip writer stopped, dropping remaining clip frames");
                self.forward_open = false;
            }
        }

        if let Some(log) = self.log.as_mut() {
            match log.record(&summary) {
                Ok(true) => self.stats.windows_logged += 1,
                Ok(false) => debug!(class = %summary.class_name, "Unsaved window not logged"),
                Err(e) => warn!(error = %e, "Failed to write window log"),
            }
        }
    }

    fn write_debug(&mut self, frame: &Frame) {
        let Some(sink) = self.debug_sink.as_mut() else {
            return;
        };

        let annotated = annotate(frame, &self.last_detections);
        if let Err(e) = sink.write_frame(&annotated) {
            warn!(error = %e, "Debug video writer failed, disabling debug output");
            self.debug_sink = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::window::TrackerSettings;
    use crate::error::{SightclipError, SightclipResult};
    use image::RgbImage;
    use std::collections::{HashMap, VecDeque};

    struct ScriptedClassifier {
        names: ClassNames,
        script: VecDeque<SightclipResult<Vec<Detection>>>,
    }

    impl Classifier for ScriptedClassifier {
        fn class_names(&self) -> &ClassNames {
            &self.names
        }

        fn classify(&mut self, _frame: &Frame) -> SightclipResult<Vec<Detection>> {
            self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn processor(
        script: Vec<SightclipResult<Vec<Detection>>>,
        check_interval: u64,
        grace_period: u64,
    ) -> FrameProcessor<Vec<ClipFrame>> {
        let classifier = ScriptedClassifier {
            names: ClassNames::new(vec!["person".to_string(), "cat".to_string()]),
            script: script.into(),
        };
        let settings = TrackerSettings::new(check_interval, grace_period, 0.5).unwrap();
        FrameProcessor::new(
            Box::new(classifier),
            WindowTracker::new(settings),
            ConfidencePolicy::new(0.5, HashMap::new()),
            VideoInfo::new(4, 4, 30.0, 0).unwrap(),
            Vec::new(),
        )
    }

    fn frame(index: u64) -> Frame {
        Frame::new(index, RgbImage::new(4, 4))
    }

    #[test]
    fn test_collect_samples_keeps_max_per_class() {
        let names = ClassNames::new(vec!["person".to_string(), "cat".to_string()]);
        let mut overrides = HashMap::new();
        overrides.insert("person".to_string(), 0.8);
        let policy = ConfidencePolicy::new(0.5, overrides);

        let detections = vec![
            Detection::new(1, 0.6),
            Detection::new(1, 0.9),
            Detection::new(1, 0.3),
            Detection::new(0, 0.7),
        ];
        let samples = collect_samples(&detections, &names, &policy);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples.get(&1), Some(&0.9));
    }

    #[test]
    fn test_saved_window_forwards_buffered_frames() {
        // Cat seen on ticks 0, 1, 2 with interval 1 and grace 1; absent on 3
        let script = vec![
            Ok(vec![Detection::new(1, 0.9)]),
            Ok(vec![Detection::new(1, 0.8)]),
            Ok(vec![Detection::new(1, 0.7)]),
            Ok(vec![]),
        ];
        let mut processor = processor(script, 1, 1);
        for index in 0..4 {
            processor.process(frame(index));
        }

        let outcome_stats = processor.stats().clone();
        assert_eq!(outcome_stats.windows_closed, 1);
        assert_eq!(outcome_stats.windows_saved, 1);

        let forwarded: Vec<u64> = processor.forward.iter().map(|f| f.frame.index).collect();
        assert_eq!(forwarded, vec![0, 1, 2]);
        assert!(processor.forward.iter().all(|f| f.class_name == "cat"));
        assert_eq!(processor.accumulator().len(1), 0);
    }

    #[test]
    fn test_unsaved_window_discards_buffer() {
        // One hit then three misses: 1 of 4 marks
        let script = vec![Ok(vec![Detection::new(1, 0.9)])];
        let mut processor = processor(script, 1, 3);
        for index in 0..4 {
            processor.process(frame(index));
        }

        assert_eq!(processor.stats().windows_closed, 1);
        assert_eq!(processor.stats().windows_saved, 0);
        assert!(processor.forward.is_empty());
        assert_eq!(processor.accumulator().len(1), 0);
    }

    #[test]
    fn test_classifier_error_counts_as_empty_tick() {
        let script = vec![
            Ok(vec![Detection::new(1, 0.9)]),
            Err(SightclipError::Classifier {
                message: "helper crashed".to_string(),
            }),
            Ok(vec![Detection::new(1, 0.9)]),
        ];
        let mut processor = processor(script, 1, 2);
        for index in 0..3 {
            processor.process(frame(index));
        }

        assert_eq!(processor.stats().classifier_errors, 1);
        assert_eq!(processor.stats().frames, 3);
        let window = processor.tracker().window(1).unwrap();
        assert_eq!(window.marks().len(), 3);
        assert!(window.is_active());
    }

    #[test]
    fn test_finish_closes_open_windows_once() {
        let script = vec![Ok(vec![Detection::new(0, 0.95), Detection::new(1, 0.9)])];
        let mut processor = processor(script, 1, 10);
        processor.process(frame(0));
        processor.process(frame(1));

        let outcome = processor.finish();
        assert_eq!(outcome.stats.windows_closed, 2);
        assert!(outcome.debug_sink.is_none());
    }

    #[test]
    fn test_non_sampled_frames_are_buffered_while_active() {
        let script = vec![Ok(vec![Detection::new(1, 0.9)])];
        let mut processor = processor(script, 5, 2);
        for index in 0..4 {
            processor.process(frame(index));
        }

        assert_eq!(processor.stats().sampled, 1);
        assert_eq!(processor.accumulator().len(1), 4);
    }
}
