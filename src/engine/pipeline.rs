//! Pipeline orchestrator: reader, processing and writer stages
//!
//! ```text
//! FrameSource -> [read queue] -> FrameProcessor -> [write queue] -> ClipWriter
//! ```
//!
//! Each stage runs on a blocking worker thread. Both queues are bounded, so a
//! slow stage applies backpressure to the one feeding it. End of stream travels
//! downstream as a closed channel.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use crate::config::InferenceConfig;
use crate::domain::errors::DomainError;
use crate::domain::model::{ConfidencePolicy, Frame, VideoInfo, VideoRef};
use crate::domain::window::{TrackerSettings, WindowTracker};
use crate::engine::preprocess::equalize_blend;
use crate::engine::processor::{ClipFrame, FrameProcessor, ProcessorOutcome, ProcessorStats};
use crate::engine::progress::{ProgressTracker, TracingProgressCallback};
use crate::error::{SightclipError, SightclipResult};
use crate::output::{OutputLayout, WindowLog};
use crate::ports::{ClassifierFactory, ClipSink, ClipSinkFactory, FrameSource, SourceOpener};

/// Settings for every pipeline run, derived from the inference config
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub tracker: TrackerSettings,
    pub policy: ConfidencePolicy,
    pub output_dir: PathBuf,
    pub debug: bool,
    pub log_saved_only: bool,
    /// Equalisation blend weight, `None` when preprocessing is off
    pub equalization: Option<f32>,
    pub clip_extension: String,
    pub queue_capacity: usize,
}

impl PipelineSettings {
    pub fn from_config(config: &InferenceConfig) -> Result<Self, DomainError> {
        if config.queue_capacity == 0 {
            return Err(DomainError::InvalidSettings(
                "queue capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            tracker: config.tracker_settings()?,
            policy: config.confidence_policy(),
            output_dir: config.output_dir.clone(),
            debug: config.debug,
            log_saved_only: config.log_saved_only,
            equalization: config
                .enable_preprocessing
                .then_some(config.equalization_weight),
            clip_extension: config.clip_extension.clone(),
            queue_capacity: config.queue_capacity,
        })
    }
}

/// What one pipeline run produced
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub video: PathBuf,
    pub frames_read: u64,
    pub processor: ProcessorStats,
    pub clips: Vec<PathBuf>,
    pub frames_written: u64,
    pub log_path: PathBuf,
}

/// Runs one video through the three stages
pub struct PipelineOrchestrator {
    settings: PipelineSettings,
    sources: Arc<dyn SourceOpener>,
    classifiers: Arc<dyn ClassifierFactory>,
    sinks: Arc<dyn ClipSinkFactory>,
}

impl PipelineOrchestrator {
    pub fn new(
        settings: PipelineSettings,
        sources: Arc<dyn SourceOpener>,
        classifiers: Arc<dyn ClassifierFactory>,
        sinks: Arc<dyn ClipSinkFactory>,
    ) -> Self {
        Self {
            settings,
            sources,
            classifiers,
            sinks,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process one video; `label` identifies the job in progress events
    pub async fn run(&self, video: &VideoRef, label: &str) -> SightclipResult<PipelineReport> {
        let stem = video.stem();
        let layout = OutputLayout::new(&self.settings.output_dir, &stem);
        info!(job = label, video = %video.path.display(), output = %layout.video_dir().display(), "Starting pipeline");

        // Opening is fatal to this job only
        let (source, classifier) = {
            let sources = Arc::clone(&self.sources);
            let classifiers = Arc::clone(&self.classifiers);
            let path = video.path.clone();
            tokio::task::spawn_blocking(move || -> SightclipResult<_> {
                let source = sources.open(&path)?;
                let classifier = classifiers.create()?;
                Ok((source, classifier))
            })
            .await
            .map_err(|e| stage_failed("open", e))??
        };
        let info = source.info().clone();
        debug!(
            job = label,
            width = info.width,
            height = info.height,
            fps = info.fps,
            total_frames = info.total_frames,
            "Source opened"
        );

        layout.create_dirs()?;
        let log_path = layout.log_path();
        let log_file: Box<dyn Write + Send> = Box::new(BufWriter::new(File::create(&log_path)?));
        let log = WindowLog::new(log_file, self.settings.log_saved_only);

        let progress = ProgressTracker::new(label);
        progress.add_callback(Arc::new(TracingProgressCallback));
        progress.start(Some(info.total_frames));

        let (read_tx, read_rx) = mpsc::channel::<Frame>(self.settings.queue_capacity);
        let (write_tx, write_rx) = mpsc::channel::<ClipFrame>(self.settings.queue_capacity);

        let mut processor = FrameProcessor::new(
            classifier,
            WindowTracker::new(self.settings.tracker.clone()),
            self.settings.policy.clone(),
            info.clone(),
            write_tx,
        )
        .with_log(log)
        .with_progress(progress);
        if self.settings.debug {
            let debug_path = layout.debug_video_path(&self.settings.clip_extension);
            match self.sinks.create(&debug_path, &info) {
                Ok(sink) => processor = processor.with_debug_sink(sink),
                Err(e) => warn!(job = label, error = %e, "Debug video disabled"),
            }
        }

        let equalization = self.settings.equalization;
        let reader = tokio::task::spawn_blocking(move || read_frames(source, read_tx, equalization));
        let processing = tokio::task::spawn_blocking(move || drain_frames(processor, read_rx));

        let writer = ClipWriter::new(
            Arc::clone(&self.sinks),
            layout.clone(),
            self.settings.clip_extension.clone(),
            info,
        );
        let writing = tokio::task::spawn_blocking(move || writer.run(write_rx));

        let (reader, processing, writing) = tokio::join!(reader, processing, writing);
        let (source, frames_read) = reader.map_err(|e| stage_failed("reader", e))?;
        let outcome = processing.map_err(|e| stage_failed("processing", e))?;
        let written = writing.map_err(|e| stage_failed("writer", e))?;

        drop(source);
        if let Some(sink) = outcome.debug_sink {
            match tokio::task::spawn_blocking(move || sink.finish()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(job = label, error = %e, "Failed to finalize debug video"),
                Err(e) => warn!(job = label, error = %e, "Debug video finalizer did not complete"),
            }
        }

        let report = PipelineReport {
            video: video.path.clone(),
            frames_read,
            processor: outcome.stats,
            clips: written.clips,
            frames_written: written.frames_written,
            log_path,
        };
        info!(
            job = label,
            frames = report.frames_read,
            windows = report.processor.windows_closed,
            saved = report.processor.windows_saved,
            clips = report.clips.len(),
            classifier_errors = report.processor.classifier_errors,
            "Pipeline finished"
        );
        Ok(report)
    }
}

fn stage_failed(stage: &'static str, error: JoinError) -> SightclipError {
    SightclipError::StageFailed {
        stage,
        message: error.to_string(),
    }
}

/// Reader stage; returns the source so it is dropped after the other stages
fn read_frames(
    mut source: Box<dyn FrameSource>,
    read_tx: mpsc::Sender<Frame>,
    equalization: Option<f32>,
) -> (Box<dyn FrameSource>, u64) {
    let mut frames_read = 0u64;
    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!(frame = frames_read, error = %e, "Decode failed, ending stream early");
                break;
            }
        };

        let frame = match equalization {
            Some(weight) => Frame::new(frame.index, equalize_blend(&frame.image, weight)),
            None => frame,
        };

        if read_tx.blocking_send(frame).is_err() {
            warn!("Processing stage stopped, reader exiting");
            break;
        }
        frames_read += 1;
    }
    (source, frames_read)
}

/// Processing stage; ends when the reader closes the read queue
fn drain_frames(
    mut processor: FrameProcessor<mpsc::Sender<ClipFrame>>,
    mut read_rx: mpsc::Receiver<Frame>,
) -> ProcessorOutcome {
    while let Some(frame) = read_rx.blocking_recv() {
        processor.process(frame);
    }
    // Consuming the processor drops the write sender
    processor.finish()
}

/// What the writer stage produced
#[derive(Debug, Default)]
pub struct WriterReport {
    pub clips: Vec<PathBuf>,
    pub frames_written: u64,
}

enum SinkSlot {
    Open(Box<dyn ClipSink>, PathBuf),
    Failed,
}

/// Writer stage: one lazily created sink per class
pub struct ClipWriter {
    factory: Arc<dyn ClipSinkFactory>,
    layout: OutputLayout,
    extension: String,
    video: VideoInfo,
    sinks: HashMap<String, SinkSlot>,
    frames_written: u64,
}

impl ClipWriter {
    pub fn new(
        factory: Arc<dyn ClipSinkFactory>,
        layout: OutputLayout,
        extension: String,
        video: VideoInfo,
    ) -> Self {
        Self {
            factory,
            layout,
            extension,
            video,
            sinks: HashMap::new(),
            frames_written: 0,
        }
    }

    /// Drain the write queue, then finish every sink
    pub fn run(mut self, mut write_rx: mpsc::Receiver<ClipFrame>) -> WriterReport {
        while let Some(item) = write_rx.blocking_recv() {
            self.write(&item);
        }
        self.finish()
    }

    /// Append one frame to its class's clip
    pub fn write(&mut self, item: &ClipFrame) {
        if !self.sinks.contains_key(&item.class_name) {
            let slot = self.open_sink(&item.class_name);
            self.sinks.insert(item.class_name.clone(), slot);
        }
        let Some(slot) = self.sinks.get_mut(&item.class_name) else {
            return;
        };

        let failed = match slot {
            SinkSlot::Open(sink, path) => match sink.write_frame(&item.frame) {
                Ok(()) => {
                    self.frames_written += 1;
                    false
                }
                Err(e) => {
                    error!(class = %item.class_name, path = %path.display(), error = %e, "Clip write failed, dropping its remaining frames");
                    true
                }
            },
            SinkSlot::Failed => false,
        };

        if failed {
            if let Some(SinkSlot::Open(sink, path)) =
                self.sinks.insert(item.class_name.clone(), SinkSlot::Failed)
            {
                close_sink(sink, &path);
            }
        }
    }

    fn open_sink(&self, class_name: &str) -> SinkSlot {
        let path = self.layout.clip_path(class_name, &self.extension);
        match self.factory.create(&path, &self.video) {
            Ok(sink) => {
                info!(class = %class_name, path = %path.display(), "Clip started");
                SinkSlot::Open(sink, path)
            }
            Err(e) => {
                error!(class = %class_name, path = %path.display(), error = %e, "Failed to create clip, dropping its frames");
                SinkSlot::Failed
            }
        }
    }

    pub fn finish(self) -> WriterReport {
        let mut clips = Vec::new();
        for (_, slot) in self.sinks {
            if let SinkSlot::Open(sink, path) = slot {
                if close_sink(sink, &path) {
                    clips.push(path);
                }
            }
        }
        clips.sort();
        WriterReport {
            clips,
            frames_written: self.frames_written,
        }
    }
}

fn close_sink(sink: Box<dyn ClipSink>, path: &Path) -> bool {
    match sink.finish() {
        Ok(()) => true,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to finalize clip");
            false
        }
    }
}
