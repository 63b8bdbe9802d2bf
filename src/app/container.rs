use std::sync::Arc;

use crate::adapters::{
    CommandCaptureBackend, CommandStatusProbe, FfmpegClipSinkFactory, FfmpegResizer,
    FfmpegSourceOpener, ProcessClassifierFactory,
};
use crate::app::folder::{FolderIngest, ResizeStep};
use crate::app::live::{LiveSettings, LiveSourceManager};
use crate::app::scheduler::{JobQueue, JobScheduler, PipelineJobRunner, SchedulerHandle};
use crate::config::AppConfig;
use crate::engine::{PipelineOrchestrator, PipelineSettings};
use crate::error::SightclipResult;
use crate::ports::{CaptureBackend, ClassifierFactory, ClipSinkFactory, SourceOpener, StatusProbe};

pub trait AppContainer: Send + Sync {
    fn orchestrator(&self) -> Arc<PipelineOrchestrator>;
    fn spawn_scheduler(&self) -> (JobQueue, SchedulerHandle);
    fn folder_ingest(&self, queue: JobQueue) -> FolderIngest;
    fn live_manager(&self, queue: JobQueue) -> LiveSourceManager;
}

/// Wires the ffmpeg and subprocess adapters from the loaded configuration
pub struct DefaultAppContainer {
    config: AppConfig,
    orchestrator: Arc<PipelineOrchestrator>,
    status: Arc<dyn StatusProbe>,
    capture: Arc<dyn CaptureBackend>,
}

impl DefaultAppContainer {
    pub fn new(config: AppConfig) -> SightclipResult<Self> {
        let settings = PipelineSettings::from_config(&config.inference)?;
        let sources = Arc::new(FfmpegSourceOpener::new()?);
        let classifiers = Arc::new(ProcessClassifierFactory::new(
            config.inference.classifier_command.clone(),
        ));
        let sinks = Arc::new(FfmpegClipSinkFactory::new());

        let orchestrator = Arc::new(PipelineOrchestrator::new(
            settings,
            sources as Arc<dyn SourceOpener>,
            classifiers as Arc<dyn ClassifierFactory>,
            sinks as Arc<dyn ClipSinkFactory>,
        ));

        let status = Arc::new(CommandStatusProbe::new(config.live.status_command.clone()));
        let capture = Arc::new(CommandCaptureBackend::new(config.live.capture_command.clone()));

        Ok(Self {
            config,
            orchestrator,
            status,
            capture,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl AppContainer for DefaultAppContainer {
    fn orchestrator(&self) -> Arc<PipelineOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    fn spawn_scheduler(&self) -> (JobQueue, SchedulerHandle) {
        let runner = Arc::new(PipelineJobRunner::new(self.orchestrator()));
        JobScheduler::spawn(self.config.scheduler.max_concurrent_jobs, runner)
    }

    fn folder_ingest(&self, queue: JobQueue) -> FolderIngest {
        let ingest = FolderIngest::new(queue);
        if !self.config.folder.resize {
            return ingest;
        }
        let (width, height) = self.config.folder.target_resolution;
        ingest.with_resize(ResizeStep {
            resizer: Arc::new(FfmpegResizer::new()),
            width,
            height,
        })
    }

    fn live_manager(&self, queue: JobQueue) -> LiveSourceManager {
        LiveSourceManager::new(
            self.config.live.channels.clone(),
            LiveSettings::from(&self.config.live),
            Arc::clone(&self.status),
            Arc::clone(&self.capture),
            queue,
        )
    }
}
