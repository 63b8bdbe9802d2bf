// Pipeline job runner - Runs the orchestrator for each scheduled job

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::app::scheduler::JobRunner;
use crate::domain::model::VideoRef;
use crate::engine::PipelineOrchestrator;
use crate::error::SightclipResult;

pub struct PipelineJobRunner {
    orchestrator: Arc<PipelineOrchestrator>,
}

impl PipelineJobRunner {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobRunner for PipelineJobRunner {
    async fn run(&self, video: &VideoRef, label: &str) -> SightclipResult<()> {
        let report = self.orchestrator.run(video, label).await?;
        debug!(job = label, report = ?report, "Pipeline report");
        Ok(())
    }
}
