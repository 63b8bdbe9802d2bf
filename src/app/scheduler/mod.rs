//! Bounded-concurrency job scheduler
//!
//! Jobs are submitted through a cloneable [`JobQueue`] and dispatched in FIFO
//! order. At most `max_concurrent_jobs` run at once; the rest wait in the queue.
//! A failing or panicking job only affects its own outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::domain::model::VideoRef;
use crate::error::{SightclipError, SightclipResult};

pub mod runner;

pub use runner::PipelineJobRunner;

/// How a job ended
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

/// One video waiting for the pipeline
#[derive(Debug)]
pub struct Job {
    pub video: VideoRef,
    /// Dispatch sequence number, used as the progress label
    pub slot: u64,
    completion: Option<oneshot::Sender<JobOutcome>>,
}

impl Job {
    pub fn label(&self) -> String {
        format!("job-{}", self.slot)
    }

    fn complete(&mut self, outcome: JobOutcome) {
        if let Some(completion) = self.completion.take() {
            // The waiter may have gone away
            let _ = completion.send(outcome);
        }
    }
}

/// Executes one job
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, video: &VideoRef, label: &str) -> SightclipResult<()>;
}

/// Submit side of the scheduler
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<Job>,
    next_slot: Arc<AtomicU64>,
}

impl JobQueue {
    /// Enqueue a video; returns its slot
    pub fn submit(&self, video: VideoRef) -> SightclipResult<u64> {
        self.push(video, None)
    }

    /// Enqueue a video and get notified when its job ends
    pub fn submit_with_completion(
        &self,
        video: VideoRef,
    ) -> SightclipResult<oneshot::Receiver<JobOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.push(video, Some(tx))?;
        Ok(rx)
    }

    fn push(
        &self,
        video: VideoRef,
        completion: Option<oneshot::Sender<JobOutcome>>,
    ) -> SightclipResult<u64> {
        let slot = self.next_slot.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(slot, video = %video.path.display(), "Job queued");
        self.tx
            .send(Job {
                video,
                slot,
                completion,
            })
            .map_err(|_| SightclipError::QueueClosed)?;
        Ok(slot)
    }
}

/// Totals reported when the scheduler retires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed: usize,
    pub failed: usize,
}

impl SchedulerStats {
    fn record(&mut self, joined: Result<JobOutcome, JoinError>) {
        match joined {
            Ok(JobOutcome::Succeeded) => self.completed += 1,
            Ok(JobOutcome::Failed(_)) => self.failed += 1,
            Err(e) => {
                error!(error = %e, "Job task aborted");
                self.failed += 1;
            }
        }
    }
}

/// Handle to the running dispatcher
pub struct SchedulerHandle {
    join: JoinHandle<SchedulerStats>,
}

impl SchedulerHandle {
    /// Wait until every queue clone is dropped and all jobs have finished
    pub async fn wait(self) -> SightclipResult<SchedulerStats> {
        self.join.await.map_err(|e| SightclipError::StageFailed {
            stage: "scheduler",
            message: e.to_string(),
        })
    }
}

pub struct JobScheduler;

impl JobScheduler {
    /// Start the dispatcher on the current runtime
    pub fn spawn<R>(max_concurrent_jobs: usize, runner: Arc<R>) -> (JobQueue, SchedulerHandle)
    where
        R: JobRunner + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = JobQueue {
            tx,
            next_slot: Arc::new(AtomicU64::new(0)),
        };
        let permits = Arc::new(Semaphore::new(max_concurrent_jobs.max(1)));
        info!(max_concurrent_jobs, "Job scheduler started");

        let join = tokio::spawn(dispatch(rx, permits, runner));
        (queue, SchedulerHandle { join })
    }
}

async fn dispatch<R>(
    mut rx: mpsc::UnboundedReceiver<Job>,
    permits: Arc<Semaphore>,
    runner: Arc<R>,
) -> SchedulerStats
where
    R: JobRunner + ?Sized + 'static,
{
    let mut tasks = JoinSet::new();
    let mut stats = SchedulerStats::default();

    loop {
        let next = tokio::select! {
            job = rx.recv() => job,
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                stats.record(joined);
                continue;
            }
        };
        let Some(mut job) = next else {
            break;
        };

        let permit = match Arc::clone(&permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                job.complete(JobOutcome::Failed("scheduler stopped".to_string()));
                break;
            }
        };

        let runner = Arc::clone(&runner);
        tasks.spawn(async move {
            let _permit = permit;
            let label = job.label();
            info!(job = %label, video = %job.video.path.display(), "Job started");

            let outcome = match runner.run(&job.video, &label).await {
                Ok(()) => {
                    info!(job = %label, "Job completed");
                    JobOutcome::Succeeded
                }
                Err(e) => {
                    warn!(job = %label, error = %e, "Job failed");
                    JobOutcome::Failed(e.to_string())
                }
            };
            job.complete(outcome.clone());
            outcome
        });
    }

    while let Some(joined) = tasks.join_next().await {
        stats.record(joined);
    }
    info!(completed = stats.completed, failed = stats.failed, "Job scheduler drained");
    stats
}
