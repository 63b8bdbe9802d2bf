//! Live channel lifecycle
//!
//! Each watched channel moves through `Idle -> Recording -> QueuedForInference
//! -> Idle`. The manager polls stream status on a fixed interval, starts a
//! capture when a channel goes online, stops it when the channel goes offline
//! and hands the recording to the job scheduler. The channel returns to idle
//! once its job ends.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Local;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::scheduler::JobQueue;
use crate::config::LiveConfig;
use crate::domain::errors::DomainError;
use crate::domain::model::{ChannelState, StreamStatus, VideoRef};
use crate::ports::{CaptureBackend, CaptureExit, CaptureSession, StatusProbe};
use crate::utils::path::capture_path;

/// Mutex-guarded channel states; every change goes through a transition method
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    states: Mutex<HashMap<String, ChannelState>>,
}

impl ChannelRegistry {
    /// Register channels, all idle
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let states = channels
            .into_iter()
            .map(|channel| (channel.into(), ChannelState::Idle))
            .collect();
        Self {
            states: Mutex::new(states),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ChannelState>> {
        // Every write is a single assignment, so a poisoned map is still consistent
        self.states.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self, channel: &str) -> Option<ChannelState> {
        self.lock().get(channel).copied()
    }

    /// `Idle -> Recording`
    pub fn begin_recording(&self, channel: &str) -> Result<(), DomainError> {
        self.transition(channel, ChannelState::Idle, ChannelState::Recording)
    }

    /// `Recording -> QueuedForInference`
    pub fn mark_queued(&self, channel: &str) -> Result<(), DomainError> {
        self.transition(channel, ChannelState::Recording, ChannelState::QueuedForInference)
    }

    /// Force a channel back to `Idle` from any state
    pub fn reset(&self, channel: &str) {
        if let Some(state) = self.lock().get_mut(channel) {
            *state = ChannelState::Idle;
        }
    }

    /// Force every channel back to `Idle`
    pub fn reset_all(&self) {
        for state in self.lock().values_mut() {
            *state = ChannelState::Idle;
        }
    }

    fn transition(
        &self,
        channel: &str,
        from: ChannelState,
        to: ChannelState,
    ) -> Result<(), DomainError> {
        let mut states = self.lock();
        let state = states.get_mut(channel).ok_or_else(|| {
            DomainError::InvalidTransition(format!("unknown channel '{}'", channel))
        })?;
        if *state != from {
            return Err(DomainError::InvalidTransition(format!(
                "channel '{}' is {}, expected {}",
                channel, state, from
            )));
        }
        *state = to;
        Ok(())
    }
}

/// Timing and naming for captures
#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub poll_interval: Duration,
    pub stop_timeout: Duration,
    pub recordings_dir: PathBuf,
    pub capture_extension: String,
}

impl From<&LiveConfig> for LiveSettings {
    fn from(config: &LiveConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            stop_timeout: config.stop_timeout(),
            recordings_dir: config.recordings_dir.clone(),
            capture_extension: config.capture_extension.clone(),
        }
    }
}

/// Drives captures for a fixed set of channels
pub struct LiveSourceManager {
    channels: Vec<String>,
    registry: Arc<ChannelRegistry>,
    status: Arc<dyn StatusProbe>,
    capture: Arc<dyn CaptureBackend>,
    sessions: HashMap<String, Box<dyn CaptureSession>>,
    queue: Option<JobQueue>,
    settings: LiveSettings,
}

impl LiveSourceManager {
    pub fn new(
        channels: Vec<String>,
        settings: LiveSettings,
        status: Arc<dyn StatusProbe>,
        capture: Arc<dyn CaptureBackend>,
        queue: JobQueue,
    ) -> Self {
        let registry = Arc::new(ChannelRegistry::new(channels.iter().cloned()));
        Self {
            channels,
            registry,
            status,
            capture,
            sessions: HashMap::new(),
            queue: Some(queue),
            settings,
        }
    }

    pub fn registry(&self) -> Arc<ChannelRegistry> {
        Arc::clone(&self.registry)
    }

    /// Number of captures currently running
    pub fn active_captures(&self) -> usize {
        self.sessions.len()
    }

    /// Poll until cancelled, then shut down
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            channels = self.channels.len(),
            poll_secs = self.settings.poll_interval.as_secs(),
            "Watching live channels"
        );
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }

        self.shutdown().await;
    }

    /// Query every channel once and apply the resulting transitions
    pub async fn poll_once(&mut self) {
        let channels = self.channels.clone();
        for channel in &channels {
            let Some(state) = self.registry.state(channel) else {
                continue;
            };
            if state == ChannelState::QueuedForInference {
                continue;
            }

            let status = match self.status.status(channel).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(channel = %channel, error = %e, "Status check failed, skipping channel");
                    continue;
                }
            };
            debug!(channel = %channel, state = %state, status = ?status, "Channel polled");

            match (state, status) {
                (ChannelState::Idle, StreamStatus::Online) => self.start_capture(channel).await,
                (ChannelState::Recording, StreamStatus::Offline) => {
                    self.finish_capture(channel).await
                }
                (ChannelState::Recording, StreamStatus::Online) => self.check_capture(channel),
                _ => {}
            }
        }
    }

    /// Stop every capture, reset every channel and release the job queue
    pub async fn shutdown(&mut self) {
        info!(captures = self.sessions.len(), "Stopping live manager");
        let sessions: Vec<_> = self.sessions.drain().collect();
        for (channel, session) in sessions {
            let stopped = stop_capture(&channel, session, self.settings.stop_timeout).await;
            info!(channel = %channel, path = %stopped.output.display(), "Capture stopped at shutdown");
        }
        self.registry.reset_all();
        self.queue = None;
    }

    async fn start_capture(&mut self, channel: &str) {
        if let Err(e) = self.registry.begin_recording(channel) {
            warn!(channel = %channel, error = %e, "Cannot start recording");
            return;
        }

        let output = capture_path(
            &self.settings.recordings_dir,
            channel,
            &self.settings.capture_extension,
            &Local::now(),
        );
        if let Err(e) = tokio::fs::create_dir_all(&self.settings.recordings_dir).await {
            error!(channel = %channel, error = %e, "Cannot create recordings directory");
            self.registry.reset(channel);
            return;
        }

        match self.capture.start(channel, &output).await {
            Ok(session) => {
                info!(channel = %channel, path = %output.display(), "Channel online, recording");
                self.sessions.insert(channel.to_string(), session);
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Failed to start capture");
                self.registry.reset(channel);
            }
        }
    }

    async fn finish_capture(&mut self, channel: &str) {
        let Some(session) = self.sessions.remove(channel) else {
            warn!(channel = %channel, "Recording without a capture session");
            self.registry.reset(channel);
            return;
        };

        info!(channel = %channel, "Channel offline, stopping capture");
        let stopped = stop_capture(channel, session, self.settings.stop_timeout).await;
        if let Some(exit) = stopped.exited_early.filter(|exit| !exit.success) {
            error!(
                channel = %channel,
                code = ?exit.code,
                path = %stopped.output.display(),
                "Capture exited abnormally before the channel went offline, discarding"
            );
            self.registry.reset(channel);
            return;
        }
        self.enqueue_recording(channel, stopped.output).await;
    }

    /// Detect a capture that ended while the channel is still online
    fn check_capture(&mut self, channel: &str) {
        let Some(session) = self.sessions.get_mut(channel) else {
            return;
        };
        match session.try_exit() {
            Ok(Some(exit)) if !exit.success => {
                error!(channel = %channel, code = ?exit.code, "Capture exited abnormally");
                self.sessions.remove(channel);
                self.registry.reset(channel);
            }
            Ok(Some(exit)) => {
                // Ended cleanly; the next offline poll enqueues it
                debug!(channel = %channel, code = ?exit.code, "Capture ended while channel online");
            }
            Ok(None) => {}
            Err(e) => warn!(channel = %channel, error = %e, "Cannot query capture state"),
        }
    }

    async fn enqueue_recording(&mut self, channel: &str, output: PathBuf) {
        if !has_content(&output).await {
            warn!(channel = %channel, path = %output.display(), "Capture produced no output");
            self.registry.reset(channel);
            return;
        }

        let Some(queue) = self.queue.as_ref() else {
            warn!(channel = %channel, "Job queue closed, recording not processed");
            self.registry.reset(channel);
            return;
        };

        match queue.submit_with_completion(VideoRef::from_path(&output)) {
            Ok(completion) => {
                if let Err(e) = self.registry.mark_queued(channel) {
                    warn!(channel = %channel, error = %e, "Unexpected channel state");
                }
                info!(channel = %channel, path = %output.display(), "Recording queued for inference");

                let registry = Arc::clone(&self.registry);
                let channel = channel.to_string();
                tokio::spawn(async move {
                    match completion.await {
                        Ok(outcome) => {
                            info!(channel = %channel, success = outcome.is_success(), "Inference finished")
                        }
                        Err(_) => warn!(channel = %channel, "Inference job ended without reporting"),
                    }
                    registry.reset(&channel);
                });
            }
            Err(e) => {
                error!(channel = %channel, error = %e, "Failed to queue recording");
                self.registry.reset(channel);
            }
        }
    }
}

/// Result of stopping a capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub output: PathBuf,
    /// Exit status if the process had already ended before the stop request
    pub exited_early: Option<CaptureExit>,
}

/// Interrupt, wait up to `timeout`, then kill.
///
/// Any exit status is accepted after a requested stop; only an exit observed
/// before the interrupt is reported back.
pub async fn stop_capture(
    channel: &str,
    mut session: Box<dyn CaptureSession>,
    timeout: Duration,
) -> StopOutcome {
    let output = session.output_path().to_path_buf();

    let exited_early = match session.try_exit() {
        Ok(exit) => exit,
        Err(e) => {
            warn!(channel = %channel, error = %e, "Cannot query capture state");
            None
        }
    };
    if exited_early.is_none() {
        if let Err(e) = session.interrupt() {
            warn!(channel = %channel, error = %e, "Failed to interrupt capture");
        }
        match tokio::time::timeout(timeout, session.wait()).await {
            Ok(Ok(exit)) => debug!(channel = %channel, code = ?exit.code, "Capture exited"),
            Ok(Err(e)) => warn!(channel = %channel, error = %e, "Failed waiting for capture"),
            Err(_) => {
                warn!(channel = %channel, timeout_secs = timeout.as_secs(), "Capture ignored interrupt, killing");
                if let Err(e) = session.kill().await {
                    error!(channel = %channel, error = %e, "Failed to kill capture");
                }
            }
        }
    }

    StopOutcome {
        output,
        exited_early,
    }
}

async fn has_content(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
