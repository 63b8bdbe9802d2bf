//! Progress tracking and callback system for pipeline jobs

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::info;

/// Progress callback trait
pub trait ProgressCallback: Send + Sync {
    /// Called when the job starts
    fn on_start(&self, label: &str, total_frames: Option<u64>);

    /// Called at most once per update interval
    fn on_progress(&self, label: &str, info: &ProgressInfo);

    /// Called when the job completes
    fn on_complete(&self, label: &str, info: &ProgressInfo);
}

/// Snapshot of a job's progress
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Frames processed so far
    pub completed: u64,
    /// Total frames, if the container reports it
    pub total: Option<u64>,
    /// Progress percentage (0.0 - 100.0), 0 when the total is unknown
    pub percent: f64,
    /// Time elapsed since start
    pub elapsed: Duration,
    /// Estimated time remaining
    pub eta: Option<Duration>,
    /// Frames per second
    pub throughput: Option<f64>,
}

/// Progress tracker with thread-safe updates
#[derive(Clone)]
pub struct ProgressTracker {
    label: Arc<str>,
    inner: Arc<Mutex<ProgressTrackerInner>>,
    callbacks: Arc<Mutex<Vec<Arc<dyn ProgressCallback>>>>,
}

struct ProgressTrackerInner {
    info: ProgressInfo,
    start_time: Instant,
    last_update: Option<Instant>,
    update_interval: Duration,
}

impl ProgressTracker {
    /// Create a new progress tracker labelled with the job's slot
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        let inner = ProgressTrackerInner {
            info: ProgressInfo {
                completed: 0,
                total: None,
                percent: 0.0,
                elapsed: Duration::ZERO,
                eta: None,
                throughput: None,
            },
            start_time: Instant::now(),
            last_update: None,
            update_interval: Duration::from_secs(5),
        };

        Self {
            label: label.into(),
            inner: Arc::new(Mutex::new(inner)),
            callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Add a progress callback
    pub fn add_callback(&self, callback: Arc<dyn ProgressCallback>) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }

    /// Set update interval
    pub fn set_update_interval(&self, interval: Duration) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.update_interval = interval;
        }
    }

    /// Start tracking with an optional total frame count
    pub fn start(&self, total_frames: Option<u64>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.info.total = total_frames.filter(|&total| total > 0);
            inner.start_time = Instant::now();
            inner.last_update = None;
        }

        self.notify_callbacks(|cb| cb.on_start(&self.label, total_frames));
    }

    /// Record progress; callbacks fire at most once per update interval
    pub fn update(&self, completed: u64) {
        let snapshot = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            let now = Instant::now();
            inner.info.completed = completed;

            let due = inner
                .last_update
                .map_or(true, |last| now.duration_since(last) >= inner.update_interval);
            if !due {
                return;
            }

            inner.last_update = Some(now);
            inner.refresh(now);
            inner.info.clone()
        };

        self.notify_callbacks(|cb| cb.on_progress(&self.label, &snapshot));
    }

    /// Complete tracking
    pub fn complete(&self) {
        let snapshot = {
            let Ok(mut inner) = self.inner.lock() else {
                return;
            };
            inner.refresh(Instant::now());
            inner.info.percent = 100.0;
            inner.info.eta = None;
            inner.info.clone()
        };

        self.notify_callbacks(|cb| cb.on_complete(&self.label, &snapshot));
    }

    /// Get current progress information
    pub fn get_info(&self) -> Option<ProgressInfo> {
        self.inner.lock().ok().map(|inner| inner.info.clone())
    }

    fn notify_callbacks<F>(&self, f: F)
    where
        F: Fn(&dyn ProgressCallback),
    {
        if let Ok(callbacks) = self.callbacks.lock() {
            for callback in callbacks.iter() {
                f(callback.as_ref());
            }
        }
    }
}

impl ProgressTrackerInner {
    fn refresh(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.start_time);
        let completed = self.info.completed;
        self.info.elapsed = elapsed;

        let seconds = elapsed.as_secs_f64();
        let rate = if seconds > 0.0 {
            Some(completed as f64 / seconds)
        } else {
            None
        };
        self.info.throughput = rate;

        if let Some(total) = self.info.total {
            self.info.percent = (completed as f64 / total as f64 * 100.0).min(100.0);
            self.info.eta = match rate {
                Some(rate) if rate > 0.0 && completed < total => {
                    Some(Duration::from_secs_f64((total - completed) as f64 / rate))
                }
                _ => None,
            };
        }
    }
}

/// Reports progress as `tracing` events
pub struct TracingProgressCallback;

impl ProgressCallback for TracingProgressCallback {
    fn on_start(&self, label: &str, total_frames: Option<u64>) {
        info!(job = label, total_frames = ?total_frames, "Processing started");
    }

    fn on_progress(&self, label: &str, info: &ProgressInfo) {
        info!(
            job = label,
            frames = info.completed,
            percent = format_args!("{:.1}", info.percent),
            fps = format_args!("{:.1}", info.throughput.unwrap_or(0.0)),
            eta_secs = ?info.eta.map(|eta| eta.as_secs()),
            "Processing"
        );
    }

    fn on_complete(&self, label: &str, info: &ProgressInfo) {
        info!(
            job = label,
            frames = info.completed,
            elapsed_secs = format_args!("{:.1}", info.elapsed.as_secs_f64()),
            "Processing finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCallback {
        starts: AtomicUsize,
        updates: AtomicUsize,
        completes: AtomicUsize,
    }

    impl ProgressCallback for CountingCallback {
        fn on_start(&self, _label: &str, _total: Option<u64>) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_progress(&self, _label: &str, _info: &ProgressInfo) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn on_complete(&self, _label: &str, _info: &ProgressInfo) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_updates_are_throttled() {
        let tracker = ProgressTracker::new("job-1");
        let callback = Arc::new(CountingCallback::default());
        tracker.add_callback(callback.clone());
        tracker.set_update_interval(Duration::from_secs(3600));

        tracker.start(Some(100));
        for frame in 1..=50 {
            tracker.update(frame);
        }
        tracker.complete();

        assert_eq!(callback.starts.load(Ordering::SeqCst), 1);
        // Only the first update falls outside the throttle window
        assert_eq!(callback.updates.load(Ordering::SeqCst), 1);
        assert_eq!(callback.completes.load(Ordering::SeqCst), 1);

        let info = tracker.get_info().unwrap();
        assert_eq!(info.completed, 50);
        assert_eq!(info.percent, 100.0);
    }

    #[test]
    fn test_unknown_total_keeps_percent_zero() {
        let tracker = ProgressTracker::new("job-2");
        tracker.set_update_interval(Duration::ZERO);
        tracker.start(Some(0));
        tracker.update(10);

        let info = tracker.get_info().unwrap();
        assert_eq!(info.total, None);
        assert_eq!(info.percent, 0.0);
        assert!(info.eta.is_none());
    }
}
