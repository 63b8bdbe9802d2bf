//! Application configuration loaded from TOML
//!
//! Every field has a default, so a missing file or a partial file is valid.
//! Values are range-checked once at startup by [`AppConfig::validate`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::errors::DomainError;
use crate::domain::model::ConfidencePolicy;
use crate::domain::window::TrackerSettings;

/// Errors that can occur while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to render configuration: {0}")]
    Render(String),
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub inference: InferenceConfig,
    pub scheduler: SchedulerConfig,
    pub folder: FolderConfig,
    pub live: LiveConfig,
}

/// Per-video processing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InferenceConfig {
    /// Root directory for clips, logs and debug videos
    pub output_dir: PathBuf,
    /// Write an annotated debug video next to the log
    pub debug: bool,
    /// Only log windows that produced a clip
    pub log_saved_only: bool,
    /// Apply histogram equalisation before classification
    pub enable_preprocessing: bool,
    /// Blend weight of the equalised frame
    pub equalization_weight: f32,
    pub frame_check_interval: u64,
    /// In sampled intervals
    pub grace_period: u64,
    pub min_detect_percent: f64,
    pub default_confidence_threshold: f32,
    /// Per-class thresholds keyed by class name
    pub confidence_overrides: HashMap<String, f32>,
    /// Helper program and arguments for the classifier
    pub classifier_command: Vec<String>,
    pub clip_extension: String,
    /// Capacity of the read and write queues
    pub queue_capacity: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            debug: false,
            log_saved_only: false,
            enable_preprocessing: false,
            equalization_weight: 0.5,
            frame_check_interval: 5,
            grace_period: 2,
            min_detect_percent: 0.5,
            default_confidence_threshold: 0.5,
            confidence_overrides: HashMap::new(),
            classifier_command: vec![
                "python3".to_string(),
                "classify.py".to_string(),
                "yolov8n.pt".to_string(),
            ],
            clip_extension: "mp4".to_string(),
            queue_capacity: 10,
        }
    }
}

impl InferenceConfig {
    pub fn tracker_settings(&self) -> Result<TrackerSettings, DomainError> {
        TrackerSettings::new(
            self.frame_check_interval,
            self.grace_period,
            self.min_detect_percent,
        )
    }

    pub fn confidence_policy(&self) -> ConfidencePolicy {
        ConfidencePolicy::new(
            self.default_confidence_threshold,
            self.confidence_overrides.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub max_concurrent_jobs: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
        }
    }
}

/// Folder ingest options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FolderConfig {
    /// Scale every video to `target_resolution` before processing
    pub resize: bool,
    pub target_resolution: (u32, u32),
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            resize: false,
            target_resolution: (1920, 1080),
        }
    }
}

/// Live channel watching
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
    pub channels: Vec<String>,
    pub poll_interval_secs: u64,
    /// Grace given to a capture tool after SIGINT before it is killed
    pub stop_timeout_secs: u64,
    pub recordings_dir: PathBuf,
    pub capture_extension: String,
    /// Exit code 0 means online, 1 means offline; `{channel}` is substituted
    pub status_command: Vec<String>,
    /// `{channel}` and `{output}` are substituted
    pub capture_command: Vec<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            poll_interval_secs: 60,
            stop_timeout_secs: 10,
            recordings_dir: PathBuf::from("vods"),
            capture_extension: "mp4".to_string(),
            status_command: vec![
                "streamlink".to_string(),
                "--json".to_string(),
                "https://twitch.tv/{channel}".to_string(),
            ],
            capture_command: vec![
                "streamlink".to_string(),
                "-o".to_string(),
                "{output}".to_string(),
                "https://twitch.tv/{channel}".to_string(),
                "best".to_string(),
            ],
        }
    }
}

impl LiveConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl AppConfig {
    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "Configuration file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|error| match error {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })?;

        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|error| ConfigError::Parse {
            path: PathBuf::new(),
            message: error.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|error| ConfigError::Render(error.to_string()))
    }

    /// Apply command-line overrides, then re-validate
    pub fn with_overrides(
        mut self,
        output_dir: Option<PathBuf>,
        max_jobs: Option<usize>,
    ) -> Result<Self, ConfigError> {
        if let Some(output_dir) = output_dir {
            self.inference.output_dir = output_dir;
        }
        if let Some(max_jobs) = max_jobs {
            self.scheduler.max_concurrent_jobs = max_jobs;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let inference = &self.inference;

        check_unit("inference.equalization_weight", inference.equalization_weight as f64)?;
        check_unit("inference.min_detect_percent", inference.min_detect_percent)?;
        check_unit(
            "inference.default_confidence_threshold",
            inference.default_confidence_threshold as f64,
        )?;
        for (class_name, threshold) in &inference.confidence_overrides {
            check_unit(
                &format!("inference.confidence_overrides.{}", class_name),
                *threshold as f64,
            )?;
        }

        if inference.frame_check_interval == 0 {
            return Err(ConfigError::invalid(
                "inference.frame_check_interval",
                "must be greater than 0",
            ));
        }
        if inference.grace_period == 0 {
            return Err(ConfigError::invalid(
                "inference.grace_period",
                "must be greater than 0",
            ));
        }
        if inference.queue_capacity == 0 {
            return Err(ConfigError::invalid(
                "inference.queue_capacity",
                "must be greater than 0",
            ));
        }
        if inference.classifier_command.is_empty() {
            return Err(ConfigError::invalid(
                "inference.classifier_command",
                "must name a program",
            ));
        }
        if inference.clip_extension.trim().is_empty() {
            return Err(ConfigError::invalid(
                "inference.clip_extension",
                "must not be empty",
            ));
        }

        if self.scheduler.max_concurrent_jobs == 0 {
            return Err(ConfigError::invalid(
                "scheduler.max_concurrent_jobs",
                "must be greater than 0",
            ));
        }

        let (width, height) = self.folder.target_resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::invalid(
                "folder.target_resolution",
                format!("{}x{} is not a valid resolution", width, height),
            ));
        }

        let live = &self.live;
        if live.poll_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "live.poll_interval_secs",
                "must be greater than 0",
            ));
        }
        if live.status_command.is_empty() {
            return Err(ConfigError::invalid("live.status_command", "must name a program"));
        }
        if live.capture_command.is_empty() {
            return Err(ConfigError::invalid("live.capture_command", "must name a program"));
        }
        if !live.capture_command.iter().any(|arg| arg.contains("{output}")) {
            return Err(ConfigError::invalid(
                "live.capture_command",
                "must contain the {output} placeholder",
            ));
        }
        if live.channels.iter().any(|channel| channel.trim().is_empty()) {
            return Err(ConfigError::invalid("live.channels", "channel names must not be empty"));
        }

        Ok(())
    }
}

fn check_unit(key: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::invalid(key, format!("{} is outside 0..=1", value)))
    }
}

#[cfg(test)]
mod tests;
