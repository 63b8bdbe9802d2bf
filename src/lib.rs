//! Sightclip object-triggered video clipper library
//!
//! Decodes videos frame by frame, runs a classifier on a sampled subset of
//! frames and writes a clip per object class whenever that class is present for
//! a large enough share of a detection window. Recorded files, whole folders and
//! live channels all feed the same bounded job scheduler.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use config::{AppConfig, ConfigError};
pub use domain::errors::DomainError;
pub use domain::model::{ClassId, Detection, Frame, VideoInfo, VideoRef};
pub use error::{SightclipError, SightclipResult};
