//! Frame processing engine
//!
//! The pipeline orchestrator wires a frame source, the processing stage and the
//! clip writer together over bounded queues.

pub mod annotate;
pub mod pipeline;
pub mod preprocess;
pub mod processor;
pub mod progress;

pub use pipeline::{ClipWriter, PipelineOrchestrator, PipelineReport, PipelineSettings};
pub use processor::{ClipForward, ClipFrame, FrameProcessor, ProcessorStats};
pub use progress::{ProgressCallback, ProgressTracker, TracingProgressCallback};
