// Application layer - Job scheduling and the video sources feeding it

pub mod container;
pub mod folder;
pub mod live;
pub mod scheduler;

pub use container::{AppContainer, DefaultAppContainer};
pub use folder::{FolderIngest, ResizeStep};
pub use live::{ChannelRegistry, LiveSettings, LiveSourceManager};
pub use scheduler::{JobOutcome, JobQueue, JobRunner, JobScheduler, PipelineJobRunner, SchedulerHandle};
