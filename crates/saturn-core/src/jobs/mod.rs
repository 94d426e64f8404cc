//! Job queue, job lifecycle and the controller that drives one background
//! worker through the queue.

pub mod controller;
pub mod error;
pub mod job;
pub mod output;
pub mod progress;
pub mod queue;
pub mod state;
mod worker;

pub use controller::JobController;
pub use error::JobError;
pub use job::{Job, JobConfig, JobId, OutputSaveMode};
pub use output::{ImageFileSaver, OutputSaver};
pub use progress::{JobEvent, ProgressNotification};
pub use queue::JobQueue;
pub use state::{JobState, Operation};
