use std::path::PathBuf;

use thiserror::Error;

use super::job::JobId;
use super::state::{JobState, Operation};

/// Errors of the job subsystem.
///
/// `SourceUnreadable` and `ProcessingFailed` come out of the worker inside
/// its terminal notification and are stored on the failed job; the other
/// variants are returned synchronously by controller calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    #[error("Invalid job configuration: {0}")]
    ConfigurationInvalid(String),

    #[error("Cannot read {}: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Saving the stacked image failed: {0}")]
    OutputSaveFailed(String),

    #[error("Job {0} is already queued")]
    DuplicateJob(JobId),

    #[error("Job {0} is not queued")]
    NotQueued(JobId),

    #[error("Cannot {operation} {}", state_phrase(.state))]
    InvalidTransition {
        operation: Operation,
        state: Option<JobState>,
    },

    #[error("No job {0}")]
    UnknownJob(JobId),

    #[error("Job {0} is being processed; stop it first")]
    JobActive(JobId),

    #[error("Job {0} is already being processed")]
    WorkerBusy(JobId),

    #[error("A pause or resume request is still being acknowledged")]
    ControlPending,

    #[error("Job {0} has no stacked image")]
    NoStackedImage(JobId),
}

fn state_phrase(state: &Option<JobState>) -> String {
    match state {
        Some(s) => format!("a job that is {s}"),
        None => "when no job is being processed".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, JobError>;
