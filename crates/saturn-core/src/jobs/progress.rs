//! Messages crossing from the worker thread to the controller, and the
//! events the controller publishes to its subscribers.

use std::path::PathBuf;

use crate::frame::Image;

use super::error::JobError;
use super::job::{percentage, JobId};
use super::state::JobState;

/// Snapshot of a job's progress after a completed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressNotification {
    pub job: JobId,
    pub step_index: usize,
    pub total_steps: usize,
}

impl ProgressNotification {
    pub fn percentage(&self) -> u32 {
        percentage(self.step_index, self.total_steps)
    }
}

/// How a worker run ended.
#[derive(Debug)]
pub(crate) enum WorkerOutcome {
    Done {
        image: Image,
        last_step: usize,
        total_steps: usize,
    },
    Cancelled,
    Failed(JobError),
}

#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Progress(ProgressNotification),
    Paused { last_step: Option<usize> },
    Resumed,
    Finished(WorkerOutcome),
}

#[derive(Debug)]
pub(crate) struct WorkerMessage {
    pub job: JobId,
    pub event: WorkerEvent,
}

impl WorkerMessage {
    fn is_progress(&self) -> bool {
        matches!(self.event, WorkerEvent::Progress(_))
    }
}

/// Drop progress snapshots that are superseded by a later snapshot of the
/// same job before any other message of that job. State changes are never
/// dropped and the relative order of what remains is preserved.
pub(crate) fn coalesce(messages: Vec<WorkerMessage>) -> Vec<WorkerMessage> {
    let mut keep = vec![true; messages.len()];
    for i in 0..messages.len() {
        if !messages[i].is_progress() {
            continue;
        }
        let job = messages[i].job;
        if let Some(next) = messages[i + 1..].iter().find(|m| m.job == job) {
            keep[i] = !next.is_progress();
        }
    }
    messages
        .into_iter()
        .zip(keep)
        .filter_map(|(m, k)| k.then_some(m))
        .collect()
}

/// What subscribers hear about jobs.
#[derive(Clone, Debug, PartialEq)]
pub enum JobEvent {
    Started {
        job: JobId,
    },
    Progress(ProgressNotification),
    Paused {
        job: JobId,
        last_step: Option<usize>,
    },
    Resumed {
        job: JobId,
    },
    /// The job reached a terminal state; `error` is set for `Failed`.
    Finished {
        job: JobId,
        state: JobState,
        error: Option<JobError>,
    },
    OutputSaved {
        job: JobId,
        path: PathBuf,
    },
    OutputSaveFailed {
        job: JobId,
        error: JobError,
    },
    /// A failed job was submitted again as a new job.
    Resubmitted {
        failed: JobId,
        job: JobId,
    },
}

impl JobEvent {
    pub fn job(&self) -> JobId {
        match self {
            Self::Started { job }
            | Self::Paused { job, .. }
            | Self::Resumed { job }
            | Self::Finished { job, .. }
            | Self::OutputSaved { job, .. }
            | Self::OutputSaveFailed { job, .. }
            | Self::Resubmitted { job, .. } => *job,
            Self::Progress(n) => n.job,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(job: u64, step: usize) -> WorkerMessage {
        WorkerMessage {
            job: JobId(job),
            event: WorkerEvent::Progress(ProgressNotification {
                job: JobId(job),
                step_index: step,
                total_steps: 10,
            }),
        }
    }

    fn steps(messages: &[WorkerMessage]) -> Vec<Option<usize>> {
        messages
            .iter()
            .map(|m| match &m.event {
                WorkerEvent::Progress(n) => Some(n.step_index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn burst_keeps_latest_snapshot() {
        let out = coalesce(vec![progress(1, 0), progress(1, 1), progress(1, 2)]);
        assert_eq!(steps(&out), vec![Some(2)]);
    }

    #[test]
    fn state_changes_split_bursts() {
        let paused = WorkerMessage {
            job: JobId(1),
            event: WorkerEvent::Paused { last_step: Some(1) },
        };
        let out = coalesce(vec![progress(1, 0), progress(1, 1), paused, progress(1, 2)]);
        assert_eq!(steps(&out), vec![Some(1), None, Some(2)]);
    }

    #[test]
    fn empty_drain_is_empty() {
        assert!(coalesce(Vec::new()).is_empty());
    }
}
