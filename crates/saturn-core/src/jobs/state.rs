//! Job lifecycle.
//!
//! ```text
//! Pending -> Running -> { Done, Failed, Cancelled }
//!            Running <-> Paused
//!            Paused  -> Cancelled
//! ```

use serde::{Deserialize, Serialize};

use super::error::{JobError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Paused,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }

    /// Whether a worker is (or may still be) bound to a job in this state.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }

    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Paused)
                | (Running, Done)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Cancelled)
        )
    }

    /// Move to `next`, or report which operation the move corresponds to
    /// and why it is not allowed.
    pub fn transition(self, next: JobState) -> Result<JobState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(JobError::InvalidTransition {
                operation: Operation::leading_to(self, next),
                state: Some(self),
            })
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Control operations acting on the job state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Start,
    Pause,
    Resume,
    Stop,
    Finish,
}

impl Operation {
    /// The operation that asks for `from -> to`. Only a worker's own resume
    /// moves a job out of `Paused`; every other way into `Running` is a start.
    fn leading_to(from: JobState, to: JobState) -> Self {
        match to {
            JobState::Running if from == JobState::Paused => Self::Resume,
            JobState::Running => Self::Start,
            JobState::Paused => Self::Pause,
            JobState::Cancelled => Self::Stop,
            _ => Self::Finish,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
            Self::Stop => write!(f, "stop"),
            Self::Finish => write!(f, "finish"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        for terminal in [JobState::Done, JobState::Failed, JobState::Cancelled] {
            assert!(terminal.is_terminal());
            for next in [
                JobState::Pending,
                JobState::Running,
                JobState::Paused,
                JobState::Done,
                JobState::Failed,
                JobState::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn resume_returns_to_running_not_pending() {
        assert!(JobState::Paused.can_transition_to(JobState::Running));
        assert!(!JobState::Paused.can_transition_to(JobState::Pending));
    }

    #[test]
    fn pending_cannot_skip_running() {
        assert!(!JobState::Pending.can_transition_to(JobState::Done));
        assert!(!JobState::Pending.can_transition_to(JobState::Paused));
    }

    #[test]
    fn restarting_finished_job_is_rejected_as_start() {
        let err = JobState::Cancelled.transition(JobState::Running).unwrap_err();
        assert_eq!(
            err,
            JobError::InvalidTransition {
                operation: Operation::Start,
                state: Some(JobState::Cancelled),
            }
        );
        assert_eq!(
            JobState::Paused.transition(JobState::Running),
            Ok(JobState::Running)
        );
        let err = JobState::Done.transition(JobState::Paused).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { operation: Operation::Pause, .. }));
    }
}
