use std::collections::VecDeque;

use super::error::{JobError, Result};
use super::job::JobId;

/// Pending job identities in insertion order.
///
/// The queue holds identities only; job data lives in the controller's
/// store. An identity appears at most once.
#[derive(Debug, Default, Clone)]
pub struct JobQueue {
    items: VecDeque<JobId>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, id: JobId) -> Result<()> {
        if self.contains(id) {
            return Err(JobError::DuplicateJob(id));
        }
        self.items.push_back(id);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<JobId> {
        self.items.pop_front()
    }

    pub fn remove(&mut self, id: JobId) -> Result<()> {
        let pos = self
            .items
            .iter()
            .position(|&queued| queued == id)
            .ok_or(JobError::NotQueued(id))?;
        self.items.remove(pos);
        Ok(())
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.items.contains(&id)
    }

    pub fn peek(&self) -> Option<JobId> {
        self.items.front().copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        self.items.iter().copied()
    }
}
