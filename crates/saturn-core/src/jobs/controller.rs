//! The single authority over which job, if any, is being processed.
//!
//! All job and queue mutation happens here, on the caller's thread. The
//! worker reports back over an mpsc channel that the controller drains in
//! [`JobController::process_events`], [`JobController::wait_for_events`] or
//! [`JobController::run_until_idle`]; nothing is applied until one of these
//! is called.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::ControllerSettings;
use crate::frame::Image;
use crate::io::image_io::OutputFormat;
use crate::processor::{SequenceStacker, StackEngine};

use super::error::{JobError, Result};
use super::job::{Job, JobConfig, JobId};
use super::output::{output_path, ImageFileSaver, OutputSaver};
use super::progress::{coalesce, JobEvent, WorkerEvent, WorkerMessage, WorkerOutcome};
use super::queue::JobQueue;
use super::state::{JobState, Operation};
use super::worker::WorkerHandle;

pub struct JobController {
    engine: Arc<dyn StackEngine>,
    saver: Box<dyn OutputSaver>,
    settings: ControllerSettings,
    /// Job store. Identities grow monotonically, so key order is insertion order.
    jobs: BTreeMap<JobId, Job>,
    queue: JobQueue,
    /// The one worker allowed to run.
    worker: Option<WorkerHandle>,
    /// A pause or resume the worker has not acknowledged yet.
    pending_control: Option<Operation>,
    next_id: u64,
    worker_tx: mpsc::Sender<WorkerMessage>,
    worker_rx: mpsc::Receiver<WorkerMessage>,
    subscribers: Vec<mpsc::Sender<JobEvent>>,
}

impl JobController {
    pub fn new(
        engine: Arc<dyn StackEngine>,
        saver: Box<dyn OutputSaver>,
        settings: ControllerSettings,
    ) -> Self {
        let (worker_tx, worker_rx) = mpsc::channel();
        Self {
            engine,
            saver,
            settings,
            jobs: BTreeMap::new(),
            queue: JobQueue::new(),
            worker: None,
            pending_control: None,
            next_id: 1,
            worker_tx,
            worker_rx,
            subscribers: Vec::new(),
        }
    }

    /// Controller running the built-in stacker and saving to image files.
    pub fn with_stacker(settings: ControllerSettings) -> Self {
        Self::new(Arc::new(SequenceStacker), Box::new(ImageFileSaver), settings)
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: ControllerSettings) {
        self.settings = settings;
    }

    // ------------------------------------------------------------------
    // Job store and queue
    // ------------------------------------------------------------------

    /// Validate `config`, store the job as pending and queue it.
    pub fn add_job(&mut self, config: JobConfig) -> Result<JobId> {
        config.validate()?;
        let id = self.insert(Job::new(self.peek_id(), config))?;
        info!(job = %id, "Job added");
        Ok(id)
    }

    fn peek_id(&self) -> JobId {
        JobId(self.next_id)
    }

    fn insert(&mut self, job: Job) -> Result<JobId> {
        let id = job.id();
        self.queue.enqueue(id)?;
        self.jobs.insert(id, job);
        self.next_id += 1;
        Ok(id)
    }

    /// Remove a job that is not being processed.
    pub fn remove_job(&mut self, id: JobId) -> Result<Job> {
        if self.active_job() == Some(id) {
            return Err(JobError::JobActive(id));
        }
        let job = self.jobs.remove(&id).ok_or(JobError::UnknownJob(id))?;
        let _ = self.queue.remove(id);
        debug!(job = %id, "Job removed");
        Ok(job)
    }

    /// Remove a job, cancelling it first if it is being processed. Returns
    /// `false` when removal waits for the worker's terminal notification.
    pub fn stop_and_remove(&mut self, id: JobId) -> Result<bool> {
        let Some(worker) = self.worker.as_mut().filter(|w| w.job == id) else {
            return self.remove_job(id).map(|_| true);
        };
        worker.remove_when_finished = true;
        worker.control.request_stop();
        self.pending_control = None;
        info!(job = %id, "Stopping job for removal");
        Ok(false)
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// All jobs in the order they were added.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> + '_ {
        self.jobs.values()
    }

    /// Queued job identities, head first.
    pub fn queued(&self) -> Vec<JobId> {
        self.queue.iter().collect()
    }

    /// The job bound to the worker, if any.
    pub fn active_job(&self) -> Option<JobId> {
        self.worker.as_ref().map(|w| w.job)
    }

    pub fn is_idle(&self) -> bool {
        self.worker.is_none()
    }

    // ------------------------------------------------------------------
    // Processing control
    // ------------------------------------------------------------------

    /// Start the head of the queue if nothing is running.
    pub fn start_processing(&mut self) -> Result<Option<JobId>> {
        if !self.is_idle() {
            return Ok(None);
        }
        match self.queue.dequeue() {
            Some(id) => self.start_job(id).map(|()| Some(id)),
            None => Ok(None),
        }
    }

    /// Bind the worker to a specific pending job.
    pub fn start_job(&mut self, id: JobId) -> Result<()> {
        if let Some(active) = self.active_job() {
            return Err(JobError::WorkerBusy(active));
        }
        let job = self.jobs.get_mut(&id).ok_or(JobError::UnknownJob(id))?;
        let next = job.state.transition(JobState::Running)?;
        let _ = self.queue.remove(id);

        let config = job.config().clone();
        match WorkerHandle::spawn(id, config, Arc::clone(&self.engine), self.worker_tx.clone()) {
            Ok(handle) => {
                job.state = next;
                job.last_step_completed = None;
                job.total_steps = None;
                self.worker = Some(handle);
                self.pending_control = None;
                info!(job = %id, source = %job.source_path().display(), "Job started");
                self.emit(JobEvent::Started { job: id });
                Ok(())
            }
            Err(e) => {
                let error = JobError::ProcessingFailed(format!("cannot start worker: {e}"));
                self.fail_to_start(id, error.clone());
                Err(error)
            }
        }
    }

    /// Record a job whose worker never started as started and failed, then
    /// move on the way a finished worker would.
    fn fail_to_start(&mut self, id: JobId, error: JobError) {
        warn!(job = %id, error = %error, "Job could not be started");
        self.set_state(id, JobState::Running);
        self.set_state(id, JobState::Failed);
        if let Some(job) = self.jobs.get_mut(&id) {
            job.error = Some(error.clone());
        }
        self.emit(JobEvent::Finished {
            job: id,
            state: JobState::Failed,
            error: Some(error),
        });
        let resubmitted = self.resubmit(id);
        self.advance(JobState::Failed, resubmitted);
    }

    /// Ask the bound worker to stop. Idempotent; a no-op when idle.
    pub fn stop_processing(&mut self) {
        if let Some(worker) = &self.worker {
            if !worker.control.stop_requested() {
                info!(job = %worker.job, "Stop requested");
                worker.control.request_stop();
            }
            self.pending_control = None;
        }
    }

    /// Ask the running job to pause at its next step boundary.
    pub fn pause(&mut self) -> Result<()> {
        let state = self.controllable(Operation::Pause)?;
        if state != JobState::Running {
            return Err(JobError::InvalidTransition {
                operation: Operation::Pause,
                state: Some(state),
            });
        }
        if let Some(worker) = &self.worker {
            debug!(job = %worker.job, "Pause requested");
            worker.control.request_pause();
        }
        self.pending_control = Some(Operation::Pause);
        Ok(())
    }

    /// Let a paused job continue with its next step.
    pub fn resume(&mut self) -> Result<()> {
        let state = self.controllable(Operation::Resume)?;
        if state != JobState::Paused {
            return Err(JobError::InvalidTransition {
                operation: Operation::Resume,
                state: Some(state),
            });
        }
        if let Some(worker) = &self.worker {
            debug!(job = %worker.job, "Resume requested");
            worker.control.request_resume();
        }
        self.pending_control = Some(Operation::Resume);
        Ok(())
    }

    /// Pause a running job or resume a paused one; returns what was done.
    pub fn pause_resume(&mut self) -> Result<Operation> {
        match self.controllable(Operation::Pause)? {
            JobState::Paused => self.resume().map(|_| Operation::Resume),
            _ => self.pause().map(|_| Operation::Pause),
        }
    }

    /// State of the bound job, if a pause or resume may act on it now.
    fn controllable(&self, operation: Operation) -> Result<JobState> {
        let worker = self
            .worker
            .as_ref()
            .filter(|w| !w.control.stop_requested())
            .ok_or(JobError::InvalidTransition {
                operation,
                state: None,
            })?;
        if self.pending_control.is_some() {
            return Err(JobError::ControlPending);
        }
        self.jobs
            .get(&worker.job)
            .map(Job::state)
            .ok_or(JobError::UnknownJob(worker.job))
    }

    /// Save a finished job's stack on demand.
    pub fn save_stacked_image(&self, id: JobId, path: &Path, format: OutputFormat) -> Result<()> {
        let job = self.jobs.get(&id).ok_or(JobError::UnknownJob(id))?;
        let image = job.stacked_image().ok_or(JobError::NoStackedImage(id))?;
        self.save(image, path, format)
    }

    fn save(&self, image: &Image, path: &Path, format: OutputFormat) -> Result<()> {
        self.saver
            .save_stacked_image(image, path, format)
            .map_err(|e| JobError::OutputSaveFailed(format!("{}: {e}", path.display())))
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Receive every [`JobEvent`] published from now on.
    pub fn subscribe(&mut self) -> mpsc::Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: JobEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Apply everything the worker has reported so far without blocking.
    /// Returns the number of messages applied after coalescing.
    pub fn process_events(&mut self) -> usize {
        let drained: Vec<WorkerMessage> = self.worker_rx.try_iter().collect();
        self.apply(drained)
    }

    /// Block until the worker reports something or `timeout` elapses, then
    /// apply the burst. Returns whether anything was applied.
    pub fn wait_for_events(&mut self, timeout: Duration) -> bool {
        match self.worker_rx.recv_timeout(timeout) {
            Ok(first) => {
                let mut drained = vec![first];
                drained.extend(self.worker_rx.try_iter());
                self.apply(drained) > 0
            }
            Err(_) => false,
        }
    }

    /// Process until no worker is bound, auto-advancing through the queue.
    ///
    /// Blocks indefinitely while a job stays paused.
    pub fn run_until_idle(&mut self) {
        self.process_events();
        while !self.is_idle() {
            match self.worker_rx.recv() {
                Ok(first) => {
                    let mut drained = vec![first];
                    drained.extend(self.worker_rx.try_iter());
                    self.apply(drained);
                }
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, drained: Vec<WorkerMessage>) -> usize {
        let messages = coalesce(drained);
        let count = messages.len();
        for message in messages {
            self.handle(message);
        }
        count
    }

    fn handle(&mut self, message: WorkerMessage) {
        let WorkerMessage { job: id, event } = message;
        if self.active_job() != Some(id) {
            debug!(job = %id, "Ignoring message from unbound worker");
            return;
        }

        match event {
            WorkerEvent::Progress(notification) => {
                if let Some(job) = self.jobs.get_mut(&id) {
                    job.last_step_completed = Some(notification.step_index);
                    job.total_steps = Some(notification.total_steps);
                }
                debug!(
                    job = %id,
                    step = notification.step_index,
                    total = notification.total_steps,
                    "Progress"
                );
                self.emit(JobEvent::Progress(notification));
            }
            WorkerEvent::Paused { last_step } => {
                if self.set_state(id, JobState::Paused) {
                    info!(job = %id, ?last_step, "Job paused");
                    self.emit(JobEvent::Paused { job: id, last_step });
                }
                if self.pending_control == Some(Operation::Pause) {
                    self.pending_control = None;
                }
            }
            WorkerEvent::Resumed => {
                if self.set_state(id, JobState::Running) {
                    info!(job = %id, "Job resumed");
                    self.emit(JobEvent::Resumed { job: id });
                }
                if self.pending_control == Some(Operation::Resume) {
                    self.pending_control = None;
                }
            }
            WorkerEvent::Finished(outcome) => self.finish(id, outcome),
        }
    }

    /// Apply a transition to the store, logging rejected ones.
    fn set_state(&mut self, id: JobId, next: JobState) -> bool {
        let Some(job) = self.jobs.get_mut(&id) else {
            return false;
        };
        match job.state.transition(next) {
            Ok(state) => {
                job.state = state;
                true
            }
            Err(e) => {
                warn!(job = %id, error = %e, "Ignoring worker state change");
                false
            }
        }
    }

    fn finish(&mut self, id: JobId, outcome: WorkerOutcome) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let remove = worker.remove_when_finished;
        worker.join();
        self.pending_control = None;

        let (state, error) = match outcome {
            WorkerOutcome::Done {
                image,
                last_step,
                total_steps,
            } => {
                if let Some(job) = self.jobs.get_mut(&id) {
                    job.last_step_completed = Some(last_step);
                    job.total_steps = Some(total_steps);
                    job.stacked_image = Some(image);
                }
                (JobState::Done, None)
            }
            WorkerOutcome::Cancelled => (JobState::Cancelled, None),
            WorkerOutcome::Failed(err) => {
                if let Some(job) = self.jobs.get_mut(&id) {
                    job.error = Some(err.clone());
                }
                (JobState::Failed, Some(err))
            }
        };
        self.set_state(id, state);

        match &error {
            Some(err) => warn!(job = %id, error = %err, "Job failed"),
            None => info!(job = %id, %state, "Job finished"),
        }
        self.emit(JobEvent::Finished {
            job: id,
            state,
            error,
        });

        let mut resubmitted = false;
        if remove {
            self.jobs.remove(&id);
            debug!(job = %id, "Job removed after stop");
        } else {
            match state {
                JobState::Done => self.save_output(id),
                JobState::Failed => resubmitted = self.resubmit(id),
                _ => {}
            }
        }

        self.advance(state, resubmitted);
    }

    /// Start the next queued job after one ended in `state`, if the
    /// settings allow it.
    fn advance(&mut self, state: JobState, resubmitted: bool) {
        let advance = self.settings.auto_advance
            && (state != JobState::Failed || self.settings.advance_on_failure || resubmitted);
        if !advance {
            if !self.queue.is_empty() {
                info!(queued = self.queue.len(), "Not advancing the queue");
            }
            return;
        }
        if let Err(e) = self.start_processing() {
            warn!(error = %e, "Auto-advance could not start the next job");
        }
    }

    fn save_output(&mut self, id: JobId) {
        let Some(job) = self.jobs.get(&id) else {
            return;
        };
        let format = job
            .config()
            .output_format
            .unwrap_or(self.settings.output_format);
        let Some(path) = output_path(job.source_path(), &job.config().output, format) else {
            return;
        };
        let Some(image) = job.stacked_image() else {
            return;
        };

        let saved = self.save(image, &path, format);
        let Some(job) = self.jobs.get_mut(&id) else {
            return;
        };
        match saved {
            Ok(()) => {
                info!(job = %id, path = %path.display(), "Stacked image saved");
                job.output_path = Some(path.clone());
                self.emit(JobEvent::OutputSaved { job: id, path });
            }
            Err(error) => {
                warn!(job = %id, error = %error, "Stacked image not saved");
                job.output_error = Some(error.clone());
                self.emit(JobEvent::OutputSaveFailed { job: id, error });
            }
        }
    }

    /// Queue a fresh copy of a failed job while retries remain.
    fn resubmit(&mut self, failed: JobId) -> bool {
        let Some(job) = self.jobs.get(&failed) else {
            return false;
        };
        if job.attempt() >= self.settings.retry_failed {
            return false;
        }
        let mut retry = Job::new(self.peek_id(), job.config().clone());
        retry.attempt = job.attempt() + 1;
        retry.retry_of = Some(failed);
        let attempt = retry.attempt;

        match self.insert(retry) {
            Ok(id) => {
                info!(job = %id, failed = %failed, attempt, "Failed job resubmitted");
                self.emit(JobEvent::Resubmitted { failed, job: id });
                true
            }
            Err(e) => {
                warn!(job = %failed, error = %e, "Could not resubmit failed job");
                false
            }
        }
    }
}
