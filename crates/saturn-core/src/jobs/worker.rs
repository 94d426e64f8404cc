//! The background worker driving one job through a stack sequence.
//!
//! The worker owns the sequence for the whole run and reports everything it
//! does over the progress channel; it never touches the job store or the
//! queue. Pause and stop requests are flags checked between steps, so a step
//! in progress always completes.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use crate::processor::{StackEngine, StackSequence};

use super::error::JobError;
use super::job::{JobConfig, JobId};
use super::progress::{ProgressNotification, WorkerEvent, WorkerMessage, WorkerOutcome};

#[derive(Debug, Default)]
struct Flags {
    pause: bool,
    stop: bool,
}

/// Cooperative control flags shared by the controller and one worker.
#[derive(Debug, Default)]
pub(crate) struct WorkerControl {
    flags: Mutex<Flags>,
    wake: Condvar,
}

enum Checkpoint {
    Continue,
    Stop,
}

impl WorkerControl {
    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn request_pause(&self) {
        self.lock().pause = true;
    }

    pub fn request_resume(&self) {
        self.lock().pause = false;
        self.wake.notify_all();
    }

    pub fn request_stop(&self) {
        self.lock().stop = true;
        self.wake.notify_all();
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stop
    }

    /// Step boundary. Blocks without spinning while paused; `on_pause` and
    /// `on_resume` announce the suspension and its end.
    fn checkpoint(&self, on_pause: impl FnOnce(), on_resume: impl FnOnce()) -> Checkpoint {
        let mut flags = self.lock();
        if flags.stop {
            return Checkpoint::Stop;
        }
        if !flags.pause {
            return Checkpoint::Continue;
        }

        on_pause();
        while flags.pause && !flags.stop {
            flags = self
                .wake
                .wait(flags)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if flags.stop {
            return Checkpoint::Stop;
        }
        on_resume();
        Checkpoint::Continue
    }
}

/// The controller's side of a running worker.
pub(crate) struct WorkerHandle {
    pub job: JobId,
    pub control: Arc<WorkerControl>,
    /// Remove the job from the store once the worker finishes.
    pub remove_when_finished: bool,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Spawn the worker thread for `job`.
    pub fn spawn(
        job: JobId,
        config: JobConfig,
        engine: Arc<dyn StackEngine>,
        tx: mpsc::Sender<WorkerMessage>,
    ) -> std::io::Result<Self> {
        let control = Arc::new(WorkerControl::default());
        let worker_control = Arc::clone(&control);
        let thread = std::thread::Builder::new()
            .name(format!("saturn-worker-{}", job.0))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_job(job, &config, engine.as_ref(), &worker_control, &tx)
                }))
                .unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    warn!(job = %job, %reason, "Worker panicked");
                    WorkerOutcome::Failed(JobError::ProcessingFailed(format!(
                        "worker panicked: {reason}"
                    )))
                });
                let _ = tx.send(WorkerMessage {
                    job,
                    event: WorkerEvent::Finished(outcome),
                });
            })?;

        Ok(Self {
            job,
            control,
            remove_when_finished: false,
            thread: Some(thread),
        })
    }

    /// Wait for the thread to exit. Called after its terminal message.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(job = %self.job, "Worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            self.control.request_stop();
            let _ = thread.join();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn send(tx: &mpsc::Sender<WorkerMessage>, job: JobId, event: WorkerEvent) {
    let _ = tx.send(WorkerMessage { job, event });
}

/// Open and prepare the sequence, then run the step loop.
fn run_job(
    job: JobId,
    config: &JobConfig,
    engine: &dyn StackEngine,
    control: &WorkerControl,
    tx: &mpsc::Sender<WorkerMessage>,
) -> WorkerOutcome {
    info!(job = %job, source = %config.source_path.display(), "Worker started");
    match prepare(config, engine) {
        Ok(sequence) => step_loop(job, sequence, control, tx),
        Err(err) => {
            warn!(job = %job, error = %err, "Could not prepare sequence");
            WorkerOutcome::Failed(err)
        }
    }
}

fn prepare(
    config: &JobConfig,
    engine: &dyn StackEngine,
) -> Result<Box<dyn StackSequence>, JobError> {
    let source: &Path = &config.source_path;
    let mut sequence = engine
        .open_sequence(source, config.cfa_pattern)
        .map_err(|e| JobError::SourceUnreadable {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    sequence
        .configure(&config.sequence_settings())
        .map_err(|e| JobError::ProcessingFailed(e.to_string()))?;
    sequence
        .place_reference_points(&config.ref_points, config.ref_pt_placement_threshold)
        .map_err(|e| JobError::ProcessingFailed(e.to_string()))?;
    Ok(sequence)
}

fn step_loop(
    job: JobId,
    mut sequence: Box<dyn StackSequence>,
    control: &WorkerControl,
    tx: &mpsc::Sender<WorkerMessage>,
) -> WorkerOutcome {
    let mut last_step: Option<usize> = None;

    loop {
        let checkpoint = control.checkpoint(
            || {
                debug!(job = %job, ?last_step, "Worker paused");
                send(tx, job, WorkerEvent::Paused { last_step });
            },
            || {
                debug!(job = %job, "Worker resumed");
                send(tx, job, WorkerEvent::Resumed);
            },
        );
        if let Checkpoint::Stop = checkpoint {
            info!(job = %job, ?last_step, "Worker stopped");
            return WorkerOutcome::Cancelled;
        }

        let status = match sequence.execute_step() {
            Ok(status) => status,
            Err(e) => {
                warn!(job = %job, error = %e, "Step failed");
                return WorkerOutcome::Failed(JobError::ProcessingFailed(e.to_string()));
            }
        };

        if last_step.is_some_and(|prev| status.step_index < prev) {
            return WorkerOutcome::Failed(JobError::ProcessingFailed(format!(
                "step {} reported after step {}",
                status.step_index,
                last_step.unwrap_or_default()
            )));
        }
        last_step = Some(status.step_index);
        send(
            tx,
            job,
            WorkerEvent::Progress(ProgressNotification {
                job,
                step_index: status.step_index,
                total_steps: status.total_steps,
            }),
        );

        if status.done {
            if status.step_index + 1 != status.total_steps {
                return WorkerOutcome::Failed(JobError::ProcessingFailed(format!(
                    "sequence finished at step {} of {}",
                    status.step_index + 1,
                    status.total_steps
                )));
            }
            return match sequence.take_stacked_image() {
                Some(image) => {
                    info!(job = %job, steps = status.total_steps, "Worker finished");
                    WorkerOutcome::Done {
                        image,
                        last_step: status.step_index,
                        total_steps: status.total_steps,
                    }
                }
                None => WorkerOutcome::Failed(JobError::ProcessingFailed(
                    "no stacked image was produced".into(),
                )),
            };
        }
    }
}
