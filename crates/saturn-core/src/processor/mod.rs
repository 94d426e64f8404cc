//! The stacking engine boundary.
//!
//! The job worker only ever talks to a sequence through [`StackSequence`]:
//! configure it, place reference points, then advance it one step at a time
//! until it reports `done`. [`SequenceStacker`] is the built-in engine; tests
//! and other front ends can plug in their own.

mod stacker;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::frame::{CfaPattern, Image, Point};
use crate::quality::refpoints::RefPointPlacement;
use crate::quality::QualityCriterion;

pub use stacker::{SequenceStacker, StackerSequence};

/// Outcome of one executed step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepStatus {
    pub step_index: usize,
    pub total_steps: usize,
    pub done: bool,
}

/// Per-sequence processing parameters, applied before the first step.
#[derive(Clone, Debug, Default)]
pub struct SequenceSettings {
    /// Stabilization anchors; empty means choose automatically.
    pub anchors: Vec<Point>,
    pub quality: QualityCriterion,
    pub flat_field: Option<PathBuf>,
    /// Frames left out of processing entirely.
    pub excluded_frames: BTreeSet<usize>,
}

/// Opens sequences. Shared between the controller and its worker thread.
pub trait StackEngine: Send + Sync {
    /// Open the frames at `source` (image-series directory or video file).
    fn open_sequence(&self, source: &Path, cfa: CfaPattern) -> Result<Box<dyn StackSequence>>;
}

/// One opened sequence, driven step by step from a single thread.
pub trait StackSequence: Send {
    fn configure(&mut self, settings: &SequenceSettings) -> Result<()>;

    /// `threshold` is the relative brightness cutoff used by automatic
    /// placement; manual placement ignores it.
    fn place_reference_points(&mut self, placement: &RefPointPlacement, threshold: f32)
        -> Result<()>;

    /// Perform the next unit of work.
    fn execute_step(&mut self) -> Result<StepStatus>;

    /// Hand over the finished stack. `None` until the final step succeeded,
    /// and after it has been taken once.
    fn take_stacked_image(&mut self) -> Option<Image>;
}
