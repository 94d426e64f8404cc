use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_REF_PT_PLACEMENT_THRESHOLD, MIN_REF_PT_SPACING};
use crate::frame::{CfaPattern, Image, Point};
use crate::io::image_io::OutputFormat;
use crate::processor::SequenceSettings;
use crate::quality::refpoints::RefPointPlacement;
use crate::quality::QualityCriterion;

use super::error::{JobError, Result};
use super::state::JobState;

/// Stable job identity, unique for the lifetime of a controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a finished stack is written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputSaveMode {
    /// Keep the stack in memory only; it can still be saved on request.
    None,
    /// Next to the source, named after it.
    #[default]
    AutoNextToSource,
    /// Into the given directory, named after the source.
    SpecifiedPath(PathBuf),
}

fn default_threshold() -> f32 {
    DEFAULT_REF_PT_PLACEMENT_THRESHOLD
}

/// Everything the user chose for one stacking task. Fixed once the job exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Image-series directory or video file.
    pub source_path: PathBuf,
    #[serde(default)]
    pub output: OutputSaveMode,
    /// Overrides the controller's output format.
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    /// Relative brightness threshold for automatic reference point placement.
    #[serde(default = "default_threshold")]
    pub ref_pt_placement_threshold: f32,
    #[serde(default)]
    pub ref_points: RefPointPlacement,
    /// Stabilization anchors; empty = placed automatically.
    #[serde(default)]
    pub anchors: Vec<Point>,
    #[serde(default)]
    pub quality: QualityCriterion,
    /// Flat-field image; `None` = no flat-fielding.
    #[serde(default)]
    pub flat_field: Option<PathBuf>,
    /// When not `None`, mono frames are demosaiced with this pattern.
    #[serde(default)]
    pub cfa_pattern: CfaPattern,
    /// Frames deactivated by the user.
    #[serde(default)]
    pub excluded_frames: BTreeSet<usize>,
}

impl JobConfig {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            output: OutputSaveMode::default(),
            output_format: None,
            ref_pt_placement_threshold: DEFAULT_REF_PT_PLACEMENT_THRESHOLD,
            ref_points: RefPointPlacement::default(),
            anchors: Vec::new(),
            quality: QualityCriterion::default(),
            flat_field: None,
            cfa_pattern: CfaPattern::None,
            excluded_frames: BTreeSet::new(),
        }
    }

    pub fn with_output(mut self, output: OutputSaveMode) -> Self {
        self.output = output;
        self
    }

    pub fn with_quality(mut self, quality: QualityCriterion) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_ref_points(mut self, ref_points: RefPointPlacement) -> Self {
        self.ref_points = ref_points;
        self
    }

    pub fn with_anchors(mut self, anchors: Vec<Point>) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn with_cfa_pattern(mut self, cfa: CfaPattern) -> Self {
        self.cfa_pattern = cfa;
        self
    }

    pub fn with_flat_field(mut self, path: impl Into<PathBuf>) -> Self {
        self.flat_field = Some(path.into());
        self
    }

    pub fn automatic_ref_points_placement(&self) -> bool {
        matches!(self.ref_points, RefPointPlacement::Automatic { .. })
    }

    /// Reject parameters no stacking run could use.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(JobError::ConfigurationInvalid(msg));

        if self.source_path.as_os_str().is_empty() {
            return invalid("source path is empty".into());
        }
        let t = self.ref_pt_placement_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return invalid(format!("reference point threshold {t} is outside [0, 1]"));
        }
        match &self.ref_points {
            RefPointPlacement::Automatic { spacing } if *spacing < MIN_REF_PT_SPACING => {
                return invalid(format!(
                    "reference point spacing {spacing} is below {MIN_REF_PT_SPACING} px"
                ));
            }
            RefPointPlacement::Manual(points) if points.is_empty() => {
                return invalid("manual reference point list is empty".into());
            }
            _ => {}
        }
        if let Err(msg) = self.quality.validate() {
            return invalid(msg);
        }
        if let Some(flat) = &self.flat_field {
            if flat.as_os_str().is_empty() {
                return invalid("flat-field path is empty".into());
            }
        }
        if let OutputSaveMode::SpecifiedPath(dir) = &self.output {
            if dir.as_os_str().is_empty() {
                return invalid("output directory is empty".into());
            }
        }
        Ok(())
    }

    pub fn sequence_settings(&self) -> SequenceSettings {
        SequenceSettings {
            anchors: self.anchors.clone(),
            quality: self.quality,
            flat_field: self.flat_field.clone(),
            excluded_frames: self.excluded_frames.clone(),
        }
    }
}

/// One stacking task: fixed identity and configuration plus the processing
/// state the controller records for it.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    config: JobConfig,
    pub(crate) state: JobState,
    pub(crate) last_step_completed: Option<usize>,
    pub(crate) total_steps: Option<usize>,
    pub(crate) stacked_image: Option<Image>,
    pub(crate) error: Option<JobError>,
    pub(crate) output_path: Option<PathBuf>,
    pub(crate) output_error: Option<JobError>,
    pub(crate) attempt: u32,
    pub(crate) retry_of: Option<JobId>,
}

impl Job {
    pub(crate) fn new(id: JobId, config: JobConfig) -> Self {
        Self {
            id,
            config,
            state: JobState::Pending,
            last_step_completed: None,
            total_steps: None,
            stacked_image: None,
            error: None,
            output_path: None,
            output_error: None,
            attempt: 0,
            retry_of: None,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn source_path(&self) -> &Path {
        &self.config.source_path
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn last_step_completed(&self) -> Option<usize> {
        self.last_step_completed
    }

    pub fn total_steps(&self) -> Option<usize> {
        self.total_steps
    }

    /// Present only once the job is `Done`.
    pub fn stacked_image(&self) -> Option<&Image> {
        self.stacked_image.as_ref()
    }

    /// Why the job failed.
    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    /// Where the stack was written automatically, if it was.
    pub fn output_path(&self) -> Option<&Path> {
        self.output_path.as_deref()
    }

    /// Why automatic saving failed; the job itself stays `Done`.
    pub fn output_error(&self) -> Option<&JobError> {
        self.output_error.as_ref()
    }

    /// Number of earlier failed attempts this job is a resubmission of.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn retry_of(&self) -> Option<JobId> {
        self.retry_of
    }

    /// Progress in percent, from the last delivered step.
    pub fn percentage(&self) -> Option<u32> {
        match (self.last_step_completed, self.total_steps) {
            (Some(step), Some(total)) if total > 0 => Some(percentage(step, total)),
            (None, Some(_)) => Some(0),
            _ => None,
        }
    }

    /// Short status line for job lists: failures show their cause instead
    /// of a percentage.
    pub fn status_text(&self) -> String {
        match (self.state, &self.error) {
            (JobState::Failed, Some(err)) => format!("failed: {err}"),
            (JobState::Running | JobState::Paused, _) => match self.percentage() {
                Some(p) => format!("{} {p}%", self.state),
                None => self.state.to_string(),
            },
            (state, _) => state.to_string(),
        }
    }
}

pub(crate) fn percentage(step: usize, total: usize) -> u32 {
    (((step + 1) * 100) / total.max(1)).min(100) as u32
}
