use serde::{Deserialize, Serialize};

use crate::io::image_io::OutputFormat;
use crate::jobs::JobConfig;

/// How the controller treats the queue around finished jobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Start the next queued job when one finishes.
    pub auto_advance: bool,
    /// Keep advancing after a job fails.
    pub advance_on_failure: bool,
    /// How many times a failed job is resubmitted as a new job.
    pub retry_failed: u32,
    /// Format for automatically saved stacks, unless the job overrides it.
    pub output_format: OutputFormat,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            auto_advance: true,
            advance_on_failure: true,
            retry_failed: 0,
            output_format: OutputFormat::Tiff16,
        }
    }
}

/// A batch of jobs plus the controller settings to run them with.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub settings: ControllerSettings,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}
