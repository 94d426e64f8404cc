use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use saturn_core::config::BatchConfig;
use saturn_core::jobs::{JobConfig, JobController, JobEvent, JobId, JobState, OutputSaveMode};
use saturn_core::quality::refpoints::RefPointPlacement;
use saturn_core::quality::QualityCriterion;
use tracing::debug;

use super::{cfa_pattern, CfaArg, FormatArg};
use crate::summary::print_job_summary;

#[derive(Clone, Copy, ValueEnum)]
pub enum CriterionArg {
    /// Best N percent of frames
    Percentage,
    /// Best N frames
    Number,
    /// Frames at least N percent of the way from the worst to the best
    Relative,
}

#[derive(Args)]
pub struct RunArgs {
    /// SER videos or image-series directories, one job each
    pub sources: Vec<PathBuf>,

    /// Batch file with settings and jobs (see `saturn config`)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Threshold for the frame selection criterion
    #[arg(long, default_value = "30")]
    pub select: u32,

    /// How frames are selected for stacking
    #[arg(long, value_enum, default_value = "percentage")]
    pub criterion: CriterionArg,

    /// Reference point grid spacing in pixels
    #[arg(long)]
    pub spacing: Option<u32>,

    /// Relative brightness threshold for reference points (0-1)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Bayer pattern of raw mono frames
    #[arg(long, value_enum)]
    pub cfa: Option<CfaArg>,

    /// Flat-field image applied to every frame
    #[arg(long)]
    pub flat: Option<PathBuf>,

    /// Directory for stacked images (default: next to each source)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Output image format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Stop after the first job instead of working through the queue
    #[arg(long)]
    pub no_auto_advance: bool,

    /// Read commands from stdin: p = pause/resume, s = stop job, q = quit
    #[arg(short, long)]
    pub interactive: bool,
}

enum Command {
    PauseResume,
    Stop,
    Quit,
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut batch = match &args.config {
        Some(path) => read_batch(path)?,
        None => BatchConfig::default(),
    };
    batch
        .jobs
        .extend(args.sources.iter().map(|source| job_from_args(source, args)));
    if batch.jobs.is_empty() {
        bail!("No sources given");
    }
    if args.no_auto_advance {
        batch.settings.auto_advance = false;
    }
    if let Some(format) = args.format {
        batch.settings.output_format = format.into();
    }

    let mut ctrl = JobController::with_stacker(batch.settings);
    let events = ctrl.subscribe();

    let multi = MultiProgress::new();
    let style = ProgressStyle::default_bar()
        .template("{prefix:>16} [{bar:40}] {pos:>3}% {msg}")?
        .progress_chars("=> ");
    let mut bars = HashMap::new();
    for config in batch.jobs {
        let source = config.source_path.clone();
        let id = ctrl
            .add_job(config)
            .with_context(|| format!("Invalid job for {}", source.display()))?;
        bars.insert(id, job_bar(&multi, &style, id, &source));
    }

    let commands = if args.interactive {
        multi.println("Commands: p = pause/resume, s = stop current job, q = quit")?;
        Some(spawn_stdin_reader())
    } else {
        None
    };

    ctrl.start_processing()?;
    let mut quitting = false;
    while !ctrl.is_idle() {
        ctrl.wait_for_events(Duration::from_millis(100));
        for event in events.try_iter() {
            render(&event, &ctrl, &multi, &style, &mut bars);
        }
        let Some(commands) = &commands else {
            continue;
        };
        for command in commands.try_iter() {
            match command {
                Command::PauseResume => match ctrl.pause_resume() {
                    Ok(op) => debug!(%op, "Control request sent"),
                    Err(e) => multi.println(format!("  {e}"))?,
                },
                Command::Stop => ctrl.stop_processing(),
                Command::Quit if !quitting => {
                    quitting = true;
                    let mut settings = ctrl.settings().clone();
                    settings.auto_advance = false;
                    ctrl.set_settings(settings);
                    ctrl.stop_processing();
                }
                Command::Quit => {}
            }
        }
    }
    for event in events.try_iter() {
        render(&event, &ctrl, &multi, &style, &mut bars);
    }
    for bar in bars.values().filter(|b| !b.is_finished()) {
        bar.abandon_with_message("not started");
    }

    print_job_summary(ctrl.jobs());

    let failed = ctrl
        .jobs()
        .filter(|j| j.state() == JobState::Failed)
        .count();
    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

fn read_batch(path: &Path) -> Result<BatchConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid batch file {}", path.display()))
}

fn job_from_args(source: &Path, args: &RunArgs) -> JobConfig {
    let quality = match args.criterion {
        CriterionArg::Percentage => QualityCriterion::PercentageBest(args.select),
        CriterionArg::Number => QualityCriterion::NumberBest(args.select),
        CriterionArg::Relative => QualityCriterion::MinRelativeQuality(args.select),
    };
    let mut config = JobConfig::new(source)
        .with_quality(quality)
        .with_cfa_pattern(cfa_pattern(args.cfa));
    if let Some(spacing) = args.spacing {
        config = config.with_ref_points(RefPointPlacement::Automatic { spacing });
    }
    if let Some(threshold) = args.threshold {
        config.ref_pt_placement_threshold = threshold;
    }
    if let Some(flat) = &args.flat {
        config = config.with_flat_field(flat);
    }
    if let Some(dir) = &args.output_dir {
        config = config.with_output(OutputSaveMode::SpecifiedPath(dir.clone()));
    }
    config
}

fn job_bar(multi: &MultiProgress, style: &ProgressStyle, id: JobId, source: &Path) -> ProgressBar {
    let pb = multi.add(ProgressBar::new(100));
    pb.set_style(style.clone());
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());
    pb.set_prefix(format!("{id} {name}"));
    pb.set_message("queued");
    pb
}

fn render(
    event: &JobEvent,
    ctrl: &JobController,
    multi: &MultiProgress,
    style: &ProgressStyle,
    bars: &mut HashMap<JobId, ProgressBar>,
) {
    if let JobEvent::Resubmitted { failed, job } = event {
        if let Some(source) = ctrl.job(*job).map(|j| j.source_path().to_path_buf()) {
            bars.insert(*job, job_bar(multi, style, *job, &source));
        }
        let _ = multi.println(format!("  {failed} resubmitted as {job}"));
        return;
    }

    let Some(pb) = bars.get(&event.job()) else {
        return;
    };
    match event {
        JobEvent::Started { .. } | JobEvent::Resumed { .. } => pb.set_message("running"),
        JobEvent::Progress(n) => pb.set_position(n.percentage() as u64),
        JobEvent::Paused { .. } => pb.set_message("paused"),
        JobEvent::Finished { state, error, .. } => match error {
            Some(e) => pb.abandon_with_message(e.to_string()),
            None if *state == JobState::Done => pb.finish_with_message("done"),
            None => pb.abandon_with_message(state.to_string()),
        },
        JobEvent::OutputSaved { job, path } => {
            let _ = multi.println(format!("  {job} saved to {}", path.display()));
        }
        JobEvent::OutputSaveFailed { job, error } => {
            let _ = multi.println(format!("  {job}: {error}"));
        }
        JobEvent::Resubmitted { .. } => {}
    }
}

/// Forward single-letter commands from stdin until it closes.
fn spawn_stdin_reader() -> mpsc::Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = match line.trim() {
                "p" => Command::PauseResume,
                "s" => Command::Stop,
                "q" => Command::Quit,
                _ => continue,
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
    rx
}
