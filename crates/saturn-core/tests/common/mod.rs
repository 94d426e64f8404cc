#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ndarray::Array2;

use saturn_core::config::ControllerSettings;
use saturn_core::error::{Result, SaturnError};
use saturn_core::frame::{CfaPattern, Frame, Image};
use saturn_core::io::image_io::OutputFormat;
use saturn_core::io::ser::SER_HEADER_SIZE;
use saturn_core::jobs::{JobController, JobEvent, JobId, JobState, OutputSaver};
use saturn_core::processor::{SequenceSettings, StackEngine, StackSequence, StepStatus};
use saturn_core::quality::refpoints::RefPointPlacement;

// ---------------------------------------------------------------------------
// SER files
// ---------------------------------------------------------------------------

/// Build a SER file header for mono 8-bit frames.
pub fn build_ser_header(width: u32, height: u32, num_frames: usize) -> Vec<u8> {
    build_ser_header_full(width, height, 8, num_frames, 0)
}

/// Build a SER file header with configurable bit depth and color mode.
///
/// `color_id`: 0=MONO, 8=BAYER_RGGB, 9=BAYER_GRBG, 10=BAYER_GBRG, 11=BAYER_BGGR,
///             100=RGB, 101=BGR
pub fn build_ser_header_full(
    width: u32,
    height: u32,
    bit_depth: u32,
    num_frames: usize,
    color_id: i32,
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SER_HEADER_SIZE);
    buf.extend_from_slice(b"LUCAM-RECORDER");
    // LuID, ColorID, LittleEndian
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&color_id.to_le_bytes());
    buf.extend_from_slice(&0i32.to_le_bytes());
    buf.extend_from_slice(&(width as i32).to_le_bytes());
    buf.extend_from_slice(&(height as i32).to_le_bytes());
    buf.extend_from_slice(&(bit_depth as i32).to_le_bytes());
    buf.extend_from_slice(&(num_frames as i32).to_le_bytes());
    // Observer, Instrument, Telescope
    buf.extend_from_slice(&[0u8; 120]);
    // DateTime, DateTimeUTC
    buf.extend_from_slice(&[0u8; 16]);

    assert_eq!(buf.len(), SER_HEADER_SIZE);
    buf
}

pub fn build_ser_with_frames(width: u32, height: u32, frames: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = build_ser_header(width, height, frames.len());
    for frame in frames {
        buf.extend_from_slice(frame);
    }
    buf
}

/// A limb-darkened disc with one dark spot on a dark background, shifted by
/// `(dx, dy)`.
pub fn planet_frame(width: u32, height: u32, dx: i32, dy: i32) -> Vec<u8> {
    let (cx, cy) = (width as f32 / 2.0 + dx as f32, height as f32 / 2.0 + dy as f32);
    let radius = width.min(height) as f32 / 4.0;
    let (sx, sy) = (cx + radius / 2.0, cy - radius / 3.0);
    let mut data = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let (x, y) = (x as f32, y as f32);
            let r = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            let spot = ((x - sx).powi(2) + (y - sy).powi(2)).sqrt() <= 3.0;
            let value = if r > radius {
                10.0
            } else if spot {
                40.0
            } else {
                120.0 + 100.0 * (1.0 - r / radius)
            };
            data.push(value as u8);
        }
    }
    data
}

/// Write `data` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write test file");
    path
}

// ---------------------------------------------------------------------------
// Scripted stack engine
// ---------------------------------------------------------------------------

/// What a scripted sequence does when opened and stepped.
#[derive(Clone, Default)]
pub struct Script {
    pub steps: usize,
    /// Step that returns an error instead of completing.
    pub fail_at: Option<usize>,
    pub fail_open: bool,
    /// Step that panics inside the sequence.
    pub panic_at: Option<usize>,
    /// Step counter jumps back to 0 after this step.
    pub rewind_after: Option<usize>,
    /// Each step waits for one token from this channel.
    pub gate: Option<Arc<Mutex<Receiver<()>>>>,
}

impl Script {
    pub fn steps(steps: usize) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    pub fn failing_at(steps: usize, step: usize) -> Self {
        Self {
            steps,
            fail_at: Some(step),
            ..Self::default()
        }
    }

    pub fn panicking_at(steps: usize, step: usize) -> Self {
        Self {
            steps,
            panic_at: Some(step),
            ..Self::default()
        }
    }

    pub fn unreadable() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    /// Steps that only run when the returned sender releases them.
    pub fn gated(steps: usize) -> (Self, Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let script = Self {
            steps,
            gate: Some(Arc::new(Mutex::new(rx))),
            ..Self::default()
        };
        (script, tx)
    }
}

/// Engine whose sequences follow a [`Script`] chosen by source path.
#[derive(Default)]
pub struct ScriptedEngine {
    scripts: HashMap<PathBuf, Script>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: &str, script: Script) -> Self {
        self.scripts.insert(PathBuf::from(source), script);
        self
    }
}

impl StackEngine for ScriptedEngine {
    fn open_sequence(&self, source: &Path, _cfa: CfaPattern) -> Result<Box<dyn StackSequence>> {
        let script = self
            .scripts
            .get(source)
            .ok_or_else(|| SaturnError::UnsupportedSource(source.to_path_buf()))?;
        if script.fail_open {
            return Err(SaturnError::UnsupportedSource(source.to_path_buf()));
        }
        Ok(Box::new(ScriptedSequence {
            script: script.clone(),
            next: 0,
            placed: false,
            result: None,
        }))
    }
}

struct ScriptedSequence {
    script: Script,
    next: usize,
    placed: bool,
    result: Option<Image>,
}

impl StackSequence for ScriptedSequence {
    fn configure(&mut self, _settings: &SequenceSettings) -> Result<()> {
        Ok(())
    }

    fn place_reference_points(&mut self, _placement: &RefPointPlacement, _threshold: f32) -> Result<()> {
        self.placed = true;
        Ok(())
    }

    fn execute_step(&mut self) -> Result<StepStatus> {
        assert!(self.placed, "reference points must be placed before stepping");
        if let Some(gate) = &self.script.gate {
            let _ = gate.lock().unwrap().recv();
        }
        let step = self.next;
        if self.script.panic_at == Some(step) {
            panic!("scripted panic at step {step}");
        }
        if self.script.fail_at == Some(step) {
            return Err(SaturnError::Processing(format!("scripted failure at step {step}")));
        }
        self.next = if self.script.rewind_after == Some(step) { 0 } else { step + 1 };
        let done = step + 1 == self.script.steps;
        if done {
            self.result = Some(Image::Mono(Frame::new(Array2::from_elem((4, 4), 0.5), 16)));
        }
        Ok(StepStatus {
            step_index: step,
            total_steps: self.script.steps,
            done,
        })
    }

    fn take_stacked_image(&mut self) -> Option<Image> {
        self.result.take()
    }
}

// ---------------------------------------------------------------------------
// Output saver
// ---------------------------------------------------------------------------

/// Records save requests instead of writing files.
#[derive(Clone, Default)]
pub struct RecordingSaver {
    pub saved: Arc<Mutex<Vec<(PathBuf, OutputFormat)>>>,
    pub fail: bool,
}

impl RecordingSaver {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.saved.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

impl OutputSaver for RecordingSaver {
    fn save_stacked_image(&self, _image: &Image, path: &Path, format: OutputFormat) -> Result<()> {
        if self.fail {
            return Err(SaturnError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only volume",
            )));
        }
        self.saved.lock().unwrap().push((path.to_path_buf(), format));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Controller helpers
// ---------------------------------------------------------------------------

pub fn controller(engine: ScriptedEngine, saver: RecordingSaver) -> JobController {
    JobController::new(Arc::new(engine), Box::new(saver), ControllerSettings::default())
}

pub fn controller_with(
    engine: ScriptedEngine,
    saver: RecordingSaver,
    settings: ControllerSettings,
) -> JobController {
    JobController::new(Arc::new(engine), Box::new(saver), settings)
}

/// Process worker messages until `done` holds for the events seen so far.
pub fn pump_until(
    ctrl: &mut JobController,
    events: &Receiver<JobEvent>,
    seen: &mut Vec<JobEvent>,
    done: impl Fn(&[JobEvent]) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        seen.extend(events.try_iter());
        if done(seen) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out, events so far: {seen:?}");
        ctrl.wait_for_events(Duration::from_millis(50));
    }
}

/// Step indices reported for `job`, in delivery order.
pub fn steps_of(events: &[JobEvent], job: JobId) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress(n) if n.job == job => Some(n.step_index),
            _ => None,
        })
        .collect()
}

pub fn finished(events: &[JobEvent], job: JobId) -> Option<JobState> {
    events.iter().find_map(|e| match e {
        JobEvent::Finished { job: j, state, .. } if *j == job => Some(*state),
        _ => None,
    })
}

pub fn position(events: &[JobEvent], pred: impl Fn(&JobEvent) -> bool) -> Option<usize> {
    events.iter().position(pred)
}
