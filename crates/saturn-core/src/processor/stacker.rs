use std::path::Path;

use ndarray::Array2;
use tracing::{debug, info};

use crate::align::{suggest_anchor, AnchorTracker};
use crate::error::{Result, SaturnError};
use crate::frame::{AlignmentOffset, CfaPattern, Image, Point};
use crate::io::FrameSource;
use crate::quality::refpoints::{place_on_grid, RefPointPlacement};
use crate::quality::{frame_quality, select_frames};
use crate::stack::{FlatField, MeanAccumulator};

use super::{SequenceSettings, StackEngine, StackSequence, StepStatus};

/// Built-in engine: anchor stabilization, reference-point quality
/// estimation, best-frame selection and mean stacking.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceStacker;

impl StackEngine for SequenceStacker {
    fn open_sequence(&self, source: &Path, cfa: CfaPattern) -> Result<Box<dyn StackSequence>> {
        Ok(Box::new(StackerSequence::open(source, cfa)?))
    }
}

/// A sequence processed in two passes of one step per frame.
///
/// Steps `0..n` track the anchors and measure the quality of each active
/// frame; steps `n..2n` accumulate the frames picked by the quality
/// criterion. The stack is finished by step `2n - 1`.
pub struct StackerSequence {
    source: FrameSource,
    settings: SequenceSettings,
    /// Indices of the frames taking part, in source order.
    active: Vec<usize>,
    reference: Option<Array2<f32>>,
    flat: Option<FlatField>,
    tracker: Option<AnchorTracker>,
    ref_points: Vec<Point>,
    offsets: Vec<AlignmentOffset>,
    qualities: Vec<f64>,
    selected: Option<Vec<bool>>,
    accumulator: Option<MeanAccumulator>,
    next_step: usize,
    result: Option<Image>,
}

impl StackerSequence {
    pub fn open(source: &Path, cfa: CfaPattern) -> Result<Self> {
        let frames = FrameSource::open(source, cfa)?;
        if frames.frame_count() == 0 {
            return Err(SaturnError::EmptySequence);
        }
        info!(
            source = %source.display(),
            frames = frames.frame_count(),
            color = frames.is_color(),
            "Opened sequence"
        );
        Ok(Self {
            active: (0..frames.frame_count()).collect(),
            source: frames,
            settings: SequenceSettings::default(),
            reference: None,
            flat: None,
            tracker: None,
            ref_points: Vec::new(),
            offsets: Vec::new(),
            qualities: Vec::new(),
            selected: None,
            accumulator: None,
            next_step: 0,
            result: None,
        })
    }

    pub fn total_steps(&self) -> usize {
        self.active.len() * 2
    }

    pub fn reference_points(&self) -> &[Point] {
        &self.ref_points
    }

    pub fn anchors(&self) -> &[Point] {
        self.tracker.as_ref().map(AnchorTracker::anchors).unwrap_or(&[])
    }

    /// Quality of every active frame measured so far.
    pub fn frame_qualities(&self) -> &[f64] {
        &self.qualities
    }

    /// Number of frames chosen for stacking, once the selection is made.
    pub fn selected_count(&self) -> Option<usize> {
        self.selected
            .as_ref()
            .map(|mask| mask.iter().filter(|&&s| s).count())
    }

    fn load(&self, index: usize) -> Result<Image> {
        let mut image = self.source.read(index)?;
        if let Some(flat) = &self.flat {
            flat.apply(&mut image)?;
        }
        Ok(image)
    }

    fn estimate_step(&mut self, k: usize) -> Result<()> {
        let mono = self.load(self.active[k])?.to_mono();
        let tracker = self
            .tracker
            .as_mut()
            .ok_or_else(|| SaturnError::Processing("sequence not configured".into()))?;
        let offset = tracker.track(&mono.data);
        let quality = frame_quality(&mono.data, &self.ref_points, offset);
        debug!(frame = self.active[k], dx = offset.dx, dy = offset.dy, quality, "Estimated frame");
        self.offsets.push(offset);
        self.qualities.push(quality);
        Ok(())
    }

    fn stack_step(&mut self, k: usize) -> Result<()> {
        if self.selected.is_none() {
            let chosen = select_frames(&self.qualities, self.settings.quality);
            let mut mask = vec![false; self.active.len()];
            for i in &chosen {
                mask[*i] = true;
            }
            info!(selected = chosen.len(), total = mask.len(), criterion = %self.settings.quality, "Selected frames");
            self.selected = Some(mask);
            self.accumulator = Some(MeanAccumulator::new(
                self.source.height(),
                self.source.width(),
                self.source.is_color(),
            ));
        }

        let chosen = self.selected.as_ref().map(|m| m[k]).unwrap_or(false);
        if chosen {
            let image = self.load(self.active[k])?;
            let offset = self.offsets[k];
            if let Some(acc) = self.accumulator.as_mut() {
                acc.add(&image, offset)?;
            }
        }

        if k + 1 == self.active.len() {
            let acc = self
                .accumulator
                .take()
                .ok_or_else(|| SaturnError::Processing("no accumulator".into()))?;
            info!(frames = acc.frame_count(), "Stack finished");
            self.result = Some(acc.finish()?);
        }
        Ok(())
    }
}

impl StackSequence for StackerSequence {
    fn configure(&mut self, settings: &SequenceSettings) -> Result<()> {
        self.settings = settings.clone();
        self.active = (0..self.source.frame_count())
            .filter(|i| !settings.excluded_frames.contains(i))
            .collect();
        let first = *self.active.first().ok_or(SaturnError::EmptySequence)?;

        self.flat = match &settings.flat_field {
            Some(path) => Some(FlatField::load(path)?),
            None => None,
        };

        let reference = self.load(first)?.to_mono().data;
        let anchors = if settings.anchors.is_empty() {
            let anchor = suggest_anchor(&reference);
            debug!(%anchor, "Placed anchor automatically");
            vec![anchor]
        } else {
            settings.anchors.clone()
        };
        self.tracker = Some(AnchorTracker::new(&reference, &anchors)?);
        self.reference = Some(reference);
        Ok(())
    }

    fn place_reference_points(
        &mut self,
        placement: &RefPointPlacement,
        threshold: f32,
    ) -> Result<()> {
        self.ref_points = match placement {
            RefPointPlacement::Manual(points) => points.clone(),
            RefPointPlacement::Automatic { spacing } => {
                let reference = self
                    .reference
                    .as_ref()
                    .ok_or_else(|| SaturnError::Processing("sequence not configured".into()))?;
                place_on_grid(reference, *spacing, threshold)
            }
        };
        if self.ref_points.is_empty() {
            return Err(SaturnError::NoReferencePoints);
        }
        debug!(count = self.ref_points.len(), "Placed reference points");
        self.reference = None;
        Ok(())
    }

    fn execute_step(&mut self) -> Result<StepStatus> {
        let n = self.active.len();
        let total = self.total_steps();
        let step = self.next_step;
        if step >= total {
            return Err(SaturnError::Processing("sequence already finished".into()));
        }

        if step < n {
            self.estimate_step(step)?;
        } else {
            self.stack_step(step - n)?;
        }

        self.next_step += 1;
        Ok(StepStatus {
            step_index: step,
            total_steps: total,
            done: step + 1 == total,
        })
    }

    fn take_stacked_image(&mut self) -> Option<Image> {
        self.result.take()
    }
}
