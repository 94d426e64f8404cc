//! Flat-field correction.
//!
//! A flat is stored normalized to a mean of 1.0; frames are divided by it
//! pixel by pixel to remove vignetting and dust shadows.

use std::path::Path;

use ndarray::{Array2, Zip};
use tracing::info;

use crate::consts::FLAT_FIELD_MIN_VALUE;
use crate::error::{Result, SaturnError};
use crate::frame::{CfaPattern, Frame, Image};
use crate::io::image_io::load_image;
use crate::io::FrameSource;

#[derive(Clone, Debug)]
pub struct FlatField {
    gain: Array2<f32>,
}

impl FlatField {
    /// Normalize raw flat data to a mean of 1.0.
    pub fn from_array(data: Array2<f32>) -> Result<Self> {
        let mean = data.mean().unwrap_or(0.0);
        if mean <= FLAT_FIELD_MIN_VALUE {
            return Err(SaturnError::Processing("flat field is black".into()));
        }
        Ok(Self { gain: data / mean })
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_array(load_image(path)?.data)
    }

    pub fn width(&self) -> usize {
        self.gain.ncols()
    }

    pub fn height(&self) -> usize {
        self.gain.nrows()
    }

    /// The normalized flat as a frame, scaled into [0, 1] for saving.
    pub fn to_frame(&self) -> Frame {
        let max = self.gain.iter().cloned().fold(0.0f32, f32::max).max(FLAT_FIELD_MIN_VALUE);
        Frame::new(&self.gain / max, 16)
    }

    /// Divide every plane of `image` by the flat.
    pub fn apply(&self, image: &mut Image) -> Result<()> {
        if image.width() != self.width() || image.height() != self.height() {
            return Err(SaturnError::DimensionMismatch {
                width: self.width(),
                height: self.height(),
                actual_width: image.width(),
                actual_height: image.height(),
            });
        }
        match image {
            Image::Mono(f) => self.divide(&mut f.data),
            Image::Color(cf) => {
                self.divide(&mut cf.red.data);
                self.divide(&mut cf.green.data);
                self.divide(&mut cf.blue.data);
            }
        }
        Ok(())
    }

    fn divide(&self, plane: &mut Array2<f32>) {
        Zip::from(plane).and(&self.gain).par_for_each(|p, &g| {
            if g >= FLAT_FIELD_MIN_VALUE {
                *p = (*p / g).min(1.0);
            }
        });
    }
}

/// Average every frame of a sequence into a normalized flat field.
///
/// Color sources are reduced to luminance before averaging.
pub fn create_flat_field(source: &Path, cfa: CfaPattern) -> Result<FlatField> {
    let frames = FrameSource::open(source, cfa)?;
    let total = frames.frame_count();
    if total == 0 {
        return Err(SaturnError::EmptySequence);
    }

    let mut sum = Array2::<f32>::zeros((frames.height(), frames.width()));
    for i in 0..total {
        let mono = frames.read(i)?.to_mono();
        Zip::from(&mut sum).and(&mono.data).par_for_each(|s, &v| *s += v);
    }
    sum /= total as f32;
    info!(source = %source.display(), frames = total, "Created flat field");
    FlatField::from_array(sum)
}
