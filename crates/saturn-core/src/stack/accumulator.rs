use ndarray::{Array2, Zip};

use crate::align::shift_array;
use crate::error::{Result, SaturnError};
use crate::frame::{AlignmentOffset, ColorFrame, Frame, Image};

/// Running mean of aligned frames.
///
/// Each pixel is divided by the number of frames that actually covered it,
/// so borders uncovered by shifted frames do not darken.
pub struct MeanAccumulator {
    sum: Vec<Array2<f32>>,
    coverage: Array2<f32>,
    color: bool,
    bit_depth: u8,
    frames: usize,
}

impl MeanAccumulator {
    pub fn new(height: usize, width: usize, color: bool) -> Self {
        let planes = if color { 3 } else { 1 };
        Self {
            sum: vec![Array2::zeros((height, width)); planes],
            coverage: Array2::zeros((height, width)),
            color,
            bit_depth: 8,
            frames: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    /// Shift `image` by `offset` and add it to the running sum.
    pub fn add(&mut self, image: &Image, offset: AlignmentOffset) -> Result<()> {
        let (h, w) = self.coverage.dim();
        if image.height() != h || image.width() != w {
            return Err(SaturnError::DimensionMismatch {
                width: w,
                height: h,
                actual_width: image.width(),
                actual_height: image.height(),
            });
        }

        let planes: Vec<&Frame> = match (image, self.color) {
            (Image::Mono(f), false) => vec![f],
            (Image::Color(cf), true) => vec![&cf.red, &cf.green, &cf.blue],
            _ => {
                return Err(SaturnError::Processing(
                    "mixed mono and color frames in one stack".into(),
                ))
            }
        };
        self.bit_depth = self.bit_depth.max(planes[0].original_bit_depth);

        for (sum, plane) in self.sum.iter_mut().zip(planes) {
            *sum += &shift_array(&plane.data, offset);
        }

        let ones = Array2::<f32>::ones((h, w));
        self.coverage += &shift_array(&ones, offset);
        self.frames += 1;
        Ok(())
    }

    /// Divide the sums by per-pixel coverage.
    pub fn finish(self) -> Result<Image> {
        if self.frames == 0 {
            return Err(SaturnError::EmptySequence);
        }
        let coverage = self.coverage;
        let depth = self.bit_depth;
        let mut planes = self.sum.into_iter().map(|mut sum| {
            Zip::from(&mut sum).and(&coverage).par_for_each(|s, &c| {
                *s = if c > 0.0 { *s / c } else { 0.0 };
            });
            Frame::new(sum, depth)
        });

        let first = planes.next().ok_or(SaturnError::EmptySequence)?;
        if !self.color {
            return Ok(Image::Mono(first));
        }
        match (planes.next(), planes.next()) {
            (Some(green), Some(blue)) => Ok(Image::Color(ColorFrame {
                red: first,
                green,
                blue,
            })),
            _ => Err(SaturnError::Processing("missing color planes".into())),
        }
    }
}
