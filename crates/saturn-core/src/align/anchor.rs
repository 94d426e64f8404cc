//! Anchor-based stabilization.
//!
//! Each anchor is a small block of the reference frame. In every following
//! frame the block is searched for around its last known position; the mean
//! displacement of all anchors is the frame's alignment offset.

use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;

use crate::consts::{ANCHOR_BLOCK_RADIUS, ANCHOR_SEARCH_RADIUS};
use crate::error::{Result, SaturnError};
use crate::frame::{AlignmentOffset, Point};
use crate::quality::laplacian::laplacian_variance_array;

/// Block half-size usable for an image of the given dimensions.
fn block_radius(h: usize, w: usize) -> usize {
    ANCHOR_BLOCK_RADIUS.min(h.min(w) / 4).max(1)
}

fn clamp_inside(p: Point, radius: usize, h: usize, w: usize) -> Point {
    let r = radius as i32;
    Point::new(
        p.x.clamp(r, (w as i32 - r - 1).max(r)),
        p.y.clamp(r, (h as i32 - r - 1).max(r)),
    )
}

fn block(data: &Array2<f32>, center: Point, radius: usize) -> ArrayView2<'_, f32> {
    let r = radius as i32;
    let (y0, x0) = ((center.y - r) as usize, (center.x - r) as usize);
    let size = 2 * radius + 1;
    data.slice(s![y0..y0 + size, x0..x0 + size])
}

/// Pick an anchor position automatically: the centre of the block with the
/// most fine detail. Falls back to the image centre for featureless images.
pub fn suggest_anchor(reference: &Array2<f32>) -> Point {
    let (h, w) = reference.dim();
    let radius = block_radius(h, w);
    let size = 2 * radius + 1;
    let center = Point::new(w as i32 / 2, h as i32 / 2);
    if h < size || w < size {
        return center;
    }

    let candidates: Vec<Point> = (radius..h - radius)
        .step_by(size)
        .flat_map(|row| {
            (radius..w - radius)
                .step_by(size)
                .map(move |col| Point::new(col as i32, row as i32))
        })
        .collect();

    candidates
        .par_iter()
        .map(|&p| (p, laplacian_variance_array(&block(reference, p, radius).to_owned())))
        .filter(|(_, score)| *score > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.y.cmp(&a.0.y)).then_with(|| b.0.x.cmp(&a.0.x)))
        .map(|(p, _)| p)
        .unwrap_or(center)
}

/// Tracks anchors from frame to frame.
pub struct AnchorTracker {
    radius: usize,
    origins: Vec<Point>,
    current: Vec<Point>,
    templates: Vec<Array2<f32>>,
}

impl AnchorTracker {
    /// Capture anchor templates from the reference frame. Fails for frames
    /// too small to hold a single anchor block.
    pub fn new(reference: &Array2<f32>, anchors: &[Point]) -> Result<Self> {
        let (h, w) = reference.dim();
        let radius = block_radius(h, w);
        let size = 2 * radius + 1;
        if h < size || w < size {
            return Err(SaturnError::InvalidDimensions {
                width: w as u32,
                height: h as u32,
            });
        }
        let origins: Vec<Point> = anchors
            .iter()
            .map(|&p| clamp_inside(p, radius, h, w))
            .collect();
        let templates = origins
            .iter()
            .map(|&p| block(reference, p, radius).to_owned())
            .collect();
        Ok(Self {
            radius,
            current: origins.clone(),
            origins,
            templates,
        })
    }

    pub fn anchors(&self) -> &[Point] {
        &self.origins
    }

    /// Locate every anchor in `frame` and return the frame's mean offset
    /// relative to the reference.
    pub fn track(&mut self, frame: &Array2<f32>) -> AlignmentOffset {
        if self.origins.is_empty() {
            return AlignmentOffset::default();
        }
        let (h, w) = frame.dim();
        let mut sum_dx = 0i64;
        let mut sum_dy = 0i64;
        for i in 0..self.origins.len() {
            let found = best_match(frame, &self.templates[i], self.current[i], self.radius, h, w);
            self.current[i] = found;
            sum_dx += (found.x - self.origins[i].x) as i64;
            sum_dy += (found.y - self.origins[i].y) as i64;
        }
        let n = self.origins.len() as f64;
        AlignmentOffset {
            dx: (sum_dx as f64 / n).round() as i32,
            dy: (sum_dy as f64 / n).round() as i32,
        }
    }
}

/// Position around `start` where `template` has the smallest sum of squared
/// differences.
fn best_match(
    frame: &Array2<f32>,
    template: &Array2<f32>,
    start: Point,
    radius: usize,
    h: usize,
    w: usize,
) -> Point {
    let search = ANCHOR_SEARCH_RADIUS as i32;
    (-search..=search)
        .into_par_iter()
        .flat_map_iter(|dy| (-search..=search).map(move |dx| start.offset(dx, dy)))
        .filter(|&p| clamp_inside(p, radius, h, w) == p)
        .map(|p| {
            let ssd: f32 = block(frame, p, radius)
                .iter()
                .zip(template.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            (p, ssd)
        })
        // Prefer the candidate closest to the start position on ties.
        .min_by(|a, b| {
            a.1.total_cmp(&b.1).then_with(|| {
                let da = (a.0.x - start.x).abs() + (a.0.y - start.y).abs();
                let db = (b.0.x - start.x).abs() + (b.0.y - start.y).abs();
                da.cmp(&db)
            })
        })
        .map(|(p, _)| p)
        .unwrap_or(start)
}

/// Shift `data` so that content at `(row + dy, col + dx)` lands on
/// `(row, col)`. Uncovered pixels are zero.
pub fn shift_array(data: &Array2<f32>, offset: AlignmentOffset) -> Array2<f32> {
    let (h, w) = data.dim();
    Array2::from_shape_fn((h, w), |(row, col)| {
        let r = row as i64 + offset.dy as i64;
        let c = col as i64 + offset.dx as i64;
        if r >= 0 && c >= 0 && (r as usize) < h && (c as usize) < w {
            data[[r as usize, c as usize]]
        } else {
            0.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spot(h: usize, w: usize, cy: usize, cx: usize) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(r, c)| {
            let d2 = (r as f32 - cy as f32).powi(2) + (c as f32 - cx as f32).powi(2);
            (-d2 / 18.0).exp()
        })
    }

    #[test]
    fn tracks_translated_spot() {
        let reference = spot(96, 96, 40, 40);
        let moved = spot(96, 96, 43, 35);
        let mut tracker = AnchorTracker::new(&reference, &[Point::new(40, 40)]).unwrap();
        let offset = tracker.track(&moved);
        assert_eq!(offset, AlignmentOffset { dx: -5, dy: 3 });
    }

    #[test]
    fn frames_smaller_than_a_block_are_rejected() {
        let tiny = Array2::from_elem((2, 2), 0.5);
        assert!(matches!(
            AnchorTracker::new(&tiny, &[Point::new(1, 1)]),
            Err(SaturnError::InvalidDimensions { width: 2, height: 2 })
        ));
        let smallest = Array2::from_elem((3, 3), 0.5);
        let mut tracker = AnchorTracker::new(&smallest, &[Point::new(0, 0)]).unwrap();
        assert_eq!(tracker.track(&smallest), AlignmentOffset::default());
    }

    #[test]
    fn shift_undoes_translation() {
        let reference = spot(64, 64, 30, 30);
        let moved = spot(64, 64, 32, 27);
        let aligned = shift_array(&moved, AlignmentOffset { dx: -3, dy: 2 });
        assert!((aligned[[30, 30]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn suggested_anchor_is_on_feature() {
        let reference = spot(128, 128, 70, 50);
        let p = suggest_anchor(&reference);
        assert!((p.x - 50).abs() <= 33 && (p.y - 70).abs() <= 33, "got {p}");
    }
}
