//! Reference point placement.

use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_REF_PT_SPACING, QUALITY_WINDOW_RADIUS};
use crate::frame::Point;

/// How reference points are obtained for a sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RefPointPlacement {
    /// Place points on a regular grid, keeping only those over bright
    /// enough image areas.
    Automatic {
        /// Grid spacing in pixels.
        spacing: u32,
    },
    /// Use the given points as-is.
    Manual(Vec<Point>),
}

impl Default for RefPointPlacement {
    fn default() -> Self {
        Self::Automatic {
            spacing: DEFAULT_REF_PT_SPACING,
        }
    }
}

/// Place points on a `spacing`-pixel grid over `reference`, keeping those
/// whose neighbourhood mean brightness is at least `threshold` times the
/// brightest neighbourhood on the grid.
pub fn place_on_grid(reference: &Array2<f32>, spacing: u32, threshold: f32) -> Vec<Point> {
    let (h, w) = reference.dim();
    let spacing = spacing.max(1) as usize;
    let start = spacing / 2;

    let mut candidates = Vec::new();
    for row in (start..h).step_by(spacing) {
        for col in (start..w).step_by(spacing) {
            let brightness = mean_around(reference, row, col, QUALITY_WINDOW_RADIUS);
            candidates.push((Point::new(col as i32, row as i32), brightness));
        }
    }

    let max = candidates.iter().map(|(_, b)| *b).fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let cutoff = threshold.clamp(0.0, 1.0) * max;
    candidates
        .into_iter()
        .filter(|(_, b)| *b >= cutoff)
        .map(|(p, _)| p)
        .collect()
}

fn mean_around(data: &Array2<f32>, row: usize, col: usize, radius: usize) -> f32 {
    let (h, w) = data.dim();
    let r0 = row.saturating_sub(radius);
    let r1 = (row + radius + 1).min(h);
    let c0 = col.saturating_sub(radius);
    let c1 = (col + radius + 1).min(w);
    data.slice(s![r0..r1, c0..c1]).mean().unwrap_or(0.0)
}
