pub mod laplacian;
pub mod refpoints;
pub mod selection;

use ndarray::Array2;

use crate::consts::QUALITY_WINDOW_RADIUS;
use crate::frame::{AlignmentOffset, Point};

pub use selection::{select_frames, QualityCriterion};

/// Quality of a frame: mean local Laplacian variance around each reference
/// point, with the points displaced by the frame's alignment offset.
pub fn frame_quality(data: &Array2<f32>, ref_points: &[Point], offset: AlignmentOffset) -> f64 {
    if ref_points.is_empty() {
        return laplacian::laplacian_variance_array(data);
    }
    let total: f64 = ref_points
        .iter()
        .map(|p| {
            laplacian::local_laplacian_variance(
                data,
                p.offset(offset.dx, offset.dy),
                QUALITY_WINDOW_RADIUS,
            )
        })
        .sum();
    total / ref_points.len() as f64
}
