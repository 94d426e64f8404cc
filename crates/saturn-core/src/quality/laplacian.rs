use ndarray::{s, Array2};

use crate::frame::Point;

/// Compute Laplacian variance of an array — higher means sharper.
///
/// Convolves with the 3x3 Laplacian kernel:
///   0  1  0
///   1 -4  1
///   0  1  0
/// Then returns the variance of the result.
pub fn laplacian_variance_array(data: &Array2<f32>) -> f64 {
    let (h, w) = data.dim();
    if h < 3 || w < 3 {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let count = ((h - 2) * (w - 2)) as f64;

    for row in 1..h - 1 {
        for col in 1..w - 1 {
            let lap = -4.0 * data[[row, col]] as f64
                + data[[row - 1, col]] as f64
                + data[[row + 1, col]] as f64
                + data[[row, col - 1]] as f64
                + data[[row, col + 1]] as f64;
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let mean = sum / count;
    sum_sq / count - mean * mean
}

/// Laplacian variance of the square window of half-size `radius` centred on
/// `center`, clipped to the image. Returns 0.0 when the clipped window is
/// too small to evaluate.
pub fn local_laplacian_variance(data: &Array2<f32>, center: Point, radius: usize) -> f64 {
    let (h, w) = data.dim();
    let r = radius as i64;
    let row0 = (center.y as i64 - r).clamp(0, h as i64) as usize;
    let row1 = (center.y as i64 + r + 1).clamp(0, h as i64) as usize;
    let col0 = (center.x as i64 - r).clamp(0, w as i64) as usize;
    let col1 = (center.x as i64 + r + 1).clamp(0, w as i64) as usize;
    if row1 <= row0 || col1 <= col0 {
        return 0.0;
    }
    let window = data.slice(s![row0..row1, col0..col1]).to_owned();
    laplacian_variance_array(&window)
}
