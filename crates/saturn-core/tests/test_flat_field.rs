mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array2;

use saturn_core::frame::{CfaPattern, Frame, Image};
use saturn_core::io::image_io::{save_image, OutputFormat};
use saturn_core::stack::{create_flat_field, FlatField};

use common::*;

/// Brighter in the centre columns, darker towards the edges.
fn vignette(w: usize, h: usize) -> Array2<f32> {
    Array2::from_shape_fn((h, w), |(_, col)| {
        let d = (col as f32 - w as f32 / 2.0).abs() / w as f32;
        0.8 - d
    })
}

#[test]
fn test_flat_is_normalized_to_unit_mean() {
    let flat = FlatField::from_array(vignette(16, 8)).unwrap();
    let frame = flat.to_frame();
    let reloaded = FlatField::from_array(frame.data.clone()).unwrap();
    assert_eq!((flat.width(), flat.height()), (16, 8));
    assert_abs_diff_eq!(frame.data.iter().cloned().fold(0.0f32, f32::max), 1.0, epsilon = 1e-6);

    // Scaling for saving does not change the correction.
    let mut a = Image::Mono(Frame::new(Array2::from_elem((8, 16), 0.4), 8));
    let mut b = a.clone();
    flat.apply(&mut a).unwrap();
    reloaded.apply(&mut b).unwrap();
    let (Image::Mono(a), Image::Mono(b)) = (a, b) else { unreachable!() };
    for (x, y) in a.data.iter().zip(b.data.iter()) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-5);
    }
}

#[test]
fn test_apply_removes_vignetting() {
    let shading = vignette(16, 8);
    let flat = FlatField::from_array(shading.clone()).unwrap();
    let mut image = Image::Mono(Frame::new(&shading * 0.5, 8));
    flat.apply(&mut image).unwrap();

    let Image::Mono(corrected) = image else { unreachable!() };
    let first = corrected.data[[0, 0]];
    for v in corrected.data.iter() {
        assert_abs_diff_eq!(*v, first, epsilon = 1e-4);
    }
}

#[test]
fn test_black_flat_rejected() {
    assert!(FlatField::from_array(Array2::zeros((4, 4))).is_err());
}

#[test]
fn test_size_mismatch_rejected() {
    let flat = FlatField::from_array(Array2::from_elem((4, 4), 0.5)).unwrap();
    let mut image = Image::Mono(Frame::new(Array2::from_elem((5, 4), 0.5), 8));
    assert!(flat.apply(&mut image).is_err());
}

#[test]
fn test_create_from_video_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let frames = vec![vec![100u8; 32], vec![200u8; 32]];
    let path = write_file(dir.path(), "flat.ser", &build_ser_with_frames(8, 4, &frames));

    let flat = create_flat_field(&path, CfaPattern::None).unwrap();
    assert_eq!((flat.width(), flat.height()), (8, 4));

    let saved = dir.path().join("flat.tif");
    save_image(&Image::Mono(flat.to_frame()), &saved, OutputFormat::Tiff16).unwrap();
    let loaded = FlatField::load(&saved).unwrap();

    // A uniform flat leaves frames untouched.
    let mut image = Image::Mono(Frame::new(Array2::from_elem((4, 8), 0.3), 8));
    loaded.apply(&mut image).unwrap();
    let Image::Mono(out) = image else { unreachable!() };
    assert_abs_diff_eq!(out.data[[2, 5]], 0.3, epsilon = 1e-3);
}
