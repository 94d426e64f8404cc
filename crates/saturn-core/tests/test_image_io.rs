use ndarray::Array2;

use saturn_core::frame::{ColorFrame, Frame, Image};
use saturn_core::io::image_io::{
    is_color_file, load_color_image, load_image, save_image, OutputFormat,
};

#[test]
fn test_save_load_roundtrip_tiff() {
    let mut data = Array2::<f32>::zeros((4, 4));
    data[[0, 1]] = 0.5;
    data[[1, 0]] = 1.0;
    data[[2, 3]] = 0.25;
    let image = Image::Mono(Frame::new(data, 16));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.tif");
    save_image(&image, &path, OutputFormat::Tiff16).unwrap();

    let loaded = load_image(&path).unwrap();
    assert_eq!((loaded.width(), loaded.height()), (4, 4));
    assert!((loaded.data[[0, 1]] - 0.5).abs() < 1e-3);
    assert!((loaded.data[[1, 0]] - 1.0).abs() < 1e-4);
    assert!((loaded.data[[2, 3]] - 0.25).abs() < 1e-3);
    assert!(!is_color_file(&path).unwrap());
}

#[test]
fn test_color_png_keeps_channels() {
    let shape = (3, 5);
    let color = ColorFrame {
        red: Frame::new(Array2::from_elem(shape, 1.0), 8),
        green: Frame::new(Array2::from_elem(shape, 0.0), 8),
        blue: Frame::new(Array2::from_elem(shape, 0.5), 8),
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.png");
    save_image(&Image::Color(color), &path, OutputFormat::Png8).unwrap();

    assert!(is_color_file(&path).unwrap());
    let loaded = load_color_image(&path).unwrap();
    assert_eq!((loaded.width(), loaded.height()), (5, 3));
    assert!((loaded.red.data[[1, 1]] - 1.0).abs() < 1e-3);
    assert!(loaded.green.data[[1, 1]].abs() < 1e-3);
    assert!((loaded.blue.data[[1, 1]] - 0.5).abs() < 1e-2);
}

#[test]
fn test_bmp_output() {
    let image = Image::Mono(Frame::new(Array2::from_elem((8, 8), 0.5), 8));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stack.bmp");
    save_image(&image, &path, OutputFormat::Bmp8).unwrap();
    assert!(path.exists());
}

#[test]
fn test_format_from_extension() {
    use std::path::Path;
    assert_eq!(OutputFormat::from_path(Path::new("a.PNG")), OutputFormat::Png8);
    assert_eq!(OutputFormat::from_path(Path::new("a.bmp")), OutputFormat::Bmp8);
    assert_eq!(OutputFormat::from_path(Path::new("a.tiff")), OutputFormat::Tiff16);
    assert_eq!(OutputFormat::from_path(Path::new("a")), OutputFormat::Tiff16);
    assert_eq!(OutputFormat::Png8.extension(), "png");
}
