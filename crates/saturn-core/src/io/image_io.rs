use std::path::Path;

use image::{GrayImage, ImageBuffer, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SaturnError};
use crate::frame::{ColorFrame, Frame, Image};

/// File format used when saving a stacked image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// 16-bit TIFF.
    #[default]
    Tiff16,
    /// 8-bit PNG.
    Png8,
    /// 8-bit BMP.
    Bmp8,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Tiff16 => "tif",
            Self::Png8 => "png",
            Self::Bmp8 => "bmp",
        }
    }

    /// Guess the format from a file extension; TIFF when unknown.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("png") => Self::Png8,
            Some("bmp") => Self::Bmp8,
            _ => Self::Tiff16,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tiff16 => write!(f, "TIFF 16-bit"),
            Self::Png8 => write!(f, "PNG 8-bit"),
            Self::Bmp8 => write!(f, "BMP 8-bit"),
        }
    }
}

/// Save a mono or color image in the given format.
pub fn save_image(image: &Image, path: &Path, format: OutputFormat) -> Result<()> {
    match (image, format) {
        (Image::Mono(f), OutputFormat::Tiff16) => save_tiff(f, path),
        (Image::Mono(f), _) => save_gray8(f, path, image_format(format)),
        (Image::Color(cf), OutputFormat::Tiff16) => save_color_tiff(cf, path),
        (Image::Color(cf), _) => save_color8(cf, path, image_format(format)),
    }
}

fn image_format(format: OutputFormat) -> ImageFormat {
    match format {
        OutputFormat::Tiff16 => ImageFormat::Tiff,
        OutputFormat::Png8 => ImageFormat::Png,
        OutputFormat::Bmp8 => ImageFormat::Bmp,
    }
}

#[inline]
fn to_u16(v: f32) -> u16 {
    (v.clamp(0.0, 1.0) * 65535.0) as u16
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

/// Save a frame as 16-bit grayscale TIFF.
pub fn save_tiff(frame: &Frame, path: &Path) -> Result<()> {
    let (h, w) = frame.data.dim();
    let pixels: Vec<u16> = frame.data.iter().map(|&v| to_u16(v)).collect();

    let img = ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| SaturnError::Processing("pixel buffer size mismatch".into()))?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

fn save_gray8(frame: &Frame, path: &Path, format: ImageFormat) -> Result<()> {
    let (h, w) = frame.data.dim();
    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), &v) in frame.data.indexed_iter() {
        img.put_pixel(col as u32, row as u32, Luma([to_u8(v)]));
    }
    img.save_with_format(path, format)?;
    Ok(())
}

/// Save a ColorFrame as 16-bit RGB TIFF.
pub fn save_color_tiff(color: &ColorFrame, path: &Path) -> Result<()> {
    let h = color.height();
    let w = color.width();

    let mut pixels: Vec<u16> = Vec::with_capacity(h * w * 3);
    for row in 0..h {
        for col in 0..w {
            pixels.push(to_u16(color.red.data[[row, col]]));
            pixels.push(to_u16(color.green.data[[row, col]]));
            pixels.push(to_u16(color.blue.data[[row, col]]));
        }
    }

    let img = ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| SaturnError::Processing("pixel buffer size mismatch".into()))?;
    img.save_with_format(path, ImageFormat::Tiff)?;
    Ok(())
}

fn save_color8(color: &ColorFrame, path: &Path, format: ImageFormat) -> Result<()> {
    let h = color.height();
    let w = color.width();

    let mut img = RgbImage::new(w as u32, h as u32);
    for row in 0..h {
        for col in 0..w {
            let r = to_u8(color.red.data[[row, col]]);
            let g = to_u8(color.green.data[[row, col]]);
            let b = to_u8(color.blue.data[[row, col]]);
            img.put_pixel(col as u32, row as u32, Rgb([r, g, b]));
        }
    }

    img.save_with_format(path, format)?;
    Ok(())
}

/// Load an image file as a grayscale Frame.
pub fn load_image(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let data = Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        gray.get_pixel(col as u32, row as u32).0[0] as f32 / 65535.0
    });
    Ok(Frame::new(data, 16))
}

/// Load an image file as three color channels.
pub fn load_color_image(path: &Path) -> Result<ColorFrame> {
    let img = image::open(path)?;
    let rgb = img.to_rgb16();
    let (w, h) = rgb.dimensions();
    let shape = (h as usize, w as usize);
    let channel = |c: usize| {
        Array2::from_shape_fn(shape, |(row, col)| {
            rgb.get_pixel(col as u32, row as u32).0[c] as f32 / 65535.0
        })
    };
    Ok(ColorFrame {
        red: Frame::new(channel(0), 16),
        green: Frame::new(channel(1), 16),
        blue: Frame::new(channel(2), 16),
    })
}

/// Whether an image file stores more than one color channel.
pub fn is_color_file(path: &Path) -> Result<bool> {
    Ok(image::open(path)?.color().has_color())
}
