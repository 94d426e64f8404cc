use std::path::PathBuf;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// A single grayscale image frame.
/// Pixel values are f32 in [0.0, 1.0].
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Original bit depth before conversion (8 or 16)
    pub original_bit_depth: u8,
}

impl Frame {
    pub fn new(data: Array2<f32>, bit_depth: u8) -> Self {
        Self {
            data,
            original_bit_depth: bit_depth,
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

/// Color image composed of separate channel frames.
#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub red: Frame,
    pub green: Frame,
    pub blue: Frame,
}

impl ColorFrame {
    pub fn width(&self) -> usize {
        self.red.width()
    }

    pub fn height(&self) -> usize {
        self.red.height()
    }
}

/// A mono or color image: a decoded source frame, a flat field or a
/// finished stack.
#[derive(Clone, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Image {
    Mono(Frame),
    Color(ColorFrame),
}

impl Image {
    pub fn width(&self) -> usize {
        match self {
            Self::Mono(f) => f.width(),
            Self::Color(cf) => cf.width(),
        }
    }

    pub fn height(&self) -> usize {
        match self {
            Self::Mono(f) => f.height(),
            Self::Color(cf) => cf.height(),
        }
    }

    pub fn is_color(&self) -> bool {
        matches!(self, Self::Color(_))
    }

    /// Single-plane view used for quality estimation and alignment.
    /// Color images are reduced to luminance.
    pub fn to_mono(&self) -> Frame {
        match self {
            Self::Mono(f) => f.clone(),
            Self::Color(cf) => crate::color::debayer::luminance(cf),
        }
    }
}

/// Integer pixel position, `x` = column, `y` = row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Whole-pixel displacement of a frame relative to the reference frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AlignmentOffset {
    pub dx: i32,
    pub dy: i32,
}

/// Color filter array layout of raw sensor data.
///
/// When not `None`, mono frames are treated as raw color and demosaiced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfaPattern {
    #[default]
    None,
    Rggb,
    Grbg,
    Gbrg,
    Bggr,
}

impl CfaPattern {
    pub fn is_bayer(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for CfaPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Rggb => write!(f, "RGGB"),
            Self::Grbg => write!(f, "GRBG"),
            Self::Gbrg => write!(f, "GBRG"),
            Self::Bggr => write!(f, "BGGR"),
        }
    }
}

/// Pixel layout declared by the source itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    Mono,
    Bayer(CfaPattern),
    RGB,
    BGR,
}

/// Kind of frame source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// A single SER video file.
    Video,
    /// A directory of still images.
    ImageSeries,
}

/// Metadata about a frame source.
#[derive(Clone, Debug)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub total_frames: usize,
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_mode: ColorMode,
    pub observer: Option<String>,
    pub telescope: Option<String>,
    pub instrument: Option<String>,
}
