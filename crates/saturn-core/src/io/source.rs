use std::path::Path;

use crate::color::debayer::debayer;
use crate::consts::VIDEO_EXTENSIONS;
use crate::error::{Result, SaturnError};
use crate::frame::{CfaPattern, ColorMode, Frame, Image, SourceInfo};

use super::series::ImageSeries;
use super::ser::SerReader;

/// A sequence of frames read from a SER video or an image-series directory.
///
/// Frames come out demosaiced when the source declares a Bayer layout or the
/// caller supplies a CFA pattern for mono data.
pub struct FrameSource {
    inner: SourceInner,
    cfa: CfaPattern,
}

enum SourceInner {
    Video(SerReader),
    Series(ImageSeries),
}

impl FrameSource {
    /// Open `path`: a directory is an image series, a `.ser` file a video.
    ///
    /// A `cfa` other than `CfaPattern::None` overrides any pattern declared
    /// by the source.
    pub fn open(path: &Path, cfa: CfaPattern) -> Result<Self> {
        let inner = if path.is_dir() {
            SourceInner::Series(ImageSeries::open(path)?)
        } else if is_video(path) {
            SourceInner::Video(SerReader::open(path)?)
        } else if !path.exists() {
            return Err(SaturnError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        } else {
            return Err(SaturnError::UnsupportedSource(path.to_path_buf()));
        };
        Ok(Self { inner, cfa })
    }

    pub fn frame_count(&self) -> usize {
        match &self.inner {
            SourceInner::Video(r) => r.frame_count(),
            SourceInner::Series(s) => s.frame_count(),
        }
    }

    pub fn width(&self) -> usize {
        match &self.inner {
            SourceInner::Video(r) => r.header.width as usize,
            SourceInner::Series(s) => s.width(),
        }
    }

    pub fn height(&self) -> usize {
        match &self.inner {
            SourceInner::Video(r) => r.header.height as usize,
            SourceInner::Series(s) => s.height(),
        }
    }

    pub fn source_info(&self, path: &Path) -> SourceInfo {
        match &self.inner {
            SourceInner::Video(r) => r.source_info(path),
            SourceInner::Series(s) => s.source_info(),
        }
    }

    /// The CFA pattern frames are demosaiced with, if any.
    pub fn effective_cfa(&self) -> CfaPattern {
        if self.cfa.is_bayer() {
            return self.cfa;
        }
        match &self.inner {
            SourceInner::Video(r) => match r.header.color_mode() {
                ColorMode::Bayer(p) => p,
                _ => CfaPattern::None,
            },
            SourceInner::Series(_) => CfaPattern::None,
        }
    }

    /// Whether frames come out as color images.
    pub fn is_color(&self) -> bool {
        if self.effective_cfa().is_bayer() {
            return true;
        }
        match &self.inner {
            SourceInner::Video(r) => matches!(r.header.color_mode(), ColorMode::RGB | ColorMode::BGR),
            SourceInner::Series(s) => s.is_color(),
        }
    }

    /// Read and decode one frame.
    pub fn read(&self, index: usize) -> Result<Image> {
        let cfa = self.effective_cfa();
        if cfa.is_bayer() {
            let raw = self.read_plane(index)?;
            return debayer(&raw, cfa)
                .map(Image::Color)
                .ok_or_else(|| SaturnError::Processing("demosaicing failed".into()));
        }
        if self.is_color() {
            return match &self.inner {
                SourceInner::Video(r) => r.read_frame_rgb(index).map(Image::Color),
                SourceInner::Series(s) => s.read_frame_rgb(index).map(Image::Color),
            };
        }
        self.read_plane(index).map(Image::Mono)
    }

    fn read_plane(&self, index: usize) -> Result<Frame> {
        match &self.inner {
            SourceInner::Video(r) => r.read_frame(index),
            SourceInner::Series(s) => s.read_frame(index),
        }
    }
}

fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
