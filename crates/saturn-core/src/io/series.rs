//! Image series: a directory of still images stacked as one sequence.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::IMAGE_SERIES_EXTENSIONS;
use crate::error::{Result, SaturnError};
use crate::frame::{ColorFrame, ColorMode, Frame, SourceInfo, SourceKind};

use super::image_io::{is_color_file, load_color_image, load_image};

/// Sorted list of image files from one directory.
pub struct ImageSeries {
    dir: PathBuf,
    files: Vec<PathBuf>,
    width: usize,
    height: usize,
    color: bool,
}

impl ImageSeries {
    /// List the images in `dir` (sorted by file name) and probe the first one
    /// for dimensions and channel count.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_series_member(p))
            .collect();
        files.sort();

        let first = files.first().ok_or(SaturnError::EmptySequence)?;
        let probe = load_image(first)?;
        let color = is_color_file(first)?;
        debug!(dir = %dir.display(), frames = files.len(), color, "Opened image series");

        Ok(Self {
            dir: dir.to_path_buf(),
            width: probe.width(),
            height: probe.height(),
            files,
            color,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_color(&self) -> bool {
        self.color
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn read_frame(&self, index: usize) -> Result<Frame> {
        let frame = load_image(self.path_of(index)?)?;
        self.check_dimensions(frame.width(), frame.height())?;
        Ok(frame)
    }

    pub fn read_frame_rgb(&self, index: usize) -> Result<ColorFrame> {
        let frame = load_color_image(self.path_of(index)?)?;
        self.check_dimensions(frame.width(), frame.height())?;
        Ok(frame)
    }

    pub fn source_info(&self) -> SourceInfo {
        SourceInfo {
            path: self.dir.clone(),
            kind: SourceKind::ImageSeries,
            total_frames: self.frame_count(),
            width: self.width as u32,
            height: self.height as u32,
            bit_depth: 16,
            color_mode: if self.color { ColorMode::RGB } else { ColorMode::Mono },
            observer: None,
            telescope: None,
            instrument: None,
        }
    }

    fn path_of(&self, index: usize) -> Result<&Path> {
        self.files
            .get(index)
            .map(PathBuf::as_path)
            .ok_or(SaturnError::FrameIndexOutOfRange {
                index,
                total: self.files.len(),
            })
    }

    fn check_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if width != self.width || height != self.height {
            return Err(SaturnError::DimensionMismatch {
                width: self.width,
                height: self.height,
                actual_width: width,
                actual_height: height,
            });
        }
        Ok(())
    }
}

fn is_series_member(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_SERIES_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}
