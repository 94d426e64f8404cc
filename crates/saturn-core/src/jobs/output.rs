use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::STACKED_SUFFIX;
use crate::error::Result;
use crate::frame::Image;
use crate::io::image_io::{save_image, OutputFormat};

use super::job::OutputSaveMode;

/// Writes finished stacks. Called from the controller, never from a worker.
pub trait OutputSaver: Send {
    fn save_stacked_image(&self, image: &Image, path: &Path, format: OutputFormat) -> Result<()>;
}

/// Saves to image files, creating the destination directory if needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageFileSaver;

impl OutputSaver for ImageFileSaver {
    fn save_stacked_image(&self, image: &Image, path: &Path, format: OutputFormat) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), %format, "Writing stacked image");
        save_image(image, path, format)
    }
}

/// Where a finished stack of `source` goes under `mode`.
///
/// A series directory `D` becomes `D_stacked.<ext>` beside it, a video
/// `V.ser` becomes `V_stacked.<ext>` beside it, and a specified directory
/// receives `<source-stem>_stacked.<ext>`. `None` for in-memory jobs.
pub fn output_path(source: &Path, mode: &OutputSaveMode, format: OutputFormat) -> Option<PathBuf> {
    let file_name = stacked_file_name(source, format);
    match mode {
        OutputSaveMode::None => None,
        OutputSaveMode::AutoNextToSource => Some(match source.parent() {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }),
        OutputSaveMode::SpecifiedPath(dir) => Some(dir.join(file_name)),
    }
}

fn stacked_file_name(source: &Path, format: OutputFormat) -> String {
    let stem = if source.is_dir() {
        source.file_name()
    } else {
        source.file_stem()
    }
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "stack".to_string());
    format!("{stem}{STACKED_SUFFIX}.{}", format.extension())
}
