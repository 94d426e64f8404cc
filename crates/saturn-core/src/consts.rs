/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Default relative brightness threshold for automatic reference point placement.
pub const DEFAULT_REF_PT_PLACEMENT_THRESHOLD: f32 = 0.33;

/// Default grid spacing (pixels) for automatic reference point placement.
pub const DEFAULT_REF_PT_SPACING: u32 = 40;

/// Smallest grid spacing accepted for automatic reference point placement.
pub const MIN_REF_PT_SPACING: u32 = 2;

/// Default percentage of best frames to stack.
pub const DEFAULT_QUALITY_PERCENTAGE: u32 = 30;

/// Half-size (pixels) of the square window used to estimate local quality
/// around each reference point.
pub const QUALITY_WINDOW_RADIUS: usize = 8;

/// Half-size (pixels) of the block matched when tracking an anchor.
pub const ANCHOR_BLOCK_RADIUS: usize = 16;

/// Maximum displacement (pixels) searched around an anchor between frames.
pub const ANCHOR_SEARCH_RADIUS: usize = 24;

/// Flat-field pixels below this value are not used for division.
pub const FLAT_FIELD_MIN_VALUE: f32 = 1e-3;

/// File extensions recognized as image-series members.
pub const IMAGE_SERIES_EXTENSIONS: [&str; 6] = ["tif", "tiff", "png", "bmp", "jpg", "jpeg"];

/// File extensions recognized as video sources.
pub const VIDEO_EXTENSIONS: [&str; 1] = ["ser"];

/// Suffix appended to the source name for automatically saved stacks.
pub const STACKED_SUFFIX: &str = "_stacked";
