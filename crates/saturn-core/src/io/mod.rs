pub mod image_io;
pub mod ser;
pub mod series;
pub mod source;

pub use source::FrameSource;
