pub mod error;
pub mod consts;
pub mod frame;
pub mod io;
pub mod color;
pub mod quality;
pub mod align;
pub mod stack;
pub mod processor;
pub mod config;
pub mod jobs;
