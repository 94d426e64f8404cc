pub mod config;
pub mod flat;
pub mod info;
pub mod run;

use clap::ValueEnum;
use saturn_core::frame::CfaPattern;
use saturn_core::io::image_io::OutputFormat;

/// Bayer layout of raw mono data.
#[derive(Clone, Copy, ValueEnum)]
pub enum CfaArg {
    Rggb,
    Grbg,
    Gbrg,
    Bggr,
}

impl From<CfaArg> for CfaPattern {
    fn from(arg: CfaArg) -> Self {
        match arg {
            CfaArg::Rggb => CfaPattern::Rggb,
            CfaArg::Grbg => CfaPattern::Grbg,
            CfaArg::Gbrg => CfaPattern::Gbrg,
            CfaArg::Bggr => CfaPattern::Bggr,
        }
    }
}

pub fn cfa_pattern(arg: Option<CfaArg>) -> CfaPattern {
    arg.map(CfaPattern::from).unwrap_or_default()
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// 16-bit TIFF
    Tiff,
    /// 8-bit PNG
    Png,
    /// 8-bit BMP
    Bmp,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Tiff => OutputFormat::Tiff16,
            FormatArg::Png => OutputFormat::Png8,
            FormatArg::Bmp => OutputFormat::Bmp8,
        }
    }
}
