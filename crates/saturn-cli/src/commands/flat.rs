use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use saturn_core::frame::Image;
use saturn_core::io::image_io::{save_image, OutputFormat};
use saturn_core::stack::create_flat_field;

use super::{cfa_pattern, CfaArg};

#[derive(Args)]
pub struct FlatArgs {
    /// SER video or image-series directory of flat frames
    pub source: PathBuf,

    /// Bayer pattern of raw mono frames
    #[arg(long, value_enum)]
    pub cfa: Option<CfaArg>,

    /// Output file path; the extension picks the format
    #[arg(short, long, default_value = "flat.tif")]
    pub output: PathBuf,
}

pub fn run(args: &FlatArgs) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
    pb.set_message(format!("Averaging {}", args.source.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let flat = create_flat_field(&args.source, cfa_pattern(args.cfa))
        .with_context(|| format!("Failed to create flat field from {}", args.source.display()));
    pb.finish_and_clear();
    let flat = flat?;

    let format = OutputFormat::from_path(&args.output);
    save_image(&Image::Mono(flat.to_frame()), &args.output, format)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "Flat field ({}x{}) saved to {}",
        flat.width(),
        flat.height(),
        args.output.display()
    );
    Ok(())
}
