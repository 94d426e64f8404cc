use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use saturn_core::frame::{CfaPattern, SourceKind};
use saturn_core::io::FrameSource;

#[derive(Args)]
pub struct InfoArgs {
    /// SER video or image-series directory
    pub source: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let source = FrameSource::open(&args.source, CfaPattern::None)
        .with_context(|| format!("Failed to open {}", args.source.display()))?;
    let info = source.source_info(&args.source);

    let kind = match info.kind {
        SourceKind::Video => "video",
        SourceKind::ImageSeries => "image series",
    };
    println!("Source:      {}", info.path.display());
    println!("Kind:        {}", kind);
    println!("Frames:      {}", info.total_frames);
    println!("Dimensions:  {}x{}", info.width, info.height);
    println!("Bit depth:   {}", info.bit_depth);
    println!("Color mode:  {:?}", info.color_mode);

    if let Some(ref obs) = info.observer {
        println!("Observer:    {}", obs);
    }
    if let Some(ref tel) = info.telescope {
        println!("Telescope:   {}", tel);
    }
    if let Some(ref inst) = info.instrument {
        println!("Instrument:  {}", inst);
    }

    let cfa = source.effective_cfa();
    if cfa.is_bayer() {
        println!("Debayer:     {}", cfa);
    }

    Ok(())
}
