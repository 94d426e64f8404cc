mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "saturn", about = "Batch stacking of planetary and lunar captures")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show video or image-series metadata
    Info(commands::info::InfoArgs),
    /// Queue one stacking job per source and process them in order
    Run(commands::run::RunArgs),
    /// Average a sequence into a flat-field image
    Flat(commands::flat::FlatArgs),
    /// Print a default batch configuration
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Run(args) => commands::run::run(args),
        Commands::Flat(args) => commands::flat::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
