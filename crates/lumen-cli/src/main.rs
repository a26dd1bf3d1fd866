//! Lumen CLI - Command-line interface for the Lumen asset pipeline

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{asset, pak, scan, watch};

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Asset registry, cooking and packaging for Lumen projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Project root (the directory holding lumen.toml)
    #[arg(long, global = true, default_value = ".")]
    root: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the source tree, cook stale assets and save the registry
    Scan,

    /// Registry queries
    #[command(subcommand)]
    Asset(asset::AssetCommands),

    /// Package operations
    #[command(subcommand)]
    Pak(pak::PakCommands),

    /// Watch the source tree and hot-reload changed assets
    Watch {
        /// Milliseconds between update ticks
        #[arg(long, default_value = "100")]
        tick_ms: u64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan => scan::run(&cli.root),
        Commands::Asset(cmd) => asset::run(&cli.root, cmd),
        Commands::Pak(cmd) => pak::run(&cli.root, cmd),
        Commands::Watch { tick_ms } => watch::run(&cli.root, tick_ms),
    }
}
