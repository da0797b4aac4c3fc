//! Lumen CLI - manage stored presets of a simulated light from the shell.

mod commands;
mod light;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lumen")]
#[command(author, version, about = "Lumen preset storage CLI", long_about = None)]
struct Cli {
    /// Directory holding the preset files and the simulated light
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Scheduler configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save, apply, list and delete presets
    Presets(commands::presets::PresetsArgs),

    /// Inspect or change the simulated light
    Light(commands::light::LightArgs),
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let ctx = commands::common::Context::open(cli.data_dir, cli.config.as_deref())?;

    match cli.command {
        Commands::Presets(args) => commands::presets::run(args, ctx),
        Commands::Light(args) => commands::light::run(args, ctx),
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
}
